/// Compact row counts: `4.5K`, `2.3M`, `2.7B`.
pub fn format_numbers(n: u64) -> String {
    match n {
        n if n > 1_000_000_000 => format!("{:0.1}B", n as f64 / 1_000_000_000.0),
        n if n > 1_000_000 => format!("{:0.1}M", n as f64 / 1_000_000.0),
        n if n > 1_000 => format!("{:0.1}K", n as f64 / 1_000.0),
        _ => n.to_string(),
    }
}
