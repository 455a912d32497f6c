/// Linear-interpolation quantile of sorted values (the "type 7" definition).
///
/// `q` is clamped to `[0, 1]`. Returns `None` for an empty slice.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Tukey fences derived from the interquartile range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrFences {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrFences {
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.lower && x <= self.upper
    }
}

/// Compute `[q1 - k * iqr, q3 + k * iqr]` over `values`. Sorts in place.
pub fn interquartile_fences(values: &mut [f64], multiplier: f64) -> Option<IqrFences> {
    values.sort_by(f64::total_cmp);
    let q1 = quantile(values, 0.25)?;
    let q3 = quantile(values, 0.75)?;
    let iqr = q3 - q1;
    Some(IqrFences {
        q1,
        q3,
        lower: q1 - multiplier * iqr,
        upper: q3 + multiplier * iqr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.0), Some(1.0));
        assert_eq!(quantile(&sorted, 1.0), Some(4.0));
        assert_eq!(quantile(&sorted, 0.5), Some(2.5));
        assert_eq!(quantile(&sorted, 0.25), Some(1.75));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn test_fences() {
        let mut values = vec![5.0, 1.0, 3.0, 2.0, 4.0, 100.0, 3.0, 2.0];
        let fences = interquartile_fences(&mut values, 1.5).unwrap();
        assert_eq!(fences.q1, 2.0);
        assert_eq!(fences.q3, 4.25);
        assert!(fences.contains(5.0));
        assert!(!fences.contains(100.0));
    }
}
