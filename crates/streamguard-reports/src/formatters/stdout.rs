use prettytable::{Cell, Row, Table};
use streamguard_core::{CheckResult, RunReport};

use crate::{utils::numbers::format_numbers, Reporter};

pub struct StdOutFormatter {
    intro: String,
    intro_len: usize,
}

impl StdOutFormatter {
    pub fn new(version: String) -> Self {
        let s = format!("StreamGuard v{} - Validation Report", version);
        let n = s.len();
        Self {
            intro: s,
            intro_len: n,
        }
    }

    /// One row per check.
    pub fn results_table(&self, results: &[CheckResult]) -> Table {
        let mut table = Table::new();
        table.add_row(Row::new(vec![
            Cell::new("Check"),
            Cell::new("Kind"),
            Cell::new("Failed"),
            Cell::new("Total"),
            Cell::new("% Failed"),
            Cell::new("Status"),
        ]));

        for result in results {
            let status = match (&result.error, result.passed) {
                (Some(_), _) => "ERROR",
                (None, true) => "PASSED",
                (None, false) => "FAILED",
            };
            let kind = if result.is_sampled {
                format!("{} (sampled)", result.kind)
            } else {
                result.kind.clone()
            };
            table.add_row(Row::new(vec![
                Cell::new(&result.check_id),
                Cell::new(&kind),
                Cell::new(&format_numbers(result.failed_count)),
                Cell::new(&format_numbers(result.total_count)),
                Cell::new(&format!("{:.2}%", result.failure_percentage())),
                Cell::new(status),
            ]));
        }
        table
    }

    /// Errors, notes, sampling hints and failing rows, one check after another.
    pub fn details(&self, results: &[CheckResult]) -> String {
        let mut out = String::new();
        for result in results {
            let mut lines = Vec::new();
            if let Some(error) = &result.error {
                lines.push(format!("error: {}", error));
            }
            if let Some(note) = &result.note {
                lines.push(format!("note: {}", note));
            }
            if let Some(sampling) = &result.sampling {
                lines.push(format!(
                    "sampled {} of {} rows, failure rate ±{:.2}% (95%), ~{} failures estimated",
                    format_numbers(sampling.sample_size as u64),
                    format_numbers(sampling.population_size),
                    sampling.margin_of_error * 100.,
                    format_numbers(sampling.estimated_failures.round() as u64),
                ));
            }
            for failure in &result.sample_failures {
                match &failure.detail {
                    Some(detail) => lines.push(format!(
                        "row {}: {} ({})",
                        failure.row, failure.value, detail
                    )),
                    None => lines.push(format!("row {}: {}", failure.row, failure.value)),
                }
            }
            if lines.is_empty() {
                continue;
            }
            out.push_str(&format!("  {}:\n", result.check_id));
            for line in lines {
                out.push_str(&format!("    {}\n", line));
            }
        }
        out
    }

    pub fn print_report(&self, report: &RunReport) {
        let status = if report.is_passed() {
            "PASSED"
        } else {
            "FAILED"
        };
        println!(
            "\n{} ({} rows) - {}",
            report.name,
            format_numbers(report.total_rows),
            status
        );
        print!("{}", self.results_table(&report.results));
        let details = self.details(&report.results);
        if !details.is_empty() {
            println!("{}", details);
        }
    }

    pub fn print_summary(&self, passed: usize, failed: usize) {
        println!("\n{}", "=".repeat(self.intro_len));
        println!("Result: {} failed, {} passed", failed, passed);
    }
}

impl Reporter for StdOutFormatter {
    fn on_start(&self) {
        println!("{}", self.intro);
        println!("{}", "=".repeat(self.intro_len));
    }

    fn on_source(&self, name: &str, location: &str) {
        println!("Reading {} from {}", name, location);
    }

    fn on_validation_start(&self, checks: usize) {
        println!("\nRunning {} checks...", checks);
    }

    fn on_report(&mut self, report: &RunReport) {
        self.print_report(report);
    }

    fn on_summary(&self, passed: usize, failed: usize) {
        self.print_summary(passed, failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamguard_core::{FailureSample, SamplingInfo};

    fn results() -> Vec<CheckResult> {
        let ok = CheckResult::new("id_not_null".to_string(), "not_null".to_string());
        let mut dup = CheckResult::new("id_unique".to_string(), "unique".to_string());
        dup.passed = false;
        dup.failed_count = 1;
        dup.total_count = 4;
        dup.sample_failures = vec![FailureSample::with_detail(
            2,
            "2".to_string(),
            "first seen at row 1".to_string(),
        )];
        let mut sampled = CheckResult::new("amount".to_string(), "range".to_string());
        sampled.is_sampled = true;
        sampled.total_count = 100;
        sampled.sampling = Some(SamplingInfo::estimate(100, 10_000, 0, 100));
        vec![ok, dup, sampled]
    }

    #[test]
    fn test_table_rows() {
        let formatter = StdOutFormatter::new("0.1.0".to_string());
        let table = formatter.results_table(&results());
        assert_eq!(table.len(), 4);
        let rendered = table.to_string();
        assert!(rendered.contains("25.00%"));
        assert!(rendered.contains("range (sampled)"));
        assert!(rendered.contains("FAILED"));
    }

    #[test]
    fn test_details() {
        let formatter = StdOutFormatter::new("0.1.0".to_string());
        let details = formatter.details(&results());
        assert!(details.contains("row 2: 2 (first seen at row 1)"));
        assert!(details.contains("sampled 100 of 10.0K rows"));
        assert!(!details.contains("id_not_null"));
    }
}
