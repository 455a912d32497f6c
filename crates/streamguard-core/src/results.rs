use std::collections::BTreeMap;

/// One failing row kept as evidence.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureSample {
    /// Dataset row index (0-based)
    pub row: u64,
    pub value: String,
    pub detail: Option<String>,
}

impl FailureSample {
    pub fn new(row: u64, value: String) -> Self {
        Self {
            row,
            value,
            detail: None,
        }
    }

    pub fn with_detail(row: u64, value: String, detail: String) -> Self {
        Self {
            row,
            value,
            detail: Some(detail),
        }
    }
}

/// How far a result computed on a sample can be trusted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingInfo {
    pub sample_size: usize,
    pub population_size: u64,
    /// `sample_size / population_size`
    pub sampling_fraction: f64,
    /// Half-width of the 95% interval on the failure rate, finite population corrected
    pub margin_of_error: f64,
    /// Failure rate of the sample extrapolated to the population
    pub estimated_failures: f64,
}

impl SamplingInfo {
    const Z_95: f64 = 1.96;

    /// Derive the confidence hint from sample counts.
    ///
    /// With no failure (or only failures) in the sample the normal
    /// approximation collapses, so the rule of three bounds the rate instead.
    pub fn estimate(
        sample_size: usize,
        population_size: u64,
        failed_in_sample: u64,
        evaluated_in_sample: u64,
    ) -> Self {
        let n = evaluated_in_sample.max(1) as f64;
        let population = population_size.max(1) as f64;
        let rate = failed_in_sample as f64 / n;

        let fpc = if population_size > 1 {
            ((population - n).max(0.0) / (population - 1.0)).sqrt()
        } else {
            0.0
        };
        let margin = if rate > 0.0 && rate < 1.0 {
            Self::Z_95 * (rate * (1.0 - rate) / n).sqrt()
        } else {
            (3.0 / n).min(1.0)
        };

        Self {
            sample_size,
            population_size,
            sampling_fraction: sample_size as f64 / population,
            margin_of_error: margin * fpc,
            estimated_failures: rate * population_size as f64,
        }
    }
}

/// Outcome of one check over one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub check_id: String,
    pub kind: String,
    pub passed: bool,
    pub failed_count: u64,
    pub total_count: u64,
    pub sample_failures: Vec<FailureSample>,
    pub is_sampled: bool,
    pub sample_size: Option<usize>,
    pub population_size: Option<u64>,
    pub sampling: Option<SamplingInfo>,
    /// Explanation for degenerate but successful outcomes
    pub note: Option<String>,
    /// Set when the check itself could not run to completion
    pub error: Option<String>,
    pub metrics: BTreeMap<String, f64>,
}

impl CheckResult {
    pub fn new(check_id: String, kind: String) -> Self {
        Self {
            check_id,
            kind,
            passed: true,
            failed_count: 0,
            total_count: 0,
            sample_failures: Vec::new(),
            is_sampled: false,
            sample_size: None,
            population_size: None,
            sampling: None,
            note: None,
            error: None,
            metrics: BTreeMap::new(),
        }
    }

    /// A check that could not produce a verdict.
    pub fn errored(check_id: String, kind: String, message: String) -> Self {
        let mut result = Self::new(check_id, kind);
        result.set_failed(message);
        result
    }

    pub fn set_failed(&mut self, message: String) {
        self.passed = false;
        self.error = Some(message);
    }

    pub fn failure_ratio(&self) -> f64 {
        if self.total_count > 0 {
            self.failed_count as f64 / self.total_count as f64
        } else {
            0.0
        }
    }

    pub fn failure_percentage(&self) -> f64 {
        self.failure_ratio() * 100.
    }

    pub fn is_passed(&self) -> bool {
        self.passed
    }
}

/// Results of one run of the coordinator.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub name: String,
    /// Rows read on the first pass
    pub total_rows: u64,
    pub passes: u8,
    pub results: Vec<CheckResult>,
}

impl RunReport {
    pub fn new(name: String, total_rows: u64, passes: u8, results: Vec<CheckResult>) -> Self {
        Self {
            name,
            total_rows,
            passes,
            results,
        }
    }

    pub fn is_passed(&self) -> bool {
        self.results.iter().all(CheckResult::is_passed)
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_passed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.len() - self.passed_count()
    }

    pub fn get(&self, check_id: &str) -> Option<&CheckResult> {
        self.results.iter().find(|r| r.check_id == check_id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_check_result_instanciation() {
        let result = CheckResult::new("ids_unique".to_string(), "unique".to_string());
        assert!(result.passed);
        assert_eq!(result.failure_ratio(), 0.0);
        assert!(!result.is_sampled);
    }

    #[test]
    fn test_check_result_failed() {
        let mut result = CheckResult::new("ids_unique".to_string(), "unique".to_string());
        result.set_failed(String::from("Failed"));
        assert!(!result.passed);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_failure_percentage() {
        let mut result = CheckResult::new("c".to_string(), "not_null".to_string());
        result.failed_count = 5;
        result.total_count = 20;
        assert_eq!(result.failure_percentage(), 25.0);
    }

    #[test]
    fn test_sampling_estimate() {
        let info = SamplingInfo::estimate(100, 10_000, 10, 100);
        assert_eq!(info.sampling_fraction, 0.01);
        assert_eq!(info.estimated_failures, 1_000.0);
        // 1.96 * sqrt(0.1 * 0.9 / 100) ~ 0.0588, slightly shrunk by the correction
        assert!(info.margin_of_error > 0.058 && info.margin_of_error < 0.0588);
    }

    #[test]
    fn test_sampling_estimate_without_failures() {
        let info = SamplingInfo::estimate(300, 1_000_000, 0, 300);
        assert_eq!(info.estimated_failures, 0.0);
        assert!((info.margin_of_error - 0.01).abs() < 1e-4);
    }

    #[test]
    fn test_full_census_has_no_margin() {
        let info = SamplingInfo::estimate(50, 50, 5, 50);
        assert_eq!(info.margin_of_error, 0.0);
        assert_eq!(info.sampling_fraction, 1.0);
    }

    #[test]
    fn test_run_report_counts() {
        let ok = CheckResult::new("a".to_string(), "not_null".to_string());
        let ko = CheckResult::errored("b".to_string(), "range".to_string(), "boom".to_string());
        let report = RunReport::new("orders".to_string(), 10, 1, vec![ok, ko]);
        assert!(!report.is_passed());
        assert_eq!(report.passed_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert!(report.get("b").is_some());
    }
}
