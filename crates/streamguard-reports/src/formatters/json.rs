use std::collections::BTreeMap;

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Error;
use streamguard_core::{CheckResult, RunReport};

use crate::Reporter;

#[derive(Serialize, Deserialize)]
pub struct JsonFormatter {
    version: String,
    timestamp: String,
    runs: Vec<RunFormatter>,
}

#[derive(Serialize, Deserialize)]
struct RunFormatter {
    name: String,
    n_rows: u64,
    passes: u8,
    pass: bool,
    checks: Vec<CheckFormatter>,
}

#[derive(Serialize, Deserialize)]
struct CheckFormatter {
    id: String,
    kind: String,
    pass: bool,
    failed: u64,
    total: u64,
    failed_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sampling: Option<SamplingFormatter>,
    failures: Vec<FailureFormatter>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    metrics: BTreeMap<String, f64>,
}

#[derive(Serialize, Deserialize)]
struct SamplingFormatter {
    sample_size: usize,
    population_size: u64,
    fraction: f64,
    margin_of_error: f64,
    estimated_failures: f64,
}

#[derive(Serialize, Deserialize)]
struct FailureFormatter {
    row: u64,
    value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl From<&CheckResult> for CheckFormatter {
    fn from(r: &CheckResult) -> Self {
        Self {
            id: r.check_id.clone(),
            kind: r.kind.clone(),
            pass: r.passed,
            failed: r.failed_count,
            total: r.total_count,
            failed_percent: r.failure_percentage(),
            error: r.error.clone(),
            note: r.note.clone(),
            sampling: r.sampling.map(|s| SamplingFormatter {
                sample_size: s.sample_size,
                population_size: s.population_size,
                fraction: s.sampling_fraction,
                margin_of_error: s.margin_of_error,
                estimated_failures: s.estimated_failures,
            }),
            failures: r
                .sample_failures
                .iter()
                .map(|f| FailureFormatter {
                    row: f.row,
                    value: f.value.clone(),
                    detail: f.detail.clone(),
                })
                .collect(),
            // JSON has no representation for NaN or infinities.
            metrics: r
                .metrics
                .iter()
                .filter(|(_, v)| v.is_finite())
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        }
    }
}

impl JsonFormatter {
    pub fn new(version: String) -> Self {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        Self {
            version,
            timestamp,
            runs: Vec::new(),
        }
    }

    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Reporter for JsonFormatter {
    fn on_start(&self) {}

    fn on_source(&self, _name: &str, _location: &str) {}

    fn on_validation_start(&self, _checks: usize) {}

    fn on_report(&mut self, report: &RunReport) {
        self.runs.push(RunFormatter {
            name: report.name.clone(),
            n_rows: report.total_rows,
            passes: report.passes,
            pass: report.is_passed(),
            checks: report.results.iter().map(CheckFormatter::from).collect(),
        });
    }

    fn on_summary(&self, _passed: usize, _failed: usize) {}
}
