pub mod formatters;
pub mod utils;

use streamguard_core::RunReport;
pub use formatters::{json::JsonFormatter, stdout::StdOutFormatter};

/// Receives the progress of a validation run.
pub trait Reporter {
    fn on_start(&self);
    fn on_source(&self, name: &str, location: &str);
    fn on_validation_start(&self, checks: usize);
    fn on_report(&mut self, report: &RunReport);
    fn on_summary(&self, passed: usize, failed: usize);
}
