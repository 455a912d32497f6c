use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use streamguard_core::{CheckConfig, CheckRegistry, FileSource, SinglePassCoordinator};
use streamguard_reports::{JsonFormatter, Reporter, StdOutFormatter};
use tracing::info;

use crate::{
    constructor::{construct_checks, construct_source},
    parser::parse_config,
    writer::write_report,
    OutputFormat,
};

pub struct RunOptions {
    pub config: PathBuf,
    pub output: OutputFormat,
    /// JSON report destination, stdout when absent
    pub output_path: Option<PathBuf>,
}

/// Validate the configured source. `Ok(false)` means at least one check failed.
pub fn run(options: &RunOptions) -> Result<bool> {
    let config = parse_config(&options.config)?;
    let source = construct_source(&config.source)?;
    let checks = construct_checks(&CheckRegistry::with_builtin(), &config.checks)
        .with_context(|| format!("Invalid checks in {}", options.config.display()))?;
    let name = config
        .name
        .clone()
        .unwrap_or_else(|| source_name(Path::new(&config.source.path)));
    let version = env!("CARGO_PKG_VERSION").to_string();

    match options.output {
        OutputFormat::Stdout => {
            let mut formatter = StdOutFormatter::new(version);
            validate(&mut formatter, &name, &config.source.path, &source, checks)
        }
        OutputFormat::Json => {
            let mut formatter = JsonFormatter::new(version);
            let passed = validate(&mut formatter, &name, &config.source.path, &source, checks)?;
            let json = formatter.to_json().context("Failed to serialize report")?;
            match &options.output_path {
                Some(target) => {
                    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
                    let path = write_report(target, &stamp, &json)?;
                    info!(path = %path.display(), "report written");
                }
                None => println!("{json}"),
            }
            Ok(passed)
        }
    }
}

fn validate<R: Reporter>(
    reporter: &mut R,
    name: &str,
    location: &str,
    source: &FileSource,
    checks: Vec<CheckConfig>,
) -> Result<bool> {
    reporter.on_start();
    reporter.on_source(name, location);
    reporter.on_validation_start(checks.len());

    let mut coordinator = SinglePassCoordinator::new();
    let report = coordinator
        .run_report(name, checks, || source.open())
        .with_context(|| format!("Validation of '{name}' aborted"))?;

    reporter.on_report(&report);
    reporter.on_summary(report.passed_count(), report.failed_count());
    Ok(report.is_passed())
}

fn source_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
