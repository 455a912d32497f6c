use std::path::Path;

use anyhow::{Context, Result};
use streamguard_core::{
    CheckConfig, CheckError, CheckRegistry, FileFormat, FileSource, ReaderConfigBuilder,
};
use tracing::warn;

use crate::{
    errors::ConfigError,
    parser::{Check, Mode, Source},
};

pub fn construct_source(source: &Source) -> Result<FileSource> {
    let path = Path::new(&source.path);
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: source.path.clone(),
        }
        .into());
    }
    let format = source.format.as_deref().map(parse_format).transpose()?;

    let mut builder = ReaderConfigBuilder::new();
    if let Some(batch_size) = source.batch_size {
        builder = builder.with_batch_size(batch_size);
    }
    if let Some(delimiter) = source.delimiter {
        if !delimiter.is_ascii() {
            return Err(ConfigError::InvalidDelimiter { delimiter }.into());
        }
        builder = builder.with_delimiter(delimiter as u8);
    }
    if let Some(columns) = &source.columns {
        builder = builder.with_columns(columns.iter().cloned());
    }

    FileSource::new(path, format, builder.build())
        .with_context(|| format!("Failed to open source: '{}'", source.path))
}

fn parse_format(format: &str) -> Result<FileFormat, ConfigError> {
    match format.to_lowercase().as_str() {
        "csv" => Ok(FileFormat::Csv),
        "parquet" => Ok(FileFormat::Parquet),
        _ => Err(ConfigError::UnknownFormat {
            format: format.to_string(),
        }),
    }
}

/// Build one check configuration per entry. A misconfigured entry becomes a
/// check that reports its error, the others still run.
pub fn construct_checks(
    registry: &CheckRegistry,
    checks: &[Check],
) -> Result<Vec<CheckConfig>, ConfigError> {
    if checks.is_empty() {
        return Err(ConfigError::NoCheck);
    }
    Ok(checks
        .iter()
        .map(|check| match construct_check(registry, check) {
            Ok(config) => config,
            Err(e) => {
                warn!(check_id = %check.id, error = %e, "invalid check");
                CheckConfig::invalid(
                    check.id.clone(),
                    check.kind.clone(),
                    CheckError::Configuration(e.to_string()),
                )
            }
        })
        .collect())
}

fn construct_check(registry: &CheckRegistry, check: &Check) -> Result<CheckConfig, ConfigError> {
    let mut config =
        CheckConfig::from_registry(registry, check.id.clone(), &check.kind, &check.params);
    match check.mode {
        Mode::Full => {
            if check.sample_size.is_some() {
                return Err(sampling_field(check, "sample_size"));
            }
            if check.seed.is_some() {
                return Err(sampling_field(check, "seed"));
            }
        }
        Mode::Sampled => {
            let sample_size = check
                .sample_size
                .ok_or_else(|| ConfigError::MissingSampleSize {
                    check_id: check.id.clone(),
                })?;
            config = config.sampled(sample_size, check.seed);
        }
    }
    if let Some(tolerance) = check.tolerance {
        config = config.with_tolerance(tolerance);
    }
    Ok(config)
}

fn sampling_field(check: &Check, field: &str) -> ConfigError {
    ConfigError::SamplingField {
        check_id: check.id.clone(),
        field: field.to_string(),
    }
}
