use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Source file not found: '{path}'")]
    FileNotFound { path: String },
    #[error("Unknown source format '{format}'. Supported: csv, parquet")]
    UnknownFormat { format: String },
    #[error("Delimiter must be a single ASCII character, got '{delimiter}'")]
    InvalidDelimiter { delimiter: char },
    #[error("Check '{check_id}' runs in sampled mode and needs a 'sample_size'")]
    MissingSampleSize { check_id: String },
    #[error("Check '{check_id}' sets '{field}' but runs in full mode")]
    SamplingField { check_id: String, field: String },
    #[error("Configuration file declares no check")]
    NoCheck,
}
