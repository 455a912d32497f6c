//! File-backed chunk sources.
//!
//! Each source is a reusable description of a file: `open()` returns a new
//! reader over it, so a source plugs into the coordinator as a factory
//! closure, `|| source.open()`.
mod config;
mod csv_source;
mod parquet_source;

use std::path::Path;

use arrow::{error::ArrowError, record_batch::RecordBatch};

use crate::errors::EngineError;

pub use config::{ReaderConfig, ReaderConfigBuilder};
pub use csv_source::CsvSource;
pub use parquet_source::ParquetSource;

/// Chunk iterator over any supported file format.
pub type BoxedChunks = Box<dyn Iterator<Item = Result<RecordBatch, ArrowError>> + Send>;

/// File format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Parquet,
}

impl FileFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "csv" => Some(FileFormat::Csv),
            "parquet" => Some(FileFormat::Parquet),
            _ => None,
        }
    }
}

/// A CSV or Parquet source picked from the file extension.
#[derive(Debug, Clone)]
pub enum FileSource {
    Csv(CsvSource),
    Parquet(ParquetSource),
}

impl FileSource {
    pub fn new(
        path: impl AsRef<Path>,
        format: Option<FileFormat>,
        config: ReaderConfig,
    ) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let format = format.or_else(|| FileFormat::from_path(path)).ok_or_else(|| {
            EngineError::SourceOpen(format!(
                "{}: cannot tell the file format from its extension",
                path.display()
            ))
        })?;
        Ok(match format {
            FileFormat::Csv => FileSource::Csv(CsvSource::new(path, config)?),
            FileFormat::Parquet => FileSource::Parquet(ParquetSource::new(path, config)),
        })
    }

    pub fn open(&self) -> Result<BoxedChunks, EngineError> {
        Ok(match self {
            FileSource::Csv(source) => Box::new(source.open()?),
            FileSource::Parquet(source) => Box::new(source.open()?),
        })
    }
}
