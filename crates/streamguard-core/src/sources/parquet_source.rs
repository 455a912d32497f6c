use std::fs::File;
use std::path::{Path, PathBuf};

use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use parquet::arrow::ProjectionMask;

use crate::errors::EngineError;
use crate::sources::config::ReaderConfig;

/// Parquet file read as chunks, with its own column types.
#[derive(Debug, Clone)]
pub struct ParquetSource {
    path: PathBuf,
    config: ReaderConfig,
}

impl ParquetSource {
    pub fn new(path: impl AsRef<Path>, config: ReaderConfig) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            config,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn open(&self) -> Result<ParquetRecordBatchReader, EngineError> {
        let open_error =
            |e: &dyn std::fmt::Display| EngineError::SourceOpen(format!("{}: {e}", self.path.display()));

        let file = File::open(&self.path).map_err(|e| open_error(&e))?;
        let mut builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| open_error(&e))?
            .with_batch_size(self.config.batch_size);
        if let Some(columns) = &self.config.columns {
            let mask = ProjectionMask::columns(
                builder.parquet_schema(),
                columns.iter().map(String::as_str),
            );
            builder = builder.with_projection(mask);
        }
        builder.build().map_err(|e| open_error(&e))
    }
}
