use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::csv::{reader::Format, Reader, ReaderBuilder as CsvReaderBuilder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use tracing::debug;

use crate::errors::EngineError;
use crate::sources::config::ReaderConfig;

/// CSV file read as chunks of `Utf8` columns.
///
/// Column names come from the header line. Values are kept as text; checks
/// cast them as they need. Each call to [`open`](Self::open) reads the file
/// again from the start.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    config: ReaderConfig,
    schema: SchemaRef,
    projection: Option<Vec<usize>>,
}

impl CsvSource {
    pub fn new(path: impl AsRef<Path>, config: ReaderConfig) -> Result<Self, EngineError> {
        let path = path.as_ref().to_path_buf();
        let schema = Arc::new(header_schema(&path, config.delimiter)?);
        let projection = config
            .columns
            .as_ref()
            .map(|cols| projection(&schema, cols));
        debug!(path = %path.display(), columns = schema.fields().len(), "csv source ready");
        Ok(Self {
            path,
            config,
            schema,
            projection,
        })
    }

    /// Schema of the whole file, before projection.
    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn open(&self) -> Result<Reader<File>, EngineError> {
        let file = File::open(&self.path).map_err(|e| open_error(&self.path, e))?;
        let mut builder = CsvReaderBuilder::new(self.schema.clone())
            .with_header(true)
            .with_delimiter(self.config.delimiter)
            .with_batch_size(self.config.batch_size);
        if let Some(projection) = &self.projection {
            builder = builder.with_projection(projection.clone());
        }
        builder.build(file).map_err(|e| open_error(&self.path, e))
    }
}

fn open_error(path: &Path, e: impl std::fmt::Display) -> EngineError {
    EngineError::SourceOpen(format!("{}: {e}", path.display()))
}

/// All-`Utf8` schema from the header record.
///
/// The header goes through the CSV parser, so quoted names may hold the
/// delimiter. No data record is read.
fn header_schema(path: &Path, delimiter: u8) -> Result<Schema, EngineError> {
    let file = File::open(path).map_err(|e| open_error(path, e))?;
    let (header, _) = Format::default()
        .with_header(true)
        .with_delimiter(delimiter)
        .infer_schema(file, Some(0))
        .map_err(|e| open_error(path, e))?;
    if header.fields().iter().all(|f| f.name().trim().is_empty()) {
        return Err(open_error(path, "CSV file is empty"));
    }

    let fields: Vec<Field> = header
        .fields()
        .iter()
        .map(|f| Field::new(f.name().trim(), DataType::Utf8, true))
        .collect();
    Ok(Schema::new(fields))
}

/// Indices of the requested columns that exist in `schema`.
///
/// Unknown names are left out; checks on them report the missing column.
fn projection(schema: &Schema, columns: &[String]) -> Vec<usize> {
    let mut indices: Vec<usize> = columns
        .iter()
        .filter_map(|name| schema.column_with_name(name).map(|(idx, _)| idx))
        .collect();
    indices.sort_unstable();
    indices.dedup();
    indices
}
