/// Options shared by the file-backed chunk sources.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderConfig {
    /// Rows per chunk
    pub batch_size: usize,
    /// CSV field delimiter
    pub delimiter: u8,
    /// Columns to read, all of them when `None`
    pub columns: Option<Vec<String>>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 128 * 1024,
            delimiter: b',',
            columns: None,
        }
    }
}

pub struct ReaderConfigBuilder {
    batch_size: usize,
    delimiter: u8,
    columns: Option<Vec<String>>,
}

impl Default for ReaderConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderConfigBuilder {
    /// Create a new [`ReaderConfigBuilder`]
    pub fn new() -> Self {
        let reader = ReaderConfig::default();
        Self {
            batch_size: reader.batch_size,
            delimiter: reader.delimiter,
            columns: reader.columns,
        }
    }

    /// Build a [`ReaderConfig`]
    pub fn build(self) -> ReaderConfig {
        ReaderConfig {
            batch_size: self.batch_size.max(1),
            delimiter: self.delimiter,
            columns: self.columns,
        }
    }

    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    pub fn with_delimiter(self, delimiter: u8) -> Self {
        Self { delimiter, ..self }
    }

    pub fn with_columns<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: Some(columns.into_iter().map(Into::into).collect()),
            ..self
        }
    }
}
