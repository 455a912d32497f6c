use arrow::{error::ArrowError, record_batch::RecordBatch};

use crate::errors::EngineError;

/// A finite, single-use sequence of chunks.
///
/// Any iterator of `Result<RecordBatch, ArrowError>` is a chunk source: Arrow's
/// CSV and Parquet readers qualify as they are. An `Err` item ends the run.
pub trait ChunkSource: Iterator<Item = Result<RecordBatch, ArrowError>> {}

impl<I> ChunkSource for I where I: Iterator<Item = Result<RecordBatch, ArrowError>> {}

/// Produces a fresh [`ChunkSource`] over the same data on every call.
///
/// Multi-pass checks re-read the data through it. Each call must yield the
/// same rows in the same order.
pub trait SourceFactory {
    type Source: ChunkSource;

    fn open(&mut self) -> Result<Self::Source, EngineError>;
}

impl<F, S> SourceFactory for F
where
    F: FnMut() -> Result<S, EngineError>,
    S: ChunkSource,
{
    type Source = S;

    fn open(&mut self) -> Result<S, EngineError> {
        self()
    }
}

/// Chunks held in memory, re-iterable any number of times.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    chunks: Vec<RecordBatch>,
}

impl MemorySource {
    pub fn new(chunks: Vec<RecordBatch>) -> Self {
        Self { chunks }
    }

    pub fn num_rows(&self) -> usize {
        self.chunks.iter().map(RecordBatch::num_rows).sum()
    }

    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<RecordBatch, ArrowError>> + '_ {
        self.chunks.iter().cloned().map(Ok)
    }

    /// A factory over these chunks.
    pub fn factory(
        &self,
    ) -> impl FnMut() -> Result<std::vec::IntoIter<Result<RecordBatch, ArrowError>>, EngineError> + '_
    {
        move || Ok(self.iter().collect::<Vec<_>>().into_iter())
    }
}

impl From<Vec<RecordBatch>> for MemorySource {
    fn from(chunks: Vec<RecordBatch>) -> Self {
        Self::new(chunks)
    }
}
