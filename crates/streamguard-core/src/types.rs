use arrow::record_batch::RecordBatch;

/// One batch of records yielded by a chunk source.
pub type Chunk = RecordBatch;
pub type Chunks = Vec<Chunk>;

/// Identifies the source rows behind the rows of a batch handed to a check.
///
/// Full-scan chunks cover a contiguous range of the dataset. Samples carry the
/// origin index of every retained row instead.
#[derive(Debug, Clone, Copy)]
pub enum RowIds<'a> {
    Contiguous(u64),
    Explicit(&'a [u64]),
}

impl RowIds<'_> {
    /// Dataset row index of the `i`-th row of the batch.
    #[inline]
    pub fn get(&self, i: usize) -> u64 {
        match self {
            RowIds::Contiguous(offset) => offset + i as u64,
            RowIds::Explicit(ids) => ids[i],
        }
    }
}

/// A batch together with the dataset row indices of its rows.
#[derive(Debug, Clone, Copy)]
pub struct ChunkView<'a> {
    pub batch: &'a RecordBatch,
    pub row_ids: RowIds<'a>,
}

impl<'a> ChunkView<'a> {
    pub fn new(batch: &'a RecordBatch, row_ids: RowIds<'a>) -> Self {
        Self { batch, row_ids }
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn row_id(&self, i: usize) -> u64 {
        self.row_ids.get(i)
    }
}
