use thiserror::Error;

/// Errors raised by a single check. They never leave the `CheckState` that
/// owns the check: the state converts them into a failed `CheckResult`.
#[derive(Error, Debug)]
pub enum CheckError {
    /// The check could not be built from its configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Column not found in the current RecordBatch
    #[error("Column '{0}' not found in RecordBatch")]
    ColumnNotFound(String),

    /// The value could not be cast to the expected type
    #[error("Failed to cast column '{0}' to type {1}")]
    TypeCastError(String, String),

    /// The Arrow kernel produced an error (e.g., unsupported cast)
    #[error("Arrow computation error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    /// The key set backing the check failed; exactness can no longer be guaranteed
    #[error("Key set error: {0}")]
    KeySet(#[from] KeySetError),

    /// The reservoir could not be built or materialized
    #[error("Sampling error: {0}")]
    Sampling(#[from] SamplingError),
}

/// Errors raised by `MemoryBoundedKeySet` and its spill store.
#[derive(Error, Debug)]
pub enum KeySetError {
    /// Temporary spill file could not be created or removed
    #[error("Spill file IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The embedded store rejected a read or a write
    #[error("Spill store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// The key set was used after `close()`
    #[error("Key set is closed")]
    Closed,

    #[error("Invalid key set configuration: {0}")]
    InvalidConfig(String),
}

/// Errors raised by the reservoir sampler.
#[derive(Error, Debug)]
pub enum SamplingError {
    #[error("Reservoir capacity must be greater than zero")]
    ZeroCapacity,

    /// Chunks offered to the same sampler must share one schema
    #[error("Chunk schema does not match the schema of previously sampled chunks")]
    SchemaMismatch,

    #[error("Cannot materialize sample: {0}")]
    Materialize(#[from] arrow::error::ArrowError),
}

/// Errors that abort a whole validation run.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The chunk source failed mid-iteration; partial results are discarded
    #[error("Data access error on pass {pass}, chunk {chunk_index}: {source}")]
    DataAccess {
        pass: u8,
        chunk_index: usize,
        #[source]
        source: arrow::error::ArrowError,
    },

    /// The source factory could not produce a chunk source
    #[error("Failed to open chunk source: {0}")]
    SourceOpen(String),

    /// `process_chunk` was called on a finalized check
    #[error("Check '{0}' is already finalized")]
    AlreadyFinalized(String),

    /// A pass was started that the check state cannot take part in
    #[error("Check '{check_id}' cannot begin pass {pass}")]
    InvalidPass { check_id: String, pass: u8 },
}
