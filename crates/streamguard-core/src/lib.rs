//! Streaming data-quality checks over Arrow record batches.
//!
//! A [`SinglePassCoordinator`] reads a chunk source once and feeds every
//! chunk to each registered check. Checks run either over every row or over
//! a uniform reservoir sample, and report failed and total counts, failing
//! rows as evidence and, for sampled checks, how far the sample can be
//! trusted. Exact uniqueness over datasets larger than memory is handled by
//! [`MemoryBoundedKeySet`], which spills keys to a temporary on-disk store.
pub mod checks;
pub mod engine;
pub mod errors;
pub mod keyset;
pub mod results;
pub mod sampling;
pub mod sources;
pub mod stats;
pub mod types;
pub mod utils;

pub use checks::{CheckParams, CheckRegistry, Evaluator, Verdict};
pub use engine::{CheckConfig, CheckState, ExecutionMode, MemorySource, SinglePassCoordinator};
pub use errors::{CheckError, EngineError, KeySetError, SamplingError};
pub use keyset::{KeySetConfig, KeySetConfigBuilder, MemoryBoundedKeySet};
pub use results::{CheckResult, FailureSample, RunReport, SamplingInfo};
pub use sampling::{Reservoir, ReservoirSampler, Sample};
pub use sources::{
    CsvSource, FileFormat, FileSource, ParquetSource, ReaderConfig, ReaderConfigBuilder,
};
pub use stats::StreamingMoments;
pub use types::{Chunk, ChunkView, Chunks, RowIds};
