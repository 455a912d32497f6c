//! Drives checks over a chunk source.
mod check_state;
mod coordinator;
mod source;


pub use check_state::{CheckConfig, CheckState, ExecutionMode, Phase};
pub use coordinator::{SinglePassCoordinator, MAX_PASSES};
pub use source::{ChunkSource, MemorySource, SourceFactory};
