//! Core scan engine module
//!
//! Provides the partitioning prepass, seeded chunking, the fixed-size
//! worker pool, the output merger and the engine running them in order.

mod chunker;
mod engine;
mod merger;
mod partition;
mod pool;

pub use chunker::*;
pub use engine::*;
pub use merger::*;
pub use partition::*;
pub use pool::*;
