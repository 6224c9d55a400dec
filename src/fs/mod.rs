//! File system layer
//!
//! Stat resolution without following links, the CSV record schema,
//! skip filtering and the recursive subtree walker.

mod record;
mod resolver;
mod skip;
mod walker;

pub use record::*;
pub use resolver::*;
pub use skip::SkipSet;
pub use walker::{FailureCounts, RecordSink, Walker};
