//! Progress and reporting module
//!
//! Phase spinner for interactive runs and the load-balance report of the
//! parallel phase.

mod report;
mod reporter;

pub use report::*;
pub use reporter::*;
