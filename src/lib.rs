//! # Statwalker - Parallel Filesystem Metadata Scanner
//!
//! Statwalker walks one or more directory trees and writes the raw `lstat`
//! metadata of every entry to a single CSV file. It is built for very large
//! trees (HPC scratch and project file systems) where a single-threaded walk
//! takes hours.
//!
//! ## How a scan runs
//!
//! - **Partitioning**: a single-threaded prepass descends `balance` directory
//!   levels. Directories seen on the way are recorded right away; everything
//!   at the depth limit becomes a work item.
//! - **Chunking**: work items are shuffled with a seeded RNG and split into
//!   one near-equal chunk per worker.
//! - **Parallel walk**: a fixed pool of workers walks its chunk depth-first,
//!   spooling CSV lines through a private channel.
//! - **Merge**: header, prepass records, then each worker's spool in
//!   assignment order, so the same seed reproduces the same file.
//!
//! Unreadable entries are logged and counted, never fatal. Symbolic links
//! are recorded as links and never followed. Hard links are not
//! deduplicated.
//!
//! ## Quick Start
//!
//! ```no_run
//! use statwalker::config::ScanConfig;
//! use statwalker::core::ScanEngine;
//! use std::path::PathBuf;
//!
//! let config = ScanConfig {
//!     roots: vec![PathBuf::from("/data")],
//!     output: PathBuf::from("data.csv"),
//!     workers: 16,
//!     ..Default::default()
//! };
//!
//! let summary = ScanEngine::new(config).execute().unwrap();
//! summary.print_summary();
//! ```
//!
//! ## Walking a single subtree
//!
//! ```no_run
//! use statwalker::fs::{SkipSet, StatRecord, StatResolver, Walker};
//! use std::path::Path;
//!
//! let resolver = StatResolver::new();
//! let skip = SkipSet::new([".snapshot"]);
//! let mut records: Vec<StatRecord> = Vec::new();
//!
//! let (count, size) = Walker::new(&resolver, &skip).walk(Path::new("/data/project"), &mut records);
//! println!("{} entries, {} bytes", count, size);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod error;
pub mod fs;
pub mod progress;

// Re-export commonly used types
pub use config::{CliArgs, ScanConfig};
pub use core::{ScanEngine, ScanSummary};
pub use error::{Result, StatWalkerError};
pub use progress::ScanProgress;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use statwalker::prelude::*;
    //! ```

    pub use crate::config::{ScanConfig, WorkerCount};
    pub use crate::core::{Chunker, Merger, Partitioner, ScanEngine, ScanSummary, WorkerPool};
    pub use crate::error::{Result, StatWalkerError};
    pub use crate::fs::{OwnerLookup, SkipSet, StatRecord, StatResolver, Walker};
    pub use crate::progress::{ParallelReport, ScanProgress};
}
