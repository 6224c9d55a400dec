//! Error types for Statwalker
//!
//! Per-entry failures (`Stat`, `List`) are produced by the stat resolver and
//! consumed by the traversal code, which logs and counts them. Everything
//! else is fatal to the run.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Statwalker operations
#[derive(Error, Debug)]
pub enum StatWalkerError {
    /// Entry could not be stat'ed (permission denied, vanished, I/O error)
    #[error("Cannot get stats for '{path}': {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory could not be listed
    #[error("Cannot list directory '{path}': {source}")]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Final output could not be created or written
    #[error("Cannot write output '{path}': {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Worker pool could not be built
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// Report serialization failed
    #[error("Report error: {0}")]
    Report(String),
}

impl StatWalkerError {
    /// Create a stat error with path context
    pub fn stat(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Stat {
            path: path.into(),
            source,
        }
    }

    /// Create a listing error with path context
    pub fn list(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::List {
            path: path.into(),
            source,
        }
    }

    /// Create an output error with path context
    pub fn output(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Output {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Per-entry failures never abort a scan
    pub fn is_entry_error(&self) -> bool {
        matches!(self, Self::Stat { .. } | Self::List { .. })
    }

    /// Check if this error is a permission issue
    pub fn is_permission_error(&self) -> bool {
        match self {
            Self::Stat { source, .. } | Self::List { source, .. } | Self::Output { source, .. } => {
                source.kind() == std::io::ErrorKind::PermissionDenied
            }
            _ => false,
        }
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Stat { path, .. } | Self::List { path, .. } | Self::Output { path, .. } => {
                Some(path)
            }
            _ => None,
        }
    }
}

/// Result type alias for Statwalker operations
pub type Result<T> = std::result::Result<T, StatWalkerError>;

impl From<serde_json::Error> for StatWalkerError {
    fn from(err: serde_json::Error) -> Self {
        StatWalkerError::Report(err.to_string())
    }
}

/// Extension trait for adding output-path context to std::io::Result
pub trait IoResultExt<T> {
    /// Wrap an I/O error as an output failure at `path`
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| StatWalkerError::output(path, e))
    }
}
