//! Error types for the SynthSeg batch driver
//!
//! These are the fatal conditions that abort a run. Per-image problems are
//! reported as [`crate::types::SkipReason`] and never reach this type.

use std::path::PathBuf;
use std::time::Duration;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The container runtime executable is not on PATH
    #[error("{0} executable not found")]
    RuntimeNotFound(String),

    /// A dataset has no dataset_description.json
    #[error("dataset description not found: {}", .0.display())]
    MissingDescription(PathBuf),

    /// A dataset_description.json has no usable Name
    #[error("dataset description has no Name field: {}", .0.display())]
    MissingName(PathBuf),

    /// The descriptor lock could not be taken in time
    #[error("timed out after {waited:?} waiting for lock {}", path.display())]
    LockTimeout { path: PathBuf, waited: Duration },

    /// Bad command-line input discovered after parsing
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("glob pattern error: {0}")]
    Pattern(#[from] glob::PatternError),
}
