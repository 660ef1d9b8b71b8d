//! ==============================================================================
//! error.rs - endpoint error taxonomy
//! ==============================================================================
//!
//! purpose:
//!     typed errors for the file-backed endpoints. none of these are fatal:
//!     handlers turn them into an empty response and a log line.
//!
//! taxonomy:
//!     - SourceUnavailable: backing path missing, handler emits no body
//!     - DecodeFailure: one malformed log line, counted and skipped
//!     - KeyAbsent: record without model/id, dropped
//!     - PathRejected: traversal attempt in a requested file name
//!
//! ==============================================================================

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HostError>;

#[derive(Error, Debug)]
pub enum HostError {
    /// backing file or directory does not exist
    #[error("source unavailable: {}", .0.display())]
    SourceUnavailable(PathBuf),

    /// a single log line could not be decoded into a record
    #[error("line {line}: {reason}")]
    DecodeFailure { line: usize, reason: String },

    /// a required record key is missing or empty
    #[error("record has no `{0}`")]
    KeyAbsent(&'static str),

    /// requested name contains a path separator or parent segment
    #[error("rejected path: {0}")]
    PathRejected(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl HostError {
    /// errors the front-end expects to see as an empty response
    pub fn is_quiet(&self) -> bool {
        matches!(self, Self::SourceUnavailable(_) | Self::PathRejected(_))
    }
}
