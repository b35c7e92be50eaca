//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// File does not exist
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Access denied by the operating system
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// File already exists (for operations that require new files)
    #[display("file already exists: {}", _0.display())]
    AlreadyExists(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Logical path contains traversal, NUL bytes, or nothing at all
    #[display("invalid path: {_0:?}")]
    InvalidPath(#[error(not(source))] String),
    /// Repository name is empty after sanitization
    #[display("invalid repository name: {_0:?}")]
    InvalidName(#[error(not(source))] String),
    /// Resolved filesystem path is not a descendant of the repository root
    #[display("path escapes repository root: {}", _0.display())]
    OutsideRoot(#[error(not(source))] PathBuf),
    /// Imported bytes are not a SQLite database
    #[display("not a repository file: {}", _0.display())]
    NotARepository(#[error(not(source))] PathBuf),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Returns `true` if the caller supplied something that can never be valid.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidPath(_) | Self::InvalidName(_) | Self::OutsideRoot(_) | Self::NotARepository(_))
    }
}
