//! Store Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("could not create repository schema")]
    Schema,
    #[display("blob not found: {_0}")]
    BlobNotFound(#[error(not(source))] String),
    #[display("commit not found: {_0}")]
    CommitNotFound(#[error(not(source))] u64),
    #[display("path not found: {_0:?}")]
    PathNotFound(#[error(not(source))] String),
    #[display("repository not found: {_0:?}")]
    RepositoryNotFound(#[error(not(source))] String),
    #[display("repository already exists: {_0:?}")]
    AlreadyExists(#[error(not(source))] String),
    #[display("invalid input: {_0}")]
    InvalidInput(#[error(not(source))] String),
    #[display("nothing to commit")]
    NothingToCommit,
    /// A commit would have been left partially applied. Never retry.
    #[display("repository integrity violated")]
    Integrity,
    /// A stored value could not be converted to or from its row.
    #[display("invalid repository data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
    #[display("repository storage error")]
    Storage,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Only lock contention is worth retrying: every write recomputes its
    /// head and carry-forward from scratch.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::BlobNotFound(_) | Self::CommitNotFound(_) | Self::PathNotFound(_) | Self::RepositoryNotFound(_)
        )
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::AlreadyExists(_) | Self::NothingToCommit)
    }

    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::Integrity)
    }
}
