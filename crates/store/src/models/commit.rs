use crate::error::{Error, ErrorKind, Result};
use crate::models::{timestamp, unsigned};
use time::UtcDateTime;

/// Who is committing, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub author: String,
    pub message: String,
}
impl Signature {
    pub fn new(author: impl Into<String>, message: impl Into<String>) -> Self {
        Self { author: author.into(), message: message.into() }
    }

    /// Both fields are required; whitespace alone does not count.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.message.trim().is_empty() {
            exn::bail!(ErrorKind::InvalidInput("commit message is empty".to_string()));
        }
        if self.author.trim().is_empty() {
            exn::bail!(ErrorKind::InvalidInput("commit author is empty".to_string()));
        }
        Ok(())
    }
}

/// An immutable entry of the commit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: u64,
    pub message: String,
    pub author: String,
    pub timestamp: UtcDateTime,
}

/// A commit together with the size of its manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub commit: Commit,
    pub file_count: u64,
}

/// The content a path resolved to in one commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub commit: Commit,
    pub hash: String,
    pub size: u64,
    /// When this content was written to the path.
    pub written: UtcDateTime,
}

/// Repository-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub commits: u64,
    pub blobs: u64,
    pub blob_bytes: u64,
    pub manifest_rows: u64,
}

#[derive(sqlx::FromRow)]
pub(crate) struct CommitRow {
    id: i64,
    message: String,
    datetime: i64,
    author: String,
}
impl TryFrom<CommitRow> for Commit {
    type Error = Error;
    fn try_from(row: CommitRow) -> Result<Self> {
        Ok(Self {
            id: unsigned(row.id, "commit id")?,
            message: row.message,
            author: row.author,
            timestamp: timestamp(row.datetime)?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct SummaryRow {
    #[sqlx(flatten)]
    commit: CommitRow,
    file_count: i64,
}
impl TryFrom<SummaryRow> for CommitSummary {
    type Error = Error;
    fn try_from(row: SummaryRow) -> Result<Self> {
        Ok(Self {
            commit: row.commit.try_into()?,
            file_count: unsigned(row.file_count, "file count")?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct RevisionRow {
    #[sqlx(flatten)]
    commit: CommitRow,
    hash: String,
    size: i64,
    written: i64,
}
impl TryFrom<RevisionRow> for Revision {
    type Error = Error;
    fn try_from(row: RevisionRow) -> Result<Self> {
        Ok(Self {
            commit: row.commit.try_into()?,
            hash: row.hash,
            size: unsigned(row.size, "blob size")?,
            written: timestamp(row.written)?,
        })
    }
}
