//! Repository: every operation on a single repository database.
//!
//! Writes go through the Manifest Builder and always produce exactly one new
//! commit. Reads address either head or an explicit commit id; because every
//! manifest is complete, a read never looks at more than one commit.

use crate::Database;
use crate::content::ContentStore;
use crate::error::{ErrorKind, Result};
use crate::manifest::{self, Change, valid_path};
use crate::models::{
    Commit, CommitRow, CommitSummary, Entry, EntryRow, FileContent, Listing, Revision, RevisionRow, Signature,
    Stats, SummaryRow,
};
use crate::staging::StagingArea;
use crate::tree;
use exn::{OptionExt, ResultExt};
use sqlx::SqlitePool;
use vellum_storage::{is_directory_marker, join, sanitize_segment, validate_prefix};

#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn content(&self) -> ContentStore {
        ContentStore::new(self.pool.clone())
    }

    pub fn staging(&self) -> StagingArea {
        StagingArea::new(self.pool.clone())
    }

    // =========================================================================
    // Write
    // =========================================================================

    /// Apply one change as a new head commit.
    pub async fn apply(&self, change: Change, signature: &Signature) -> Result<CommitSummary> {
        manifest::commit(&self.pool, change, signature).await
    }

    /// Create or overwrite the file at `path`.
    pub async fn write(&self, path: &str, bytes: impl Into<Vec<u8>>, signature: &Signature) -> Result<CommitSummary> {
        self.apply(Change::write(path, bytes), signature).await
    }

    /// Remove `path` from the next commit. Earlier commits keep it.
    pub async fn delete(&self, path: &str, signature: &Signature) -> Result<CommitSummary> {
        self.apply(Change::delete(path), signature).await
    }

    /// Move `from` to `to` in a single commit.
    pub async fn rename(&self, from: &str, to: &str, signature: &Signature) -> Result<CommitSummary> {
        self.apply(Change::rename(from, to), signature).await
    }

    /// Create the directory `name` inside `parent` (`""` for the root).
    ///
    /// `name` is a single segment: separators in it become `_` instead of
    /// creating intermediate directories.
    pub async fn make_directory(&self, parent: &str, name: &str, signature: &Signature) -> Result<CommitSummary> {
        let parent = validate_prefix(parent).or_raise(|| ErrorKind::InvalidInput(format!("directory {parent:?}")))?;
        let name = sanitize_segment(name).or_raise(|| ErrorKind::InvalidInput(format!("directory name {name:?}")))?;
        self.apply(Change::make_directory(join(&parent, &name)), signature).await
    }

    // =========================================================================
    // Commits
    // =========================================================================

    /// The newest commit, if any.
    pub async fn head(&self) -> Result<Option<Commit>> {
        let row: Option<CommitRow> =
            sqlx::query_as("SELECT id, message, datetime, author FROM commits ORDER BY id DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database)?;
        row.map(Commit::try_from).transpose()
    }

    pub async fn get_commit(&self, id: u64) -> Result<CommitSummary> {
        let row: Option<SummaryRow> = sqlx::query_as(include_str!("../queries/get_summary.sql"))
            .bind(Self::commit_id(id)?)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.ok_or_raise(|| ErrorKind::CommitNotFound(id))?.try_into()
    }

    /// One page of the commit log, newest first. Pages start at 1; page 0 is
    /// treated as page 1.
    pub async fn get_log(&self, page: u64, page_size: u64) -> Result<Vec<CommitSummary>> {
        if page_size == 0 {
            exn::bail!(ErrorKind::InvalidInput("page size must be at least 1".to_string()));
        }
        let offset = (page.max(1) - 1)
            .checked_mul(page_size)
            .and_then(|offset| i64::try_from(offset).ok())
            .ok_or_raise(|| ErrorKind::InvalidInput(format!("page {page} is out of range")))?;
        let limit = i64::try_from(page_size).or_raise(|| ErrorKind::InvalidInput("page size".to_string()))?;
        let rows: Vec<SummaryRow> = sqlx::query_as(include_str!("../queries/get_log.sql"))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(CommitSummary::try_from).collect()
    }

    pub async fn commit_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM commits")
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("commit count"))
    }

    // =========================================================================
    // Trees
    // =========================================================================

    /// The complete manifest of a commit (head when `None`), ordered by path.
    ///
    /// A repository without commits has an empty manifest.
    pub async fn manifest(&self, commit: Option<u64>) -> Result<Vec<Entry>> {
        let Some(commit) = self.resolve(commit).await? else {
            return Ok(Vec::new());
        };
        let rows: Vec<EntryRow> = sqlx::query_as(include_str!("../queries/get_manifest.sql"))
            .bind(commit)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Entry::try_from).collect()
    }

    /// List the directory (or single file) at `prefix`.
    pub async fn list_directory(&self, prefix: &str, commit: Option<u64>) -> Result<Listing> {
        let prefix = validate_prefix(prefix).or_raise(|| ErrorKind::InvalidInput(format!("path {prefix:?}")))?;
        let Some(commit) = self.resolve(commit).await? else {
            return Ok(tree::synthesize(Vec::new(), &prefix));
        };
        let rows: Vec<EntryRow> = match prefix.is_empty() {
            true => {
                sqlx::query_as(include_str!("../queries/get_manifest.sql"))
                    .bind(commit)
                    .fetch_all(&self.pool)
                    .await
            },
            false => {
                sqlx::query_as(include_str!("../queries/get_manifest_prefix.sql"))
                    .bind(commit)
                    .bind(&prefix)
                    .fetch_all(&self.pool)
                    .await
            },
        }
        .or_raise(|| ErrorKind::Database)?;
        let entries = rows.into_iter().map(Entry::try_from).collect::<Result<Vec<_>>>()?;
        Ok(tree::synthesize(entries, &prefix))
    }

    /// Read a file as of a commit (head when `None`).
    pub async fn get_file(&self, path: &str, commit: Option<u64>) -> Result<FileContent> {
        let path = valid_path(path)?;
        if is_directory_marker(&path) {
            exn::bail!(ErrorKind::PathNotFound(path));
        }
        let Some(commit) = self.resolve(commit).await? else {
            exn::bail!(ErrorKind::PathNotFound(path));
        };
        let row: Option<(String, i64, Vec<u8>)> = sqlx::query_as(include_str!("../queries/get_file.sql"))
            .bind(commit)
            .bind(&path)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let (hash, datetime, bytes) = row.ok_or_raise(|| ErrorKind::PathNotFound(path.clone()))?;
        Ok(FileContent { hash, timestamp: crate::models::timestamp(datetime)?, bytes })
    }

    /// Every commit containing `path`, newest first, with the content the
    /// path resolved to in each.
    pub async fn history(&self, path: &str) -> Result<Vec<Revision>> {
        let path = valid_path(path)?;
        let rows: Vec<RevisionRow> = sqlx::query_as(include_str!("../queries/get_history.sql"))
            .bind(&path)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Revision::try_from).collect()
    }

    pub async fn stats(&self) -> Result<Stats> {
        let (commits, blobs, blob_bytes, manifest_rows): (i64, i64, i64, i64) =
            sqlx::query_as(include_str!("../queries/get_stats.sql"))
                .fetch_one(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database)?;
        let count = |value: i64| u64::try_from(value).or_raise(|| ErrorKind::InvalidData("statistics"));
        Ok(Stats {
            commits: count(commits)?,
            blobs: count(blobs)?,
            blob_bytes: count(blob_bytes)?,
            manifest_rows: count(manifest_rows)?,
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn commit_id(id: u64) -> Result<i64> {
        i64::try_from(id).or_raise(|| ErrorKind::CommitNotFound(id))
    }

    /// An explicit commit must exist; no commit means head, which is `None`
    /// for an empty repository.
    async fn resolve(&self, commit: Option<u64>) -> Result<Option<i64>> {
        match commit {
            Some(id) => {
                let found: Option<i64> = sqlx::query_scalar("SELECT id FROM commits WHERE id = ?1")
                    .bind(Self::commit_id(id)?)
                    .fetch_optional(&self.pool)
                    .await
                    .or_raise(|| ErrorKind::Database)?;
                Ok(Some(found.ok_or_raise(|| ErrorKind::CommitNotFound(id))?))
            },
            None => {
                let mut conn = self.pool.acquire().await.or_raise(|| ErrorKind::Database)?;
                manifest::head(&mut conn).await
            },
        }
    }
}
