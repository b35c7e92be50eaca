//! Staging Area for the local client.
//!
//! Staged paths wait here, already stored as blobs, until the next commit
//! turns all of them into manifest rows at once.

use crate::Database;
use crate::content;
use crate::error::{ErrorKind, Result};
use crate::manifest::{self, Change, valid_path};
use crate::models::{CommitSummary, Signature, StagedEntry, StagedRow};
use exn::ResultExt;
use sqlx::SqlitePool;
use time::UtcDateTime;
use tracing::{debug, instrument};
use vellum_storage::is_directory_marker;

#[derive(Debug, Clone)]
pub struct StagingArea {
    pool: SqlitePool,
}
impl From<&Database> for StagingArea {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl StagingArea {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store `bytes` and stage them at `path`, replacing anything staged
    /// there before. Returns the content hash.
    #[instrument(level = "debug", skip(self, bytes), fields(size = bytes.len()))]
    pub async fn add(&self, path: &str, bytes: &[u8]) -> Result<String> {
        let path = valid_path(path)?;
        if is_directory_marker(&path) && !bytes.is_empty() {
            exn::bail!(ErrorKind::InvalidInput(format!("{path:?} is reserved for directory markers")));
        }
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let stored = content::insert(&mut tx, bytes).await?;
        sqlx::query(include_str!("../queries/upsert_staging.sql"))
            .bind(&path)
            .bind(&stored.hash)
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        debug!(%path, hash = %stored.hash, "staged");
        Ok(stored.hash)
    }

    /// Drop `path` from the staging area. The blob stays.
    pub async fn unstage(&self, path: &str) -> Result<()> {
        let path = valid_path(path)?;
        let result = sqlx::query("DELETE FROM staging WHERE path = ?1")
            .bind(&path)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::PathNotFound(path));
        }
        Ok(())
    }

    /// Everything currently staged, ordered by path.
    pub async fn staged(&self) -> Result<Vec<StagedEntry>> {
        let rows: Vec<StagedRow> = sqlx::query_as(include_str!("../queries/list_staging.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(StagedEntry::try_from).collect()
    }

    /// Commit every staged path and empty the staging area, atomically.
    ///
    /// Paths of the previous head that were not staged are carried forward.
    pub async fn commit(&self, signature: &Signature) -> Result<CommitSummary> {
        manifest::commit(&self.pool, Change::Staged, signature).await
    }
}
