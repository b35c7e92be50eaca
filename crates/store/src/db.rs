//! Database connection and pool management.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

/// Idempotent schema script, applied on every connect.
const SCHEMA: &str = include_str!("../schema.sql");

/// Connection tuning for repository databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    pub max_connections: u32,
    pub busy_timeout: Duration,
}
impl Default for Options {
    fn default() -> Self {
        Self {
            max_connections: 5,
            // Commits take the write lock up front (BEGIN IMMEDIATE); a
            // second writer waits this long before giving up with SQLITE_BUSY.
            busy_timeout: Duration::from_millis(1500),
        }
    }
}

/// Connection pool for a single repository database.
///
/// This is the main entry point for interacting with a repository. It
/// manages the SQLite connection pool; the operations themselves live on
/// [`crate::Repository`] and friends.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    async fn new(options: SqliteConnectOptions, max: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // Apply the query-based PRAGMAs to EVERY connection instead of
            // only the first connection returned by the pool.
            .after_connect(|conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta).await }))
            .max_connections(max.max(1))
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    /// Create a repository database at the given path, or open it if the
    /// file is already there.
    pub async fn create(path: impl AsRef<Path>, options: &Options) -> Result<Self> {
        let connect = Self::base_options(options).filename(path.as_ref()).create_if_missing(true);
        Self::new(connect, options.max_connections).await
    }

    /// Open an existing repository database. Fails if the file is missing.
    pub async fn open(path: impl AsRef<Path>, options: &Options) -> Result<Self> {
        let connect = Self::base_options(options).filename(path.as_ref()).create_if_missing(false);
        Self::new(connect, options.max_connections).await
    }

    /// Connect to an in-memory database (useful for testing).
    ///
    /// Note:
    /// - In-memory databases are destroyed when the connection closes.
    /// - Do NOT apply `#[cfg(test)]` so that other crates can also use this in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        let connect = Self::base_options(&Options::default()).filename(":memory:");
        // In-memory database must be limited to one connection. Otherwise
        // parallel connections will see different databases that contain
        // different data.
        Self::new(connect, 1).await
    }

    /// Base connection options shared between file and in-memory databases.
    fn base_options(options: &Options) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            // Readers never block the single writer.
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            // files.hash -> blobs.hash and files.commit_id -> commits.id
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(options.busy_timeout)
            .auto_vacuum(sqlx::sqlite::SqliteAutoVacuum::None)
    }

    /// Apply additional PRAGMA settings that aren't exposed via SqliteConnectOptions.
    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA locking_mode = NORMAL;
                PRAGMA wal_autocheckpoint = 800;
                PRAGMA cache_size = -8192;
                PRAGMA temp_store = MEMORY;
                PRAGMA analysis_limit = 1000;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Create the four relations when missing.
    ///
    /// There is no schema version: the script only ever creates what is not
    /// there yet, so it is safe to run against any repository file.
    #[instrument(level = "debug", skip(self))]
    async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await.or_raise(|| ErrorKind::Schema)?;
        Ok(())
    }

    /// Fold the write-ahead log back into the main database file, so the
    /// file alone holds every commit (export).
    pub async fn checkpoint(&self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    ///
    /// This waits for all connections to be returned to the pool and then
    /// closes them. After calling this, the Database instance should not
    /// be used.
    pub async fn close(&self) {
        // Let SQLite update query planner statistics
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}
