//! Manifest Builder: turns one change into the next commit.
//!
//! Every commit carries a complete manifest. Rows of the previous head that
//! the change does not touch are copied forward verbatim (same hash, same
//! timestamp), then the changed rows are inserted. Reading head and building
//! the next commit happen under one `BEGIN IMMEDIATE` transaction, so
//! concurrent writers are serialized by SQLite and readers only ever see a
//! commit together with its whole manifest.

use crate::content;
use crate::error::{ErrorKind, Result};
use crate::models::{Commit, CommitSummary, Signature, StagedRow};
use exn::ResultExt;
use sqlx::{SqliteConnection, SqlitePool};
use time::UtcDateTime;
use tracing::{debug, info, instrument};
use vellum_storage::{directory_marker, is_directory_marker, validate_path};

/// A single intended change to a repository's tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Create or overwrite a file.
    Write { path: String, bytes: Vec<u8> },
    /// Remove a path from the next manifest.
    Delete { path: String },
    /// Move a file, keeping its content.
    Rename { from: String, to: String },
    /// Make an (empty) directory representable.
    MakeDirectory { path: String },
    /// Commit every path currently in the staging area.
    Staged,
}
impl Change {
    pub fn write(path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::Write { path: path.into(), bytes: bytes.into() }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::Delete { path: path.into() }
    }

    pub fn rename(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::Rename { from: from.into(), to: to.into() }
    }

    pub fn make_directory(path: impl Into<String>) -> Self {
        Self::MakeDirectory { path: path.into() }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Write { .. } => "write",
            Self::Delete { .. } => "delete",
            Self::Rename { .. } => "rename",
            Self::MakeDirectory { .. } => "mkdir",
            Self::Staged => "staged",
        }
    }

    /// Validates every path and applies the directory marker rules. Runs
    /// before any storage access.
    fn normalize(self) -> Result<Self> {
        Ok(match self {
            Self::Write { path, bytes } => {
                let path = valid_path(&path)?;
                if is_directory_marker(&path) && !bytes.is_empty() {
                    exn::bail!(ErrorKind::InvalidInput(format!("{path:?} is reserved for directory markers")));
                }
                Self::Write { path, bytes }
            },
            Self::Delete { path } => Self::Delete { path: valid_path(&path)? },
            Self::Rename { from, to } => {
                let (from, to) = (valid_path(&from)?, valid_path(&to)?);
                if from == to {
                    exn::bail!(ErrorKind::InvalidInput(format!("cannot rename {from:?} onto itself")));
                }
                if is_directory_marker(&from) || is_directory_marker(&to) {
                    exn::bail!(ErrorKind::InvalidInput("directory markers cannot be renamed".to_string()));
                }
                Self::Rename { from, to }
            },
            Self::MakeDirectory { path } => Self::MakeDirectory {
                path: directory_marker(&path).or_raise(|| ErrorKind::InvalidInput(format!("directory {path:?}")))?,
            },
            Self::Staged => Self::Staged,
        })
    }
}

pub(crate) fn valid_path(path: &str) -> Result<String> {
    validate_path(path).or_raise(|| ErrorKind::InvalidInput(format!("path {path:?}")))
}

/// A manifest row about to be inserted under the new commit.
struct Row {
    path: String,
    hash: String,
    datetime: i64,
}

/// Current head, `None` for a repository without commits.
pub(crate) async fn head(conn: &mut SqliteConnection) -> Result<Option<i64>> {
    sqlx::query_scalar(include_str!("../queries/get_head.sql"))
        .fetch_one(&mut *conn)
        .await
        .or_raise(|| ErrorKind::Database)
}

/// Hash a path resolves to at `commit`, or [`ErrorKind::PathNotFound`].
async fn require(conn: &mut SqliteConnection, commit: Option<i64>, path: &str) -> Result<String> {
    let Some(commit) = commit else {
        exn::bail!(ErrorKind::PathNotFound(path.to_string()));
    };
    let hash: Option<String> = sqlx::query_scalar("SELECT hash FROM files WHERE commit_id = ?1 AND path = ?2")
        .bind(commit)
        .bind(path)
        .fetch_optional(&mut *conn)
        .await
        .or_raise(|| ErrorKind::Database)?;
    match hash {
        Some(hash) => Ok(hash),
        None => exn::bail!(ErrorKind::PathNotFound(path.to_string())),
    }
}

/// Builds the next commit from `change` and makes it head.
///
/// Nothing is written when any step fails: the transaction is rolled back
/// when dropped, leaving the previous head in place.
#[instrument(level = "debug", skip_all, fields(change = change.kind()))]
pub(crate) async fn commit(pool: &SqlitePool, change: Change, signature: &Signature) -> Result<CommitSummary> {
    signature.validate()?;
    let change = change.normalize()?;
    let now = UtcDateTime::now().unix_timestamp();

    let mut tx = pool.begin_with("BEGIN IMMEDIATE").await.or_raise(|| ErrorKind::Database)?;
    let previous = head(&mut tx).await?;

    let mut clear_staging = false;
    let (rows, changed) = match change {
        Change::Write { path, bytes } => {
            let stored = content::insert(&mut tx, &bytes).await?;
            (vec![Row { path: path.clone(), hash: stored.hash, datetime: now }], vec![path])
        },
        Change::MakeDirectory { path } => {
            let stored = content::insert(&mut tx, b"").await?;
            (vec![Row { path: path.clone(), hash: stored.hash, datetime: now }], vec![path])
        },
        Change::Delete { path } => {
            require(&mut tx, previous, &path).await?;
            (Vec::new(), vec![path])
        },
        Change::Rename { from, to } => {
            let hash = require(&mut tx, previous, &from).await?;
            (vec![Row { path: to.clone(), hash, datetime: now }], vec![from, to])
        },
        Change::Staged => {
            let staged: Vec<StagedRow> = sqlx::query_as(include_str!("../queries/list_staging.sql"))
                .fetch_all(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
            if staged.is_empty() {
                exn::bail!(ErrorKind::NothingToCommit);
            }
            clear_staging = true;
            let rows: Vec<Row> = staged
                .into_iter()
                .map(|s| {
                    let (path, hash, datetime) = s.into_parts();
                    Row { path, hash, datetime }
                })
                .collect();
            let changed = rows.iter().map(|r| r.path.clone()).collect();
            (rows, changed)
        },
    };

    let id: i64 = sqlx::query_scalar(include_str!("../queries/insert_commit.sql"))
        .bind(&signature.message)
        .bind(now)
        .bind(&signature.author)
        .fetch_one(&mut *tx)
        .await
        .or_raise(|| ErrorKind::Database)?;
    if previous.is_some_and(|previous| id <= previous) {
        exn::bail!(ErrorKind::Integrity);
    }

    let carried = match previous {
        Some(previous) => {
            let changed = serde_json::to_string(&changed).or_raise(|| ErrorKind::InvalidData("changed paths"))?;
            sqlx::query(include_str!("../queries/carry_forward.sql"))
                .bind(id)
                .bind(previous)
                .bind(changed)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?
                .rows_affected()
        },
        None => 0,
    };
    debug!(id, ?previous, carried, changed = rows.len(), "carried manifest forward");

    for row in &rows {
        sqlx::query(include_str!("../queries/insert_file.sql"))
            .bind(&row.path)
            .bind(&row.hash)
            .bind(row.datetime)
            .bind(id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Integrity)?;
    }
    if clear_staging {
        sqlx::query("DELETE FROM staging").execute(&mut *tx).await.or_raise(|| ErrorKind::Database)?;
    }
    tx.commit().await.or_raise(|| ErrorKind::Database)?;

    let file_count = carried + rows.len() as u64;
    info!(id, file_count, "commit is now head");
    Ok(CommitSummary {
        commit: Commit {
            id: u64::try_from(id).or_raise(|| ErrorKind::InvalidData("commit id"))?,
            message: signature.message.clone(),
            author: signature.author.clone(),
            timestamp: crate::models::timestamp(now)?,
        },
        file_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn signature() -> Signature {
        Signature::new("alice", "change")
    }

    async fn rows_for(db: &Database, commit: u64) -> Vec<(String, String)> {
        sqlx::query_as("SELECT path, hash FROM files WHERE commit_id = ?1 ORDER BY path")
            .bind(commit as i64)
            .fetch_all(db.pool())
            .await
            .unwrap()
    }

    #[test]
    fn test_normalize_paths() {
        let change = Change::write("a\\b/../c.txt", b"x".to_vec()).normalize().unwrap();
        assert_eq!(change, Change::write("a/c.txt", b"x".to_vec()));
        let change = Change::make_directory("docs/").normalize().unwrap();
        assert_eq!(change, Change::make_directory("docs/.vellumdir"));
    }

    #[test]
    fn test_normalize_rejects() {
        for change in [
            Change::write("../../etc/passwd", b"x".to_vec()),
            Change::write("a\0b", b"x".to_vec()),
            Change::write("docs/.vellumdir", b"x".to_vec()),
            Change::delete(""),
            Change::rename("a.txt", "./a.txt"),
            Change::rename("docs/.vellumdir", "other/.vellumdir"),
            Change::make_directory(".."),
        ] {
            let err = change.clone().normalize().unwrap_err();
            assert!(matches!(&*err, ErrorKind::InvalidInput(_)), "{change:?}");
        }
    }

    #[tokio::test]
    async fn test_first_commit_has_only_new_rows() {
        let db = Database::connect_in_memory().await.unwrap();
        let summary = commit(db.pool(), Change::write("a.txt", b"a".to_vec()), &signature()).await.unwrap();
        assert_eq!(summary.commit.id, 1);
        assert_eq!(summary.file_count, 1);
        assert_eq!(rows_for(&db, 1).await, vec![("a.txt".to_string(), content::hash(b"a"))]);
        db.close().await;
    }

    #[tokio::test]
    async fn test_each_commit_is_complete() {
        let db = Database::connect_in_memory().await.unwrap();
        commit(db.pool(), Change::write("a.txt", b"a".to_vec()), &signature()).await.unwrap();
        commit(db.pool(), Change::write("b.txt", b"b".to_vec()), &signature()).await.unwrap();
        let third = commit(db.pool(), Change::write("a.txt", b"A".to_vec()), &signature()).await.unwrap();
        assert_eq!(third.file_count, 2);
        // Commit 3 alone holds the whole tree, with the overwrite applied.
        assert_eq!(
            rows_for(&db, 3).await,
            vec![
                ("a.txt".to_string(), content::hash(b"A")),
                ("b.txt".to_string(), content::hash(b"b")),
            ]
        );
        db.close().await;
    }

    #[tokio::test]
    async fn test_carry_forward_keeps_timestamps() {
        let db = Database::connect_in_memory().await.unwrap();
        commit(db.pool(), Change::write("a.txt", b"a".to_vec()), &signature()).await.unwrap();
        sqlx::query("UPDATE files SET datetime = 1000 WHERE path = 'a.txt'").execute(db.pool()).await.unwrap();
        commit(db.pool(), Change::write("b.txt", b"b".to_vec()), &signature()).await.unwrap();
        let (datetime,): (i64,) = sqlx::query_as("SELECT datetime FROM files WHERE commit_id = 2 AND path = 'a.txt'")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(datetime, 1000);
        db.close().await;
    }

    #[tokio::test]
    async fn test_failed_change_leaves_head() {
        let db = Database::connect_in_memory().await.unwrap();
        commit(db.pool(), Change::write("a.txt", b"a".to_vec()), &signature()).await.unwrap();
        let err = commit(db.pool(), Change::delete("missing.txt"), &signature()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::PathNotFound(p) if p == "missing.txt"));
        let mut conn = db.pool().acquire().await.unwrap();
        assert_eq!(head(&mut conn).await.unwrap(), Some(1));
        drop(conn);
        db.close().await;
    }

    #[tokio::test]
    async fn test_failed_row_insert_rolls_back_commit() {
        let db = Database::connect_in_memory().await.unwrap();
        commit(db.pool(), Change::write("a.txt", b"a".to_vec()), &signature()).await.unwrap();
        let staging = crate::StagingArea::from(&db);
        staging.add("b.txt", b"b").await.unwrap();
        // Fails the second file row, after the commit row is already in.
        sqlx::query(
            "CREATE TEMP TRIGGER reject_b BEFORE INSERT ON files WHEN NEW.path = 'b.txt' \
             BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = commit(db.pool(), Change::Staged, &signature()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Integrity));

        let mut conn = db.pool().acquire().await.unwrap();
        assert_eq!(head(&mut conn).await.unwrap(), Some(1));
        drop(conn);
        let (commits,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM commits").fetch_one(db.pool()).await.unwrap();
        assert_eq!(commits, 1);
        let (orphans,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM files WHERE commit_id <> 1")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(orphans, 0);
        let staged: Vec<_> = staging.staged().await.unwrap().into_iter().map(|entry| entry.path).collect();
        assert_eq!(staged, vec!["b.txt"]);
        db.close().await;
    }

    #[tokio::test]
    async fn test_empty_signature_is_rejected() {
        let db = Database::connect_in_memory().await.unwrap();
        let err = commit(db.pool(), Change::write("a.txt", b"a".to_vec()), &Signature::new("alice", ""))
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidInput(_)));
        db.close().await;
    }

    #[tokio::test]
    async fn test_staged_without_entries() {
        let db = Database::connect_in_memory().await.unwrap();
        let err = commit(db.pool(), Change::Staged, &signature()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NothingToCommit));
        db.close().await;
    }
}
