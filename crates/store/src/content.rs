//! Content-addressed blob storage.
//!
//! Blobs are keyed by the lowercase hex SHA-256 of their bytes. A blob is
//! written at most once and never deleted; older commits keep resolving to
//! it even after the latest manifest stops referencing it.

use crate::Database;
use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use sha2::{Digest, Sha256};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

/// Hashes bytes the way blobs are keyed.
///
/// ```
/// assert_eq!(
///     vellum_store::hash(b"hello"),
///     "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
/// );
/// ```
pub fn hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Returns `true` for a well-formed blob key: 64 lowercase hex digits.
pub fn is_valid_hash(hash: &str) -> bool {
    hash.len() == 64 && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn check_hash(hash: &str) -> Result<()> {
    if !is_valid_hash(hash) {
        exn::bail!(ErrorKind::InvalidInput(format!("malformed blob hash {hash:?}")));
    }
    Ok(())
}

/// Outcome of a [`ContentStore::put`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stored {
    pub hash: String,
    pub size: u64,
    /// `false` when identical bytes were already stored.
    pub is_new: bool,
}

/// Insert-if-absent on an open connection, so callers can make the blob
/// part of a larger transaction.
pub(crate) async fn insert(conn: &mut SqliteConnection, bytes: &[u8]) -> Result<Stored> {
    let hash = hash(bytes);
    let size = i64::try_from(bytes.len()).or_raise(|| ErrorKind::InvalidData("blob size"))?;
    let result = sqlx::query(include_str!("../queries/insert_blob.sql"))
        .bind(&hash)
        .bind(bytes)
        .bind(size)
        .execute(conn)
        .await
        .or_raise(|| ErrorKind::Database)?;
    let is_new = result.rows_affected() > 0;
    debug!(%hash, size, is_new, "stored blob");
    Ok(Stored { hash, size: bytes.len() as u64, is_new })
}

/// Standalone access to a repository's blobs.
#[derive(Debug, Clone)]
pub struct ContentStore {
    pool: SqlitePool,
}
impl From<&Database> for ContentStore {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl ContentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store bytes, deduplicating on their hash.
    pub async fn put(&self, bytes: &[u8]) -> Result<Stored> {
        let mut conn = self.pool.acquire().await.or_raise(|| ErrorKind::Database)?;
        insert(&mut conn, bytes).await
    }

    /// Fetch the bytes stored under `hash`.
    pub async fn get(&self, hash: &str) -> Result<Vec<u8>> {
        check_hash(hash)?;
        let row: Option<(Vec<u8>,)> = sqlx::query_as(include_str!("../queries/get_blob.sql"))
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(row.ok_or_raise(|| ErrorKind::BlobNotFound(hash.to_string()))?.0)
    }

    pub async fn contains(&self, hash: &str) -> Result<bool> {
        check_hash(hash)?;
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM blobs WHERE hash = ?1")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(row.is_some())
    }

    /// Size in bytes of the blob stored under `hash`.
    pub async fn size(&self, hash: &str) -> Result<u64> {
        check_hash(hash)?;
        let row: Option<(i64,)> = sqlx::query_as("SELECT size FROM blobs WHERE hash = ?1")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let (size,) = row.ok_or_raise(|| ErrorKind::BlobNotFound(hash.to_string()))?;
        u64::try_from(size).or_raise(|| ErrorKind::InvalidData("blob size"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    async fn store() -> (Database, ContentStore) {
        let db = Database::connect_in_memory().await.unwrap();
        let store = ContentStore::from(&db);
        (db, store)
    }

    async fn blob_rows(db: &Database) -> i64 {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM blobs").fetch_one(db.pool()).await.unwrap();
        row.0
    }

    #[test]
    fn test_hash_empty() {
        assert_eq!(hash(b""), "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
    }

    #[rstest]
    #[case("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855", true)]
    #[case("E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855", false)]
    #[case("e3b0c442", false)]
    #[case("", false)]
    #[case("../../etc/passwd", false)]
    #[case("g3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855", false)]
    fn test_is_valid_hash(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(is_valid_hash(input), expected);
    }

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let (db, store) = store().await;
        let first = store.put(b"hello").await.unwrap();
        let second = store.put(b"hello").await.unwrap();
        assert_eq!(first.hash, second.hash);
        assert!(first.is_new);
        assert!(!second.is_new);
        assert_eq!(blob_rows(&db).await, 1);
        assert_eq!(store.size(&first.hash).await.unwrap(), 5);
        db.close().await;
    }

    #[tokio::test]
    async fn test_get_round_trip() {
        let (db, store) = store().await;
        let stored = store.put(b"some bytes").await.unwrap();
        assert!(store.contains(&stored.hash).await.unwrap());
        assert_eq!(store.get(&stored.hash).await.unwrap(), b"some bytes");
        db.close().await;
    }

    #[tokio::test]
    async fn test_get_unknown_hash() {
        let (db, store) = store().await;
        let missing = hash(b"never stored");
        let err = store.get(&missing).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::BlobNotFound(h) if *h == missing));
        assert!(!store.contains(&missing).await.unwrap());
        db.close().await;
    }

    #[tokio::test]
    async fn test_get_malformed_hash() {
        let (db, store) = store().await;
        let err = store.get("not-a-hash").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidInput(_)));
        db.close().await;
    }
}
