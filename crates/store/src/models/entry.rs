use crate::error::{Error, Result};
use crate::models::{timestamp, unsigned};
use time::UtcDateTime;
use vellum_storage::is_directory_marker;

/// A regular file in a commit's manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub hash: String,
    pub size: u64,
    pub timestamp: UtcDateTime,
}
impl FileEntry {
    /// Final path segment.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// One row of a commit's manifest.
///
/// Directory markers are told apart once, when the row is read, so nothing
/// above this layer ever matches on the marker file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    File(FileEntry),
    DirectoryMarker { path: String, timestamp: UtcDateTime },
}
impl Entry {
    pub fn path(&self) -> &str {
        match self {
            Self::File(file) => &file.path,
            Self::DirectoryMarker { path, .. } => path,
        }
    }

    pub fn timestamp(&self) -> UtcDateTime {
        match self {
            Self::File(file) => file.timestamp,
            Self::DirectoryMarker { timestamp, .. } => *timestamp,
        }
    }

    pub fn is_directory_marker(&self) -> bool {
        matches!(self, Self::DirectoryMarker { .. })
    }
}

/// A file read back from a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub hash: String,
    pub timestamp: UtcDateTime,
    pub bytes: Vec<u8>,
}

/// A path waiting in the staging area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedEntry {
    pub path: String,
    pub hash: String,
    pub size: u64,
    pub timestamp: UtcDateTime,
}

#[derive(sqlx::FromRow)]
pub(crate) struct EntryRow {
    path: String,
    hash: String,
    size: i64,
    datetime: i64,
}
impl TryFrom<EntryRow> for Entry {
    type Error = Error;
    fn try_from(row: EntryRow) -> Result<Self> {
        let timestamp = timestamp(row.datetime)?;
        if row.size == 0 && is_directory_marker(&row.path) {
            return Ok(Self::DirectoryMarker { path: row.path, timestamp });
        }
        Ok(Self::File(FileEntry {
            path: row.path,
            hash: row.hash,
            size: unsigned(row.size, "blob size")?,
            timestamp,
        }))
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct StagedRow {
    path: String,
    hash: String,
    size: i64,
    datetime: i64,
}
impl StagedRow {
    /// `(path, hash, datetime)`, as they go into a manifest row.
    pub(crate) fn into_parts(self) -> (String, String, i64) {
        (self.path, self.hash, self.datetime)
    }
}
impl TryFrom<StagedRow> for StagedEntry {
    type Error = Error;
    fn try_from(row: StagedRow) -> Result<Self> {
        Ok(Self {
            path: row.path,
            hash: row.hash,
            size: unsigned(row.size, "blob size")?,
            timestamp: timestamp(row.datetime)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    fn row(path: &str, size: i64) -> EntryRow {
        EntryRow {
            path: path.to_string(),
            hash: EMPTY.to_string(),
            size,
            datetime: 1_700_000_000,
        }
    }

    #[test]
    fn test_marker_rows_are_tagged() {
        let entry = Entry::try_from(row("docs/.vellumdir", 0)).unwrap();
        assert!(entry.is_directory_marker());
        assert_eq!(entry.path(), "docs/.vellumdir");
    }

    #[test]
    fn test_file_rows_are_tagged() {
        let entry = Entry::try_from(row("docs/readme.md", 0)).unwrap();
        let Entry::File(file) = entry else { panic!("expected a file") };
        assert_eq!(file.name(), "readme.md");
        assert_eq!(file.timestamp.unix_timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_non_empty_marker_is_a_file() {
        assert!(!Entry::try_from(row("docs/.vellumdir", 4)).unwrap().is_directory_marker());
    }
}
