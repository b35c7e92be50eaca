use crate::models::FileEntry;
use time::UtcDateTime;

/// A directory synthesized from the paths beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub path: String,
    /// Latest timestamp of anything beneath the directory.
    pub timestamp: UtcDateTime,
}

/// What a path prefix resolves to in a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    /// The prefix named a single file.
    File(FileEntry),
    /// The prefix named a directory (possibly empty, or the root).
    Directory { files: Vec<FileEntry>, dirs: Vec<DirectoryEntry> },
}
impl Listing {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Directory { files, dirs } if files.is_empty() && dirs.is_empty())
    }
}
