//! The flat on-disk directory that holds every repository file.
//!
//! Each repository is a single SQLite database named `<name>.vellum`. This
//! module only deals with locating, listing and copying those files whole;
//! it never opens them.

use crate::error::{ErrorKind, Result};
use crate::name::{REPOSITORY_EXTENSION, display_name, sanitize_name};
use std::fs::create_dir_all as sync_create_dir;
use std::io::{Error as IoError, ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use time::UtcDateTime;
use tokio::fs;

/// Every SQLite 3 database starts with this header.
const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

/// Metadata of a repository file, as shown in a repository listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInfo {
    /// Repository name without the file extension
    pub name: String,
    /// File size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: UtcDateTime,
}

/// Directory containing all repository files.
///
/// The root is canonicalized on construction; every path handed out by
/// [`RepositoryRoot::locate`] is guaranteed to resolve beneath it.
#[derive(Debug, Clone)]
pub struct RepositoryRoot {
    root: PathBuf,
}
impl RepositoryRoot {
    /// Opens (creating when missing) the repository directory.
    ///
    /// ```no_run
    /// use vellum_storage::RepositoryRoot;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let root = RepositoryRoot::new("/var/lib/vellum/repositories")?;
    /// let notes = root.locate("notes")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = std::path::absolute(root.as_ref()).map_err(|e| map_io_error(e, root.as_ref()))?;
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::Io(IoError::from(IoErrorKind::NotADirectory)));
            }
        } else {
            // Only happens once at startup; not worth an async constructor.
            sync_create_dir(&root).map_err(|e| map_io_error(e, &root))?;
        }
        let root = root.canonicalize().map_err(|e| map_io_error(e, &root))?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Sanitizes a repository name and resolves it to its file path.
    ///
    /// The file does not have to exist yet.
    pub fn locate(&self, name: impl AsRef<str>) -> Result<PathBuf> {
        let file_name = sanitize_name(name)?;
        let candidate = self.root.join(file_name);
        self.contain(&candidate)?;
        Ok(candidate)
    }

    /// Returns whether a repository with this name already exists.
    pub fn exists(&self, name: impl AsRef<str>) -> Result<bool> {
        let path = self.locate(name)?;
        path.try_exists().map_err(|e| exn::Exn::from(map_io_error(e, &path)))
    }

    /// Requires `path` to resolve to a descendant of the root.
    ///
    /// Symlinks are followed. When the target does not exist yet its parent
    /// directory is checked instead.
    fn contain(&self, path: &Path) -> Result<()> {
        let resolved = match path.canonicalize() {
            Ok(resolved) => resolved,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                let parent = path.parent().unwrap_or(path);
                let parent = parent.canonicalize().map_err(|e| map_io_error(e, parent))?;
                match path.file_name() {
                    Some(file_name) => parent.join(file_name),
                    None => exn::bail!(ErrorKind::OutsideRoot(path.to_path_buf())),
                }
            },
            Err(e) => exn::bail!(map_io_error(e, path)),
        };
        if resolved == self.root || !resolved.starts_with(&self.root) {
            exn::bail!(ErrorKind::OutsideRoot(resolved));
        }
        Ok(())
    }

    /// Lists every repository file in the directory, sorted by name.
    pub async fn list(&self) -> Result<Vec<RepositoryInfo>> {
        let mut entries = fs::read_dir(&self.root).await.map_err(|e| map_io_error(e, &self.root))?;
        let mut repositories = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| map_io_error(e, &self.root))? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(REPOSITORY_EXTENSION) {
                continue;
            }
            let metadata = entry.metadata().await.map_err(|e| map_io_error(e, &path))?;
            if !metadata.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                tracing::warn!(path = %path.display(), "skipping repository file with non UTF-8 name");
                continue;
            };
            let modified = metadata.modified().map_err(|e| map_io_error(e, &path))?;
            repositories.push(RepositoryInfo {
                name: display_name(file_name).to_string(),
                size: metadata.len(),
                modified: UtcDateTime::from(modified),
            });
        }
        repositories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(repositories)
    }

    /// Reads a whole repository file (export).
    pub async fn read(&self, name: impl AsRef<str>) -> Result<Vec<u8>> {
        let path = self.locate(name)?;
        fs::read(&path).await.map_err(|e| exn::Exn::from(map_io_error(e, &path)))
    }

    /// Replaces a whole repository file with `bytes` (import).
    ///
    /// Shorthand for [`RepositoryRoot::prepare`] followed by
    /// [`PendingFile::persist`].
    #[tracing::instrument(level = "debug", skip(self, bytes), fields(size = bytes.len()))]
    pub async fn write(&self, name: impl AsRef<str> + std::fmt::Debug, bytes: Vec<u8>) -> Result<PathBuf> {
        self.prepare(name, bytes).await?.persist().await
    }

    /// Writes `bytes` to a temporary file next to the repository file
    /// without touching the repository itself.
    ///
    /// The bytes must carry the SQLite header. Dropping the returned file
    /// discards it.
    pub async fn prepare(&self, name: impl AsRef<str>, bytes: Vec<u8>) -> Result<PendingFile> {
        let target = self.locate(name)?;
        if !bytes.starts_with(SQLITE_MAGIC) {
            exn::bail!(ErrorKind::NotARepository(target));
        }

        let root = self.root.clone();
        let temp = tokio::task::spawn_blocking(move || -> Result<NamedTempFile> {
            let mut temp = NamedTempFile::new_in(&root).map_err(|e| map_io_error(e, &root))?;
            temp.write_all(&bytes).map_err(|e| map_io_error(e, temp.path()))?;
            temp.as_file().sync_all().map_err(|e| map_io_error(e, temp.path()))?;
            Ok(temp)
        })
        .await
        .map_err(|e| ErrorKind::Io(IoError::other(e)))??;
        Ok(PendingFile { temp, target })
    }
}

/// A repository file written beside its target, waiting to replace it.
#[derive(Debug)]
pub struct PendingFile {
    temp: NamedTempFile,
    target: PathBuf,
}
impl PendingFile {
    /// Where the bytes are right now; can be opened to check them.
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// The repository file this will replace.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Renames the file over its target, so readers see either the old or
    /// the new file, never a partial one.
    ///
    /// The write-ahead log and shared-memory files of the replaced
    /// repository are removed right before the rename; SQLite would
    /// otherwise replay them over the new file.
    pub async fn persist(self) -> Result<PathBuf> {
        let Self { temp, target } = self;
        let path = tokio::task::spawn_blocking(move || -> Result<PathBuf> {
            for sidecar in sidecars(&target) {
                match std::fs::remove_file(&sidecar) {
                    Err(e) if e.kind() != IoErrorKind::NotFound => exn::bail!(map_io_error(e, &sidecar)),
                    _ => {},
                }
            }
            temp.persist(&target).map_err(|e| map_io_error(e.error, &target))?;
            Ok(target)
        })
        .await
        .map_err(|e| ErrorKind::Io(IoError::other(e)))??;

        tracing::info!(path = %path.display(), "repository file written");
        Ok(path)
    }
}

/// `-wal` and `-shm` files SQLite keeps beside a database in WAL mode.
fn sidecars(path: &Path) -> [PathBuf; 2] {
    ["-wal", "-shm"].map(|suffix| {
        let mut sidecar = path.as_os_str().to_os_string();
        sidecar.push(suffix);
        PathBuf::from(sidecar)
    })
}

fn map_io_error(e: IoError, path: &Path) -> ErrorKind {
    match e.kind() {
        IoErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
        IoErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
        IoErrorKind::AlreadyExists => ErrorKind::AlreadyExists(path.to_path_buf()),
        _ => ErrorKind::Io(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn database_bytes(body: &[u8]) -> Vec<u8> {
        let mut bytes = SQLITE_MAGIC.to_vec();
        bytes.extend_from_slice(body);
        bytes
    }

    #[test]
    fn test_new_creates_directory() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a").join("b");
        let root = RepositoryRoot::new(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(root.path(), nested.canonicalize().unwrap());
    }

    #[test]
    fn test_new_rejects_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file");
        std::fs::write(&file, b"x").unwrap();
        assert!(RepositoryRoot::new(&file).is_err());
    }

    #[test]
    fn test_locate() {
        let temp = TempDir::new().unwrap();
        let root = RepositoryRoot::new(temp.path()).unwrap();
        let located = root.locate("notes").unwrap();
        assert_eq!(located, root.path().join("notes.vellum"));
        // Nested names are flattened to their basename.
        assert_eq!(root.locate("x/y/notes").unwrap(), located);
    }

    #[test]
    fn test_locate_rejects_traversal() {
        let temp = TempDir::new().unwrap();
        let root = RepositoryRoot::new(temp.path()).unwrap();
        let err = root.locate("../../etc/passwd").unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidName(_)));
        let err = root.locate("evil\0.vellum").unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidName(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_locate_rejects_symlink_escape() {
        let outside = TempDir::new().unwrap();
        let temp = TempDir::new().unwrap();
        let root = RepositoryRoot::new(temp.path()).unwrap();
        let target = outside.path().join("stolen.vellum");
        std::fs::write(&target, b"x").unwrap();
        std::os::unix::fs::symlink(&target, root.path().join("link.vellum")).unwrap();
        let err = root.locate("link").unwrap_err();
        assert!(matches!(&*err, ErrorKind::OutsideRoot(_)));
    }

    #[tokio::test]
    async fn test_write_read_and_list() {
        let temp = TempDir::new().unwrap();
        let root = RepositoryRoot::new(temp.path()).unwrap();
        assert!(!root.exists("beta").unwrap());

        let bytes = database_bytes(b"payload");
        root.write("beta", bytes.clone()).await.unwrap();
        root.write("alpha", database_bytes(b"")).await.unwrap();
        std::fs::write(root.path().join("ignored.txt"), b"x").unwrap();

        assert!(root.exists("beta").unwrap());
        assert_eq!(root.read("beta").await.unwrap(), bytes);

        let listed = root.list().await.unwrap();
        let names: Vec<_> = listed.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert_eq!(listed[1].size, bytes.len() as u64);
    }

    #[tokio::test]
    async fn test_write_rejects_non_database() {
        let temp = TempDir::new().unwrap();
        let root = RepositoryRoot::new(temp.path()).unwrap();
        let err = root.write("junk", b"not a database".to_vec()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotARepository(_)));
        assert!(!root.exists("junk").unwrap());
    }

    #[tokio::test]
    async fn test_rejected_write_keeps_sidecars() {
        let temp = TempDir::new().unwrap();
        let root = RepositoryRoot::new(temp.path()).unwrap();
        let path = root.write("notes", database_bytes(b"old")).await.unwrap();
        let [wal, shm] = sidecars(&path);
        std::fs::write(&wal, b"log").unwrap();
        std::fs::write(&shm, b"index").unwrap();

        assert!(root.write("notes", b"garbage".to_vec()).await.is_err());
        assert_eq!(std::fs::read(&wal).unwrap(), b"log");
        assert!(shm.exists());
        assert_eq!(root.read("notes").await.unwrap(), database_bytes(b"old"));
    }

    #[tokio::test]
    async fn test_pending_file() {
        let temp = TempDir::new().unwrap();
        let root = RepositoryRoot::new(temp.path()).unwrap();
        let path = root.write("notes", database_bytes(b"old")).await.unwrap();
        let [wal, _] = sidecars(&path);
        std::fs::write(&wal, b"log").unwrap();

        let pending = root.prepare("notes", database_bytes(b"new")).await.unwrap();
        assert_eq!(pending.target(), path);
        assert_eq!(std::fs::read(pending.path()).unwrap(), database_bytes(b"new"));
        // Nothing changes until the file is persisted.
        assert!(wal.exists());
        assert_eq!(root.read("notes").await.unwrap(), database_bytes(b"old"));

        let dropped = root.prepare("notes", database_bytes(b"dropped")).await.unwrap();
        let dropped_path = dropped.path().to_path_buf();
        drop(dropped);
        assert!(!dropped_path.exists());

        pending.persist().await.unwrap();
        assert!(!wal.exists());
        assert_eq!(root.read("notes").await.unwrap(), database_bytes(b"new"));
        let names: Vec<_> = root.list().await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["notes"]);
    }

    #[tokio::test]
    async fn test_read_missing() {
        let temp = TempDir::new().unwrap();
        let root = RepositoryRoot::new(temp.path()).unwrap();
        let err = root.read("missing").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }
}
