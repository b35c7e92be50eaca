//! Registry of repositories inside one repository directory.
//!
//! Names are sanitized before anything touches the disk; what is left is
//! the handle the rest of the crate works with.

use crate::db::{Database, Options};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fs::OpenOptions;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};
use vellum_storage::{RepositoryInfo, RepositoryRoot, display_name, sanitize_name};

#[derive(Debug, Clone)]
pub struct Registry {
    root: RepositoryRoot,
    options: Options,
}
impl Registry {
    pub fn new(root: RepositoryRoot, options: Options) -> Self {
        Self { root, options }
    }

    /// Opens (creating when missing) the repository directory at `path`.
    pub fn at(path: impl AsRef<Path>, options: Options) -> Result<Self> {
        let root = RepositoryRoot::new(path).or_raise(|| ErrorKind::Storage)?;
        Ok(Self::new(root, options))
    }

    pub fn root(&self) -> &RepositoryRoot {
        &self.root
    }

    /// Sanitized handle and file path of a repository.
    fn locate(&self, name: &str) -> Result<(String, PathBuf)> {
        let file_name = sanitize_name(name).or_raise(|| ErrorKind::InvalidInput(format!("repository name {name:?}")))?;
        let path = self.root.locate(&file_name).or_raise(|| ErrorKind::Storage)?;
        Ok((display_name(&file_name).to_string(), path))
    }

    fn exists(path: &Path) -> Result<bool> {
        path.try_exists().or_raise(|| ErrorKind::Storage)
    }

    /// Create an empty repository. The first write to it becomes commit 1.
    #[instrument(level = "debug", skip(self))]
    pub async fn create(&self, name: &str) -> Result<Database> {
        let (handle, path) = self.locate(name)?;
        // Claiming the file first makes a concurrent create lose.
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => {},
            Err(e) if e.kind() == IoErrorKind::AlreadyExists => exn::bail!(ErrorKind::AlreadyExists(handle)),
            Err(e) => return Err(e).or_raise(|| ErrorKind::Storage),
        }
        let db = match Database::create(&path, &self.options).await {
            Ok(db) => db,
            Err(err) => {
                _ = std::fs::remove_file(&path);
                return Err(err);
            },
        };
        info!(repository = %handle, path = %path.display(), "created repository");
        Ok(db)
    }

    /// Open an existing repository.
    pub async fn open(&self, name: &str) -> Result<Database> {
        let (handle, path) = self.locate(name)?;
        if !Self::exists(&path)? {
            exn::bail!(ErrorKind::RepositoryNotFound(handle));
        }
        Database::open(&path, &self.options).await
    }

    /// Every repository in the directory, sorted by name.
    pub async fn list(&self) -> Result<Vec<RepositoryInfo>> {
        self.root.list().await.or_raise(|| ErrorKind::Storage)
    }

    /// The whole repository file, with every commit folded into it.
    pub async fn export(&self, name: &str) -> Result<Vec<u8>> {
        let (handle, _) = self.locate(name)?;
        let db = self.open(name).await?;
        let checkpointed = db.checkpoint().await;
        db.close().await;
        checkpointed?;
        self.root.read(&handle).await.or_raise(|| ErrorKind::Storage)
    }

    /// Replace (or create) a repository with an exported file.
    ///
    /// The bytes are opened as a database before they replace anything; a
    /// rejected import leaves the existing repository as it was.
    #[instrument(level = "debug", skip(self, bytes), fields(size = bytes.len()))]
    pub async fn import(&self, name: &str, bytes: Vec<u8>) -> Result<String> {
        let (handle, path) = self.locate(name)?;
        let pending = self.root.prepare(&handle, bytes).await.or_raise(|| ErrorKind::Storage)?;

        let db = Database::open(pending.path(), &self.options).await?;
        let checkpointed = db.checkpoint().await;
        db.close().await;
        checkpointed?;

        pending.persist().await.or_raise(|| ErrorKind::Storage)?;
        info!(repository = %handle, path = %path.display(), "imported repository");
        Ok(handle)
    }
}
