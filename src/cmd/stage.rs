//! Local-client workflow: add, unstage, status, commit.

use crate::cmd::Context;
use crate::error::{ErrorKind, Result};
use crate::format;
use exn::ResultExt;
use std::path::{Path, PathBuf};
use tracing::warn;
use vellum_storage::REPOSITORY_EXTENSION;
use vellum_store::{Repository, StagingArea};

/// Files to stage for the given command-line paths.
///
/// Paths named explicitly are always taken. Inside directories, hidden
/// entries and repository files are skipped, as is anything unreadable.
async fn collect(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = Vec::new();
    for path in paths {
        let metadata = tokio::fs::metadata(path).await.or_raise(|| ErrorKind::Read(path.clone()))?;
        match metadata.is_dir() {
            true => stack.push(path.clone()),
            false => files.push(path.clone()),
        }
    }

    while let Some(dir) = stack.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %dir.display(), %err, "skipping unreadable directory");
                continue;
            },
        };
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    warn!(path = %dir.display(), %err, "stopped reading directory");
                    break;
                },
            };
            let path = entry.path();
            if is_skipped(&path) {
                continue;
            }
            match tokio::fs::metadata(&path).await {
                Ok(metadata) if metadata.is_dir() => stack.push(path),
                Ok(metadata) if metadata.is_file() => files.push(path),
                // Sockets, fifos and the like.
                Ok(_) => {},
                Err(err) => warn!(path = %path.display(), %err, "skipping unreadable entry"),
            }
        }
    }
    files.sort();
    Ok(files)
}

/// The current directory, which staged keys are relative to.
async fn working_directory() -> Result<PathBuf> {
    let cwd = std::env::current_dir().or_raise(|| ErrorKind::WorkingDirectory)?;
    tokio::fs::canonicalize(&cwd).await.or_raise(|| ErrorKind::WorkingDirectory)
}

/// Repository key of `file` relative to `base`, both canonical. `None` when
/// the relative path is not valid UTF-8.
fn key(base: &Path, file: &Path) -> Result<Option<String>> {
    let Ok(relative) = file.strip_prefix(base) else {
        exn::bail!(ErrorKind::OutsideWorkingDirectory(file.to_path_buf()));
    };
    let segments: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
    Ok(segments.map(|segments| segments.join("/")))
}

fn is_skipped(path: &Path) -> bool {
    let hidden = path.file_name().and_then(|n| n.to_str()).is_none_or(|n| n.starts_with('.'));
    let repository = path.extension().and_then(|e| e.to_str()) == Some(REPOSITORY_EXTENSION);
    hidden || repository
}

pub async fn add(context: &Context, repo: &str, paths: &[PathBuf]) -> Result<()> {
    let base = working_directory().await?;
    let mut keyed = Vec::new();
    for file in collect(paths).await? {
        let resolved = tokio::fs::canonicalize(&file).await.or_raise(|| ErrorKind::Read(file.clone()))?;
        match key(&base, &resolved)? {
            Some(key) => keyed.push((file, key)),
            None => warn!(path = %file.display(), "skipping path that is not valid UTF-8"),
        }
    }

    let db = context.open(repo).await?;
    let staging = StagingArea::from(&db);
    let mut staged = 0usize;
    let mut result = Ok(());
    for (file, key) in &keyed {
        let bytes = match tokio::fs::read(file).await {
            Ok(bytes) => bytes,
            Err(err) => {
                result = Err(err).or_raise(|| ErrorKind::Read(file.clone()));
                break;
            },
        };
        match staging.add(key, &bytes).await {
            Ok(hash) => {
                println!("staged {key} ({})", format::short_hash(&hash));
                staged += 1;
            },
            Err(err) => {
                result = Err(err).or_raise(|| ErrorKind::Store);
                break;
            },
        }
    }
    db.close().await;
    result?;
    println!("{staged} file(s) staged");
    Ok(())
}

pub async fn unstage(context: &Context, repo: &str, path: &str) -> Result<()> {
    let db = context.open(repo).await?;
    let result = StagingArea::from(&db).unstage(path).await;
    db.close().await;
    result.or_raise(|| ErrorKind::Store)?;
    println!("unstaged {path}");
    Ok(())
}

pub async fn status(context: &Context, repo: &str) -> Result<()> {
    let db = context.open(repo).await?;
    let repository = Repository::from(&db);
    let result = async {
        let staged = repository.staging().staged().await?;
        let head = repository.head().await?;
        let stats = repository.stats().await?;
        Ok::<_, vellum_store::error::Error>((staged, head, stats))
    }
    .await;
    db.close().await;
    let (staged, head, stats) = result.or_raise(|| ErrorKind::Store)?;

    match head {
        Some(head) => println!("head: commit {} by {} at {}", head.id, head.author, format::timestamp(head.timestamp)),
        None => println!("head: no commits yet"),
    }
    println!(
        "{} commits, {} blobs ({}), {} manifest rows",
        stats.commits,
        stats.blobs,
        format::size(stats.blob_bytes),
        stats.manifest_rows
    );
    if staged.is_empty() {
        println!("nothing staged");
    } else {
        println!("staged:");
        for entry in staged {
            println!("    {}  {}  {}", entry.path, format::short_hash(&entry.hash), format::size(entry.size));
        }
    }
    Ok(())
}

pub async fn commit(context: &Context, repo: &str, message: &str) -> Result<()> {
    let db = context.open(repo).await?;
    let result = StagingArea::from(&db).commit(&context.signature(message)).await;
    db.close().await;
    let summary = result.or_raise(|| ErrorKind::Store)?;
    println!("commit {} ({} files)", summary.commit.id, summary.file_count);
    Ok(())
}
