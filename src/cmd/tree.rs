//! Reading and changing the tree: ls, cat, put, rm, mv, mkdir.

use crate::cmd::Context;
use crate::error::{ErrorKind, Result};
use crate::format;
use exn::ResultExt;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use vellum_store::{Change, Listing, Repository};

pub async fn ls(context: &Context, repo: &str, prefix: &str, commit: Option<u64>) -> Result<()> {
    let db = context.open(repo).await?;
    let result = Repository::from(&db).list_directory(prefix, commit).await;
    db.close().await;

    match result.or_raise(|| ErrorKind::Store)? {
        Listing::File(file) => {
            println!(
                "{}  {}  {}  {}",
                file.path,
                format::short_hash(&file.hash),
                format::size(file.size),
                format::timestamp(file.timestamp)
            );
        },
        Listing::Directory { files, dirs } => {
            for dir in dirs {
                println!("{:<40}  {:>10}  {}", format!("{}/", dir.name), "-", format::timestamp(dir.timestamp));
            }
            for file in files {
                println!(
                    "{:<40}  {:>10}  {}",
                    file.name(),
                    format::size(file.size),
                    format::timestamp(file.timestamp)
                );
            }
        },
    }
    Ok(())
}

pub async fn cat(context: &Context, repo: &str, path: &str, commit: Option<u64>) -> Result<()> {
    let db = context.open(repo).await?;
    let result = Repository::from(&db).get_file(path, commit).await;
    db.close().await;
    let file = result.or_raise(|| ErrorKind::Store)?;

    let mut stdout = tokio::io::stdout();
    stdout.write_all(&file.bytes).await.or_raise(|| ErrorKind::Stdout)?;
    stdout.flush().await.or_raise(|| ErrorKind::Stdout)?;
    Ok(())
}

async fn apply(context: &Context, repo: &str, change: Change, message: String) -> Result<()> {
    let db = context.open(repo).await?;
    let result = Repository::from(&db).apply(change, &context.signature(message)).await;
    db.close().await;
    let summary = result.or_raise(|| ErrorKind::Store)?;
    println!("commit {} ({} files)", summary.commit.id, summary.file_count);
    Ok(())
}

pub async fn put(context: &Context, repo: &str, path: &str, from: Option<&Path>, message: Option<String>) -> Result<()> {
    let bytes = match from {
        Some(from) => tokio::fs::read(from).await.or_raise(|| ErrorKind::Read(from.to_path_buf()))?,
        None => {
            let mut bytes = Vec::new();
            tokio::io::stdin().read_to_end(&mut bytes).await.or_raise(|| ErrorKind::Stdin)?;
            bytes
        },
    };
    let message = message.unwrap_or_else(|| format!("Write {path}"));
    apply(context, repo, Change::write(path, bytes), message).await
}

pub async fn rm(context: &Context, repo: &str, path: &str, message: Option<String>) -> Result<()> {
    let message = message.unwrap_or_else(|| format!("Delete {path}"));
    apply(context, repo, Change::delete(path), message).await
}

pub async fn mv(context: &Context, repo: &str, from: &str, to: &str, message: Option<String>) -> Result<()> {
    let message = message.unwrap_or_else(|| format!("Rename {from} to {to}"));
    apply(context, repo, Change::rename(from, to), message).await
}

pub async fn mkdir(context: &Context, repo: &str, parent: &str, name: &str, message: Option<String>) -> Result<()> {
    let message = message.unwrap_or_else(|| format!("Create directory {name}"));
    let db = context.open(repo).await?;
    let result = Repository::from(&db).make_directory(parent, name, &context.signature(message)).await;
    db.close().await;
    let summary = result.or_raise(|| ErrorKind::Store)?;
    println!("commit {} ({} files)", summary.commit.id, summary.file_count);
    Ok(())
}
