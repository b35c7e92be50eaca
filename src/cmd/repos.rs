//! Repository management: init, repos, export, import.

use crate::cmd::Context;
use crate::error::{ErrorKind, Result};
use crate::format;
use exn::ResultExt;
use std::path::Path;

pub async fn init(context: &Context, name: &str) -> Result<()> {
    let db = context.registry.create(name).await.or_raise(|| ErrorKind::Store)?;
    db.close().await;
    println!("created repository {name}");
    Ok(())
}

pub async fn list(context: &Context) -> Result<()> {
    let repositories = context.registry.list().await.or_raise(|| ErrorKind::Store)?;
    if repositories.is_empty() {
        println!("no repositories in {}", context.registry.root().path().display());
        return Ok(());
    }
    let width = repositories.iter().map(|r| r.name.len()).max().unwrap_or(0);
    for repository in repositories {
        println!(
            "{:<width$}  {:>10}  {}",
            repository.name,
            format::size(repository.size),
            format::timestamp(repository.modified),
        );
    }
    Ok(())
}

pub async fn export(context: &Context, repo: &str, file: &Path) -> Result<()> {
    let bytes = context.registry.export(repo).await.or_raise(|| ErrorKind::Store)?;
    tokio::fs::write(file, &bytes).await.or_raise(|| ErrorKind::Write(file.to_path_buf()))?;
    println!("exported {repo} ({}) to {}", format::size(bytes.len() as u64), file.display());
    Ok(())
}

pub async fn import(context: &Context, name: &str, file: &Path) -> Result<()> {
    let bytes = tokio::fs::read(file).await.or_raise(|| ErrorKind::Read(file.to_path_buf()))?;
    let handle = context.registry.import(name, bytes).await.or_raise(|| ErrorKind::Store)?;
    println!("imported {} as {handle}", file.display());
    Ok(())
}
