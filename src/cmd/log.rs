//! Commit log and path history.

use crate::cmd::Context;
use crate::error::{ErrorKind, Result};
use crate::format;
use exn::ResultExt;
use vellum_store::Repository;

pub async fn log(context: &Context, repo: &str, page: u64) -> Result<()> {
    let db = context.open(repo).await?;
    let repository = Repository::from(&db);
    let page_size = context.config.log.page_size;
    let result = async {
        let total = repository.commit_count().await?;
        let entries = repository.get_log(page, page_size).await?;
        Ok::<_, vellum_store::error::Error>((total, entries))
    }
    .await;
    db.close().await;
    let (total, entries) = result.or_raise(|| ErrorKind::Store)?;

    if entries.is_empty() {
        println!("no commits");
        return Ok(());
    }
    for entry in &entries {
        let commit = &entry.commit;
        println!(
            "commit {}  {}  {}  ({} files)",
            commit.id,
            format::timestamp(commit.timestamp),
            commit.author,
            entry.file_count
        );
        println!("    {}", commit.message);
    }
    let pages = total.div_ceil(page_size);
    println!("page {} of {pages}", page.max(1));
    Ok(())
}

pub async fn history(context: &Context, repo: &str, path: &str) -> Result<()> {
    let db = context.open(repo).await?;
    let result = Repository::from(&db).history(path).await;
    db.close().await;
    let revisions = result.or_raise(|| ErrorKind::Store)?;

    if revisions.is_empty() {
        println!("{path} was never committed");
        return Ok(());
    }
    for revision in revisions {
        println!(
            "commit {}  {}  {}  {}",
            revision.commit.id,
            format::short_hash(&revision.hash),
            format::size(revision.size),
            format::timestamp(revision.written),
        );
    }
    Ok(())
}
