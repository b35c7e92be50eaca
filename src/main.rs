//! vellum - snapshot version control for plain files

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cmd;
mod error;
mod format;

/// Snapshot version control: every commit stores the complete tree.
#[derive(Parser, Debug)]
#[command(name = "vellum")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file, layered over the user configuration
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Commit author (defaults to the configured author, then $USER)
    #[arg(long, global = true)]
    author: Option<String>,
    /// More output; repeat for more detail (RUST_LOG takes precedence)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty repository
    Init { name: String },
    /// List repositories
    Repos,
    /// Stage files (directories are added recursively)
    Add {
        repo: String,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Remove a path from the staging area
    Unstage { repo: String, path: String },
    /// Show staged paths and repository statistics
    Status { repo: String },
    /// Commit everything staged
    Commit {
        repo: String,
        #[arg(short, long)]
        message: String,
    },
    /// Show the commit log, newest first
    Log {
        repo: String,
        #[arg(long, default_value_t = 1)]
        page: u64,
    },
    /// List a directory
    Ls {
        repo: String,
        #[arg(default_value = "")]
        prefix: String,
        /// Commit to read from (defaults to head)
        #[arg(long)]
        commit: Option<u64>,
    },
    /// Print a file
    Cat {
        repo: String,
        path: String,
        /// Commit to read from (defaults to head)
        #[arg(long)]
        commit: Option<u64>,
    },
    /// Write a file and commit it
    Put {
        repo: String,
        path: String,
        /// Read content from this file instead of standard input
        #[arg(long, value_name = "FILE")]
        from: Option<PathBuf>,
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Delete a file and commit
    Rm {
        repo: String,
        path: String,
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Rename a file and commit
    Mv {
        repo: String,
        from: String,
        to: String,
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Create an empty directory and commit
    Mkdir {
        repo: String,
        /// Parent directory ("" or "/" for the root)
        parent: String,
        /// Name of the new directory (a single path segment)
        name: String,
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Show every commit containing a path
    History { repo: String, path: String },
    /// Copy a repository out to a file
    Export { repo: String, file: PathBuf },
    /// Create or replace a repository from an exported file
    Import { name: String, file: PathBuf },
}

fn filter(verbose: u8) -> EnvFilter {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_env_filter(filter(cli.verbose)).with_writer(std::io::stderr).init();

    let context = match cmd::Context::load(cli.config.as_deref(), cli.author) {
        Ok(context) => context,
        Err(err) => {
            eprintln!("{err:?}");
            return ExitCode::FAILURE;
        },
    };

    let result = match cli.command {
        Commands::Init { name } => cmd::repos::init(&context, &name).await,
        Commands::Repos => cmd::repos::list(&context).await,
        Commands::Add { repo, paths } => cmd::stage::add(&context, &repo, &paths).await,
        Commands::Unstage { repo, path } => cmd::stage::unstage(&context, &repo, &path).await,
        Commands::Status { repo } => cmd::stage::status(&context, &repo).await,
        Commands::Commit { repo, message } => cmd::stage::commit(&context, &repo, &message).await,
        Commands::Log { repo, page } => cmd::log::log(&context, &repo, page).await,
        Commands::Ls { repo, prefix, commit } => cmd::tree::ls(&context, &repo, &prefix, commit).await,
        Commands::Cat { repo, path, commit } => cmd::tree::cat(&context, &repo, &path, commit).await,
        Commands::Put { repo, path, from, message } => {
            cmd::tree::put(&context, &repo, &path, from.as_deref(), message).await
        },
        Commands::Rm { repo, path, message } => cmd::tree::rm(&context, &repo, &path, message).await,
        Commands::Mv { repo, from, to, message } => cmd::tree::mv(&context, &repo, &from, &to, message).await,
        Commands::Mkdir { repo, parent, name, message } => {
            cmd::tree::mkdir(&context, &repo, &parent, &name, message).await
        },
        Commands::History { repo, path } => cmd::log::history(&context, &repo, &path).await,
        Commands::Export { repo, file } => cmd::repos::export(&context, &repo, &file).await,
        Commands::Import { name, file } => cmd::repos::import(&context, &name, &file).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:?}");
            ExitCode::FAILURE
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["vellum", "log", "notes", "--page", "3", "-vv", "--author", "bob"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.author.as_deref(), Some("bob"));
        assert!(matches!(cli.command, Commands::Log { ref repo, page: 3 } if repo == "notes"));
    }

    #[test]
    fn test_ls_defaults_to_root() {
        let cli = Cli::try_parse_from(["vellum", "ls", "notes"]).unwrap();
        assert!(matches!(cli.command, Commands::Ls { ref prefix, commit: None, .. } if prefix.is_empty()));
    }

    #[rstest]
    #[case(&["vellum", "add", "notes"])]
    #[case(&["vellum", "commit", "notes"])]
    #[case(&["vellum", "mkdir", "notes", "docs"])]
    fn test_missing_arguments(#[case] args: &[&str]) {
        assert!(Cli::try_parse_from(args).is_err());
    }
}
