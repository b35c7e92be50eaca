//! Subcommand implementations.

pub mod log;
pub mod repos;
pub mod stage;
pub mod tree;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::Path;
use vellum_config::Config;
use vellum_store::{Database, Options, Registry, Signature};

/// Everything a subcommand needs, resolved once at startup.
pub struct Context {
    pub config: Config,
    pub registry: Registry,
    author: String,
}
impl Context {
    pub fn load(config: Option<&Path>, author: Option<String>) -> Result<Self> {
        let config = Config::load(config).or_raise(|| ErrorKind::Config)?;
        let options = Options {
            max_connections: config.database.max_connections,
            busy_timeout: config.database.busy_timeout(),
        };
        let registry = Registry::at(&config.repositories, options).or_raise(|| ErrorKind::Store)?;
        let author = resolve_author(author, config.author.clone(), |key| std::env::var(key).ok());
        tracing::debug!(repositories = %registry.root().path().display(), %author, "resolved context");
        Ok(Self { config, registry, author })
    }

    pub fn signature(&self, message: impl Into<String>) -> Signature {
        Signature::new(self.author.clone(), message)
    }

    pub async fn open(&self, repo: &str) -> Result<Database> {
        self.registry.open(repo).await.or_raise(|| ErrorKind::Store)
    }
}

/// `--author`, then the configured author, then the login name.
fn resolve_author(flag: Option<String>, configured: Option<String>, env: impl Fn(&str) -> Option<String>) -> String {
    flag.or(configured)
        .or_else(|| env("USER"))
        .or_else(|| env("USERNAME"))
        .filter(|author| !author.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn env(user: Option<&'static str>, username: Option<&'static str>) -> impl Fn(&str) -> Option<String> {
        move |key| match key {
            "USER" => user.map(str::to_string),
            "USERNAME" => username.map(str::to_string),
            _ => None,
        }
    }

    #[rstest]
    #[case(Some("flag"), Some("config"), Some("user"), "flag")]
    #[case(None, Some("config"), Some("user"), "config")]
    #[case(None, None, Some("user"), "user")]
    #[case(None, None, None, "unknown")]
    fn test_resolve_author(
        #[case] flag: Option<&str>,
        #[case] configured: Option<&str>,
        #[case] user: Option<&'static str>,
        #[case] expected: &str,
    ) {
        let author = resolve_author(flag.map(str::to_string), configured.map(str::to_string), env(user, None));
        assert_eq!(author, expected);
    }

    #[test]
    fn test_resolve_author_windows() {
        assert_eq!(resolve_author(None, None, env(None, Some("win"))), "win");
    }
}
