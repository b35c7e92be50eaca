//! Configuration loading and validation.
//!
//! Sources, later overriding earlier:
//! 1. Built-in defaults
//! 2. `vellum.toml` in the user's configuration directory
//! 3. An explicit file (`--config`)
//! 4. `VELLUM_*` environment variables, nested keys split on `__`
//!    (`VELLUM_DATABASE__MAX_CONNECTIONS=2`)

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const FILE_NAME: &str = "vellum.toml";
const ENV_PREFIX: &str = "VELLUM_";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "vellum")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding every repository file.
    pub repositories: PathBuf,
    /// Default commit author.
    pub author: Option<String>,
    pub database: DatabaseConfig,
    pub log: LogConfig,
}
impl Default for Config {
    fn default() -> Self {
        let repositories = project_dirs()
            .map(|dirs| dirs.data_dir().join("repositories"))
            .unwrap_or_else(|| PathBuf::from("repositories"));
        Self {
            repositories,
            author: None,
            database: DatabaseConfig::default(),
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}
impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { max_connections: 5, busy_timeout_ms: 1500 }
    }
}
impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Commits per page of `log`.
    pub page_size: u64,
}
impl Default for LogConfig {
    fn default() -> Self {
        Self { page_size: 10 }
    }
}

impl Config {
    /// Load from every source, with `explicit` as the `--config` file.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let user = project_dirs().map(|dirs| dirs.config_dir().join(FILE_NAME));
        Self::from_figment(Self::layered(user.as_deref(), explicit)?)
    }

    /// The figment behind [`Config::load`]. A missing user file is skipped; a
    /// missing explicit file is an error.
    fn layered(user: Option<&Path>, explicit: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(user) = user.filter(|user| user.is_file()) {
            tracing::debug!(path = %user.display(), "using user configuration file");
            figment = figment.merge(Toml::file_exact(user));
        }
        if let Some(explicit) = explicit {
            if !explicit.is_file() {
                exn::bail!(ErrorKind::NotFound(explicit.to_path_buf()));
            }
            tracing::debug!(path = %explicit.display(), "using configuration file");
            figment = figment.merge(Toml::file_exact(explicit));
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.database.max_connections == 0 {
            exn::bail!(ErrorKind::Invalid("database.max_connections must be at least 1"));
        }
        if self.log.page_size == 0 {
            exn::bail!(ErrorKind::Invalid("log.page_size must be at least 1"));
        }
        if self.author.as_deref().is_some_and(|author| author.trim().is_empty()) {
            exn::bail!(ErrorKind::Invalid("author must not be blank"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        Jail::expect_with(|_jail| {
            let config = Config::from_figment(Config::layered(None, None).unwrap()).unwrap();
            assert_eq!(config.database, DatabaseConfig { max_connections: 5, busy_timeout_ms: 1500 });
            assert_eq!(config.log.page_size, 10);
            assert_eq!(config.author, None);
            assert!(config.repositories.ends_with("repositories"));
            Ok(())
        });
    }

    #[test]
    fn test_layering() {
        Jail::expect_with(|jail| {
            jail.create_file("user.toml", "author = \"user\"\n[log]\npage_size = 20\n")?;
            jail.create_file(
                "explicit.toml",
                "author = \"explicit\"\nrepositories = \"/srv/vellum\"\n[database]\nmax_connections = 2\n",
            )?;
            jail.set_env("VELLUM_DATABASE__BUSY_TIMEOUT_MS", "250");
            let figment = Config::layered(Some(Path::new("user.toml")), Some(Path::new("explicit.toml"))).unwrap();
            let config = Config::from_figment(figment).unwrap();
            assert_eq!(config.author.as_deref(), Some("explicit"));
            assert_eq!(config.repositories, PathBuf::from("/srv/vellum"));
            assert_eq!(config.log.page_size, 20);
            assert_eq!(config.database.max_connections, 2);
            assert_eq!(config.database.busy_timeout(), Duration::from_millis(250));
            Ok(())
        });
    }

    #[test]
    fn test_missing_user_file_is_skipped() {
        Jail::expect_with(|_jail| {
            let figment = Config::layered(Some(Path::new("absent/vellum.toml")), None).unwrap();
            let config = Config::from_figment(figment).unwrap();
            assert_eq!(config.log.page_size, 10);
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        Jail::expect_with(|_jail| {
            let err = Config::layered(None, Some(Path::new("nope.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::NotFound(_)));
            Ok(())
        });
    }

    #[rstest]
    #[case("VELLUM_DATABASE__MAX_CONNECTIONS", "0")]
    #[case("VELLUM_LOG__PAGE_SIZE", "0")]
    #[case("VELLUM_AUTHOR", "\"  \"")]
    fn test_invalid_values(#[case] key: &str, #[case] value: &str) {
        Jail::expect_with(|jail| {
            jail.set_env(key, value);
            let err = Config::from_figment(Config::layered(None, None).unwrap()).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid(_)));
            Ok(())
        });
    }

    #[test]
    fn test_malformed_value() {
        Jail::expect_with(|jail| {
            jail.set_env("VELLUM_LOG__PAGE_SIZE", "many");
            let err = Config::from_figment(Config::layered(None, None).unwrap()).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Load));
            Ok(())
        });
    }
}
