//! Configuration
//!
//! Loaded from `sqlrest.toml` in the working directory, or from
//! `<config dir>/sqlrest/config.toml`, then overridden by environment:
//!
//! ```toml
//! tables = ["users", "orders"]
//!
//! [rest]
//! url = "http://localhost:3000"
//! api_key = "..."
//! schema = "public"
//! timeout_secs = 30
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{SqlRestError, SqlRestResult};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rest: RestConfig,

    /// Tables statements may touch. Empty means no restriction.
    #[serde(default)]
    pub tables: Vec<String>,
}

/// `[rest]` section: where the table API lives.
#[derive(Debug, Clone, Deserialize)]
pub struct RestConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub schema: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    RestConfig::DEFAULT_TIMEOUT_SECS
}

impl RestConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            schema: None,
            timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Config {
    pub const FILE_NAME: &'static str = "sqlrest.toml";

    /// Create a new configuration builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn from_toml(content: &str) -> SqlRestResult<Self> {
        toml::from_str(content).map_err(|e| SqlRestError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> SqlRestResult<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| SqlRestError::Config(format!("{}: {}", path.display(), e)))
    }

    /// First existing default location, if any.
    pub fn default_path() -> Option<PathBuf> {
        let local = PathBuf::from(Self::FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("sqlrest").join("config.toml"))
            .filter(|path| path.exists())
    }

    /// Load from `path` (which must exist) or the default locations, then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> SqlRestResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) => {
                    tracing::debug!("Loading config from {}", path.display());
                    Self::from_file(&path)?
                }
                None => Self::default(),
            },
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override fields from `SQLREST_URL`, `SQLREST_API_KEY`, `SQLREST_SCHEMA`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("SQLREST_URL") {
            self.rest.url = Some(url);
        }
        if let Some(key) = lookup("SQLREST_API_KEY") {
            self.rest.api_key = Some(key);
        }
        if let Some(schema) = lookup("SQLREST_SCHEMA") {
            self.rest.schema = Some(schema);
        }
    }

    /// Table allowlist, if one is configured.
    pub fn allowed_tables(&self) -> Option<&[String]> {
        if self.tables.is_empty() {
            None
        } else {
            Some(&self.tables)
        }
    }
}

/// Builder for Config
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.rest.url = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.rest.api_key = Some(key.into());
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.config.rest.schema = Some(schema.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.rest.timeout_secs = secs;
        self
    }

    /// Add a table to the allowlist
    pub fn allow_table(mut self, table: impl Into<String>) -> Self {
        self.config.tables.push(table.into());
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
