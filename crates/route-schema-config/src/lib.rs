//! Route schema learning configuration.
//!
//! Controls how per-route schemas are learned, when learning freezes, how
//! whitelists are capped and filtered, and where crystallised whitelists
//! are cached.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

mod rules;
mod schema_key;

pub use rules::{FilterRule, FreezeRule, matches_pattern};
pub use schema_key::{SchemaKey, SchemaKeyConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("expanding environment in {}: {message}", .path.display())]
    Env { path: PathBuf, message: String },

    #[error("parsing config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Top-level route schema configuration.
///
/// Every field has a default, so an empty document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSchemaConfig {
    /// Persist crystallised whitelists across restarts.
    #[serde(default = "default_true")]
    pub cache: bool,

    /// Location of the whitelist cache file.
    #[serde(default = "default_cache_path", alias = "cachePath")]
    pub cache_path: PathBuf,

    #[serde(default)]
    pub query: SchemaKeyConfig,

    #[serde(default)]
    pub body: SchemaKeyConfig,

    #[serde(default)]
    pub reaction: SchemaKeyConfig,

    /// Replaces the default freeze conditions for every key when set.
    #[serde(
        default,
        alias = "freezeStrategy",
        skip_serializing_if = "Option::is_none"
    )]
    pub freeze_strategy: Option<Vec<FreezeRule>>,

    /// Extra filters applied to ranked whitelist candidates.
    #[serde(default, alias = "filterWhitelistStrategy")]
    pub filter_whitelist_strategy: Vec<FilterRule>,
}

impl Default for RouteSchemaConfig {
    fn default() -> Self {
        Self {
            cache: true,
            cache_path: default_cache_path(),
            query: SchemaKeyConfig::default(),
            body: SchemaKeyConfig::default(),
            reaction: SchemaKeyConfig::default(),
            freeze_strategy: None,
            filter_whitelist_strategy: Vec::new(),
        }
    }
}

impl RouteSchemaConfig {
    /// Config for a single schema key.
    pub fn key(&self, key: SchemaKey) -> &SchemaKeyConfig {
        match key {
            SchemaKey::Query => &self.query,
            SchemaKey::Body => &self.body,
            SchemaKey::Reaction => &self.reaction,
        }
    }

    pub fn key_mut(&mut self, key: SchemaKey) -> &mut SchemaKeyConfig {
        match key {
            SchemaKey::Query => &mut self.query,
            SchemaKey::Body => &mut self.body,
            SchemaKey::Reaction => &mut self.reaction,
        }
    }

    /// Effective whitelist cap for a key.
    pub fn max_properties(&self, key: SchemaKey) -> usize {
        self.key(key).max_properties_for(key)
    }

    /// Config with caching switched off (tests, ephemeral runs).
    pub fn uncached() -> Self {
        Self {
            cache: false,
            ..Default::default()
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("./route-schemas.cache")
}

/// Parse a YAML document, expanding `${VAR}` references first.
pub fn load_from_str(raw: &str) -> Result<RouteSchemaConfig, ConfigError> {
    parse(raw, Path::new("<inline>"))
}

/// Read and parse a YAML config file.
pub fn load_from_path(
    file_path: impl AsRef<Path>,
) -> Result<RouteSchemaConfig, ConfigError> {
    let path = file_path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg = parse(&raw, path)?;
    debug!(path = %path.display(), cache = cfg.cache, "route schema config loaded");
    Ok(cfg)
}

fn parse(raw: &str, path: &Path) -> Result<RouteSchemaConfig, ConfigError> {
    let with_env = shellexpand::env(raw).map_err(|e| ConfigError::Env {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    // serde_yaml maps an empty document to unit, not to an empty mapping
    if with_env.trim().is_empty() {
        return Ok(RouteSchemaConfig::default());
    }
    serde_yaml::from_str(&with_env).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
