//! TOML configuration.
//!
//! The file is parsed once per invocation. Keys every operation needs
//! (`db.path`, `source.root`, `store.table`) are optional at parse time
//! and resolved through the `require_*` accessors, which fail with
//! [`ConfigError::Missing`] so diagnostics like `feed rules` work without
//! a complete file. Everything else carries a default.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::migrate::INTERNAL_TABLES;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub access_log: AccessLogConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DbConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub root: Option<PathBuf>,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Descend into subfolders of `root`. Off by default: an archived copy
    /// in a subfolder would otherwise classify to the same key as the
    /// current export.
    #[serde(default)]
    pub recursive: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root: None,
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            recursive: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub table: Option<String>,
    #[serde(default = "default_max_fragment_chars")]
    pub max_fragment_chars: usize,
    #[serde(default = "default_max_cell_chars")]
    pub max_cell_chars: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table: None,
            max_fragment_chars: default_max_fragment_chars(),
            max_cell_chars: default_max_cell_chars(),
        }
    }
}

fn default_max_fragment_chars() -> usize {
    45_000
}
fn default_max_cell_chars() -> usize {
    50_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_entry_bytes")]
    pub max_entry_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            ttl_secs: default_ttl_secs(),
            max_entry_bytes: default_max_entry_bytes(),
        }
    }
}

fn default_key_prefix() -> String {
    "readiness_payload".to_string()
}
fn default_ttl_secs() -> u64 {
    6 * 60 * 60
}
fn default_max_entry_bytes() -> usize {
    100 * 1024
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AccessLogConfig {
    #[serde(default = "default_max_records")]
    pub max_records: usize,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self {
            max_records: default_max_records(),
        }
    }
}

fn default_max_records() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

impl Config {
    pub fn require_db_path(&self) -> Result<&Path, ConfigError> {
        self.db.path.as_deref().ok_or(ConfigError::Missing("db.path"))
    }

    pub fn require_source_root(&self) -> Result<&Path, ConfigError> {
        self.source
            .root
            .as_deref()
            .ok_or(ConfigError::Missing("source.root"))
    }

    pub fn require_table(&self) -> Result<&str, ConfigError> {
        self.store
            .table
            .as_deref()
            .ok_or(ConfigError::Missing("store.table"))
    }

    /// Resolve every key an ingest run needs, so a misconfigured run fails
    /// before touching the cache or the store.
    pub fn require_ingest_keys(&self) -> Result<(), ConfigError> {
        self.require_db_path()?;
        self.require_source_root()?;
        self.require_table()?;
        Ok(())
    }
}

/// True for names usable as an SQLite table identifier without escaping
/// surprises: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if let Some(table) = &config.store.table {
        if !is_valid_table_name(table) {
            return Err(ConfigError::Invalid {
                key: "store.table",
                reason: format!("'{}' must match [A-Za-z_][A-Za-z0-9_]*", table),
            });
        }
        // SQLite table names are case-insensitive.
        let lowered = table.to_ascii_lowercase();
        if lowered.starts_with("sqlite_") || INTERNAL_TABLES.contains(&lowered.as_str()) {
            return Err(ConfigError::Invalid {
                key: "store.table",
                reason: format!("'{}' is reserved for internal use", table),
            });
        }
    }

    if config.store.max_fragment_chars == 0 {
        return Err(ConfigError::Invalid {
            key: "store.max_fragment_chars",
            reason: "must be > 0".to_string(),
        });
    }

    if config.store.max_fragment_chars > config.store.max_cell_chars {
        return Err(ConfigError::Invalid {
            key: "store.max_fragment_chars",
            reason: format!(
                "{} exceeds store.max_cell_chars ({})",
                config.store.max_fragment_chars, config.store.max_cell_chars
            ),
        });
    }

    if config.cache.key_prefix.is_empty() {
        return Err(ConfigError::Invalid {
            key: "cache.key_prefix",
            reason: "must not be empty".to_string(),
        });
    }

    if config.access_log.max_records == 0 {
        return Err(ConfigError::Invalid {
            key: "access_log.max_records",
            reason: "must be >= 1".to_string(),
        });
    }

    Ok(())
}
