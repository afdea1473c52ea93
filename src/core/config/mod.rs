//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! plugcli has two configuration scopes:
//! - **Global**: User-level defaults (verbosity, recycling, cache location)
//! - **Command**: Per-invocation option values from `--cmd-config FILE`
//!
//! # Precedence
//!
//! For global settings (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. CLI flags (not handled here)
//!
//! For action options, command-config values are consulted only for
//! options absent from the command line, and before signature defaults.
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$PLUGCLI_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/plugcli/config.toml`
//! 3. `~/.plugcli/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use plugcli::core::config::Config;
//!
//! let config = Config::load().unwrap();
//! println!("Recycle pipelines: {}", config.recycle());
//! ```

pub mod schema;

pub use schema::GlobalConfig;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::paths;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("config file '{path}': value for '{key}' must be a scalar or a list of scalars")]
    UnsupportedValue { path: PathBuf, key: String },
}

/// Loaded global configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub global: GlobalConfig,
    global_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Missing config files are not an error (defaults are used).
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var_os("PLUGCLI_CONFIG").map(PathBuf::from);
        let xdg = std::env::var_os("XDG_CONFIG_HOME")
            .map(|x| PathBuf::from(x).join("plugcli/config.toml"));
        let home = dirs::home_dir().map(|h| h.join(".plugcli/config.toml"));
        Self::load_from([explicit, xdg, home])
    }

    /// Load from the first existing candidate path.
    pub fn load_from<I>(candidates: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = Option<PathBuf>>,
    {
        for path in candidates.into_iter().flatten() {
            if path.exists() {
                let global: GlobalConfig = read_toml(&path)?;
                global.validate()?;
                return Ok(Config {
                    global,
                    global_path: Some(path),
                });
            }
        }
        Ok(Config::default())
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Whether action output is streamed by default.
    ///
    /// Defaults to `false` if not configured.
    pub fn verbose(&self) -> bool {
        self.global.verbose.unwrap_or(false)
    }

    /// Whether pipelines keep a resumption pool by default.
    ///
    /// Defaults to `true` if not configured.
    pub fn recycle(&self) -> bool {
        self.global.recycle.unwrap_or(true)
    }

    /// Result cache used for pools and bare keys.
    pub fn cache_path(&self) -> PathBuf {
        self.global
            .cache
            .as_ref()
            .map(|c| c.path.clone())
            .unwrap_or_else(paths::default_result_cache)
    }

    /// Default parallel configuration file, if any.
    pub fn parallel_config(&self) -> Option<&Path> {
        self.global.parallel.as_ref().map(|p| p.config.as_path())
    }

    /// Get the path to the loaded global config file.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }
}

pub(crate) fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Option values loaded from a `--cmd-config` file.
#[derive(Debug, Clone)]
pub struct CommandConfig {
    path: PathBuf,
    table: toml::Table,
}

/// The values of one `"<plugin>.<action>"` table, as text tokens.
pub type CommandSection = BTreeMap<String, Vec<String>>;

impl CommandConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Ok(Self {
            path: path.to_path_buf(),
            table: read_toml(path)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up the first matching section among `names`.
    ///
    /// Returns `Ok(None)` when no section matches.
    pub fn section(&self, names: &[String]) -> Result<Option<CommandSection>, ConfigError> {
        let Some(table) = names
            .iter()
            .find_map(|n| self.table.get(n).and_then(|v| v.as_table()))
        else {
            return Ok(None);
        };

        let mut section = BTreeMap::new();
        for (key, value) in table {
            let tokens = self.tokens(key, value)?;
            section.insert(key.trim_start_matches('-').to_string(), tokens);
        }
        Ok(Some(section))
    }

    fn tokens(&self, key: &str, value: &toml::Value) -> Result<Vec<String>, ConfigError> {
        match value {
            toml::Value::Array(items) => items
                .iter()
                .map(|item| {
                    scalar_token(item).ok_or_else(|| ConfigError::UnsupportedValue {
                        path: self.path.clone(),
                        key: key.to_string(),
                    })
                })
                .collect(),
            other => scalar_token(other)
                .map(|t| vec![t])
                .ok_or_else(|| ConfigError::UnsupportedValue {
                    path: self.path.clone(),
                    key: key.to_string(),
                }),
        }
    }
}

fn scalar_token(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Datetime(d) => Some(d.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => None,
    }
}
