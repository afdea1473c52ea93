//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$PLUGCLI_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/plugcli/config.toml`
//! 3. `~/.plugcli/config.toml`
//!
//! # Command Config
//!
//! Passed per invocation with `--cmd-config FILE`. One table per action,
//! named `"<plugin>.<action>"`, whose keys are option names without the
//! leading dashes.
//!
//! ```toml
//! ["dummy-plugin.concatenate-ints"]
//! p-int1 = 4
//! i-ints1 = "ints_a.art"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// verbose = false
/// recycle = true
///
/// [cache]
/// path = "/scratch/me/plug-cache"
///
/// [parallel]
/// config = "/home/me/parallel.toml"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Stream action output instead of capturing it
    pub verbose: Option<bool>,

    /// Whether pipelines keep a resumption pool by default
    pub recycle: Option<bool>,

    /// Result cache settings
    pub cache: Option<CacheDefaults>,

    /// Parallel execution settings
    pub parallel: Option<ParallelDefaults>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(cache) = &self.cache {
            if cache.path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "cache.path must not be empty".to_string(),
                ));
            }
        }
        if let Some(parallel) = &self.parallel {
            if parallel.config.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "parallel.config must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Result cache defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CacheDefaults {
    /// Cache used when `--use-cache` is not given
    pub path: PathBuf,
}

/// Parallel execution defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ParallelDefaults {
    /// Config file used by `--parallel` when no file is given
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_global_config() {
        let config: GlobalConfig = toml::from_str(
            r#"
            verbose = true
            recycle = false

            [cache]
            path = "/tmp/c"

            [parallel]
            config = "/tmp/p.toml"
            "#,
        )
        .unwrap();

        assert_eq!(config.verbose, Some(true));
        assert_eq!(config.recycle, Some(false));
        assert_eq!(config.cache.unwrap().path, PathBuf::from("/tmp/c"));
        assert!(config.parallel.is_some());
    }

    #[test]
    fn empty_cache_path_invalid() {
        let config = GlobalConfig {
            cache: Some(CacheDefaults {
                path: PathBuf::new(),
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_nested_field_rejected() {
        let result: Result<GlobalConfig, _> = toml::from_str("[cache]\npath = \"/x\"\nsize = 3\n");
        assert!(result.is_err());
    }
}
