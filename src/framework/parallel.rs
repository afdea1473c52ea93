//! framework::parallel
//!
//! Parallel execution settings for pipelines.
//!
//! # File Format
//!
//! ```toml
//! default = "local"
//!
//! [executors.local]
//! kind = "threads"
//! max_workers = 4
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::config::{read_toml, ConfigError};

/// How an executor runs work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    #[default]
    Threads,
    Processes,
}

/// One named executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorConfig {
    #[serde(default)]
    pub kind: ExecutorKind,
    pub max_workers: Option<usize>,
}

/// Executors available to a parallel pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParallelConfig {
    pub default: String,
    pub executors: BTreeMap<String, ExecutorConfig>,
}

impl ParallelConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: ParallelConfig = read_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Thread executor sized to the machine.
    pub fn local() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let mut executors = BTreeMap::new();
        executors.insert(
            "local".to_string(),
            ExecutorConfig {
                kind: ExecutorKind::Threads,
                max_workers: Some(workers),
            },
        );
        Self {
            default: "local".to_string(),
            executors,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.executors.contains_key(&self.default) {
            return Err(ConfigError::InvalidValue(format!(
                "default executor '{}' is not defined in [executors]",
                self.default
            )));
        }
        if self.executors.values().any(|e| e.max_workers == Some(0)) {
            return Err(ConfigError::InvalidValue(
                "max_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Worker count of the default executor.
    pub fn workers(&self) -> usize {
        self.executors
            .get(&self.default)
            .and_then(|e| e.max_workers)
            .unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn loads_valid_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("parallel.toml");
        fs::write(
            &path,
            "default = \"pool\"\n[executors.pool]\nkind = \"processes\"\nmax_workers = 3\n",
        )
        .unwrap();

        let config = ParallelConfig::load(&path).unwrap();
        assert_eq!(config.workers(), 3);
        assert_eq!(config.executors["pool"].kind, ExecutorKind::Processes);
    }

    #[test]
    fn undefined_default_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("parallel.toml");
        fs::write(&path, "default = \"nope\"\n[executors.local]\n").unwrap();

        assert!(matches!(
            ParallelConfig::load(&path),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn local_has_at_least_one_worker() {
        let config = ParallelConfig::local();
        assert!(config.validate().is_ok());
        assert!(config.workers() >= 1);
    }
}
