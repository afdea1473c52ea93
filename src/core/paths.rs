//! core::paths
//!
//! Centralized path routing for plugcli storage locations.
//!
//! # Storage Layout
//!
//! Application data lives under a single home directory:
//! - `state.json` - Cached deployment description
//! - `requirements.txt` - Fingerprint of the deployment that produced the state
//! - `views/` - Visualizations unpacked by `tools view`
//!
//! The home is `$PLUGCLI_HOME` when set, otherwise `<cache_dir>/plugcli`.
//! No code outside this module should compute these file names.
//!
//! # Example
//!
//! ```
//! use plugcli::core::paths::AppPaths;
//! use std::path::PathBuf;
//!
//! let paths = AppPaths::new(PathBuf::from("/home/me/.cache/plugcli"));
//! assert_eq!(
//!     paths.state_path(),
//!     PathBuf::from("/home/me/.cache/plugcli/state.json")
//! );
//! ```

use std::path::{Path, PathBuf};

/// Environment variable overriding the application home.
pub const HOME_ENV: &str = "PLUGCLI_HOME";

/// Path routing for application storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub home: PathBuf,
}

impl AppPaths {
    pub fn new(home: PathBuf) -> Self {
        Self { home }
    }

    /// Resolve the application home from the environment.
    ///
    /// Falls back to the system temp directory when no cache directory
    /// is known for the platform.
    pub fn from_env() -> Self {
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Self::new(PathBuf::from(home));
        }
        let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
        Self::new(base.join("plugcli"))
    }

    /// Cached deployment state.
    pub fn state_path(&self) -> PathBuf {
        self.home.join("state.json")
    }

    /// Fingerprint written after the state.
    pub fn requirements_path(&self) -> PathBuf {
        self.home.join("requirements.txt")
    }

    /// Staging area for `tools view` sessions.
    pub fn views_dir(&self) -> PathBuf {
        self.home.join("views")
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Create the home directory if needed.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.home)
    }
}

/// Name of the current user, for per-user default locations.
pub fn current_user() -> String {
    ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Default location of the result cache: `<temp>/plugcli-cache-<user>`.
pub fn default_result_cache() -> PathBuf {
    std::env::temp_dir().join(format!("plugcli-cache-{}", current_user()))
}
