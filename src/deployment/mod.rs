//! deployment
//!
//! Deployment state cache.
//!
//! # Architecture
//!
//! Building the command tree needs every installed plugin's action
//! signatures. Asking the framework for them is slow, so the answer is kept
//! in two files under the application home:
//!
//! - `requirements.txt` - the fingerprint, one `name==version` line per
//!   plugin package plus this tool
//! - `state.json` - the serialized plugin records
//!
//! # Refresh Decision
//!
//! In order: a forced refresh (`PLUGCLI_DEV` or `plug dev refresh-cache`),
//! a fingerprint mismatch, a missing state file, an unreadable state file.
//! Otherwise the stored state is reused.
//!
//! # Write Order
//!
//! The old fingerprint is removed before the state is replaced and the new
//! fingerprint is written last. A failure part way through leaves no
//! fingerprint, which forces the next run to refresh again.
//!
//! # Concurrency
//!
//! Refreshes from separate processes are not coordinated. Both files are
//! replaced whole, so the loser of a race only repeats work.

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::atomic::{write_atomic, write_json_atomic};
use crate::core::naming::to_cli_name;
use crate::core::paths::AppPaths;
use crate::core::types::{PluginRecord, SignatureError};
use crate::framework::{Framework, FrameworkError, Requirement};
use crate::ui::output::{self, Verbosity};

/// Environment variable forcing a refresh on every invocation.
pub const DEV_ENV: &str = "PLUGCLI_DEV";

/// Version of the state file layout.
pub const STATE_FORMAT: u32 = 1;

/// Errors from the deployment cache.
#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Framework(#[from] FrameworkError),

    #[error("plugin '{plugin}' action '{action}' has an invalid signature: {source}")]
    InvalidSignature {
        plugin: String,
        action: String,
        source: SignatureError,
    },

    #[error("failed to write deployment cache '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Serialized deployment state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentState {
    pub format: u32,
    /// Plugins keyed by command-line name.
    pub plugins: BTreeMap<String, PluginRecord>,
}

impl DeploymentState {
    /// Build state from introspected records, validating every signature.
    pub fn from_records(records: Vec<PluginRecord>) -> Result<Self, DeploymentError> {
        let mut plugins = BTreeMap::new();
        for plugin in records {
            for action in plugin.actions.values() {
                action
                    .signature
                    .validate()
                    .map_err(|source| DeploymentError::InvalidSignature {
                        plugin: plugin.id.clone(),
                        action: action.id.clone(),
                        source,
                    })?;
            }
            plugins.insert(to_cli_name(&plugin.name), plugin);
        }
        Ok(Self {
            format: STATE_FORMAT,
            plugins,
        })
    }
}

/// Why the state was regenerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    Forced,
    FingerprintChanged,
    StateMissing,
    StateCorrupt,
}

impl fmt::Display for RefreshReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RefreshReason::Forced => "refresh requested",
            RefreshReason::FingerprintChanged => "installed plugins changed",
            RefreshReason::StateMissing => "no cached state",
            RefreshReason::StateCorrupt => "cached state is unreadable",
        };
        write!(f, "{}", text)
    }
}

/// Render requirements as fingerprint text.
pub fn fingerprint(requirements: &[Requirement]) -> String {
    let mut lines: Vec<String> = requirements.iter().map(ToString::to_string).collect();
    lines.sort();
    lines.dedup();
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Process-wide handle on the deployment state.
///
/// The state is loaded (or refreshed) at most once per handle.
#[derive(Debug)]
pub struct DeploymentCache {
    paths: AppPaths,
    forced: bool,
    verbosity: Verbosity,
    state: OnceCell<DeploymentState>,
}

impl DeploymentCache {
    /// Open the cache under `paths`, honoring `PLUGCLI_DEV`.
    pub fn new(paths: AppPaths) -> Self {
        let forced = std::env::var_os(DEV_ENV).is_some_and(|v| !v.is_empty());
        Self {
            paths,
            forced,
            verbosity: Verbosity::Normal,
            state: OnceCell::new(),
        }
    }

    pub fn with_forced(mut self, forced: bool) -> Self {
        self.forced = forced;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    /// Installed plugins keyed by command-line name.
    pub fn get_plugins(
        &self,
        framework: &dyn Framework,
    ) -> Result<&BTreeMap<String, PluginRecord>, DeploymentError> {
        if let Some(state) = self.state.get() {
            return Ok(&state.plugins);
        }
        let state = self.load(framework)?;
        Ok(&self.state.get_or_init(|| state).plugins)
    }

    /// Decide whether the stored state can be reused.
    pub fn refresh_reason(
        &self,
        framework: &dyn Framework,
    ) -> Result<Option<RefreshReason>, DeploymentError> {
        if self.forced {
            return Ok(Some(RefreshReason::Forced));
        }
        let current = fingerprint(&framework.requirements()?);
        match fs::read_to_string(self.paths.requirements_path()) {
            Ok(stored) if stored == current => {}
            _ => return Ok(Some(RefreshReason::FingerprintChanged)),
        }
        Ok(match self.read_state() {
            Ok(_) => None,
            Err(StateRead::Missing) => Some(RefreshReason::StateMissing),
            Err(StateRead::Corrupt) => Some(RefreshReason::StateCorrupt),
        })
    }

    /// Introspect the framework and replace both files.
    pub fn refresh(&self, framework: &dyn Framework) -> Result<DeploymentState, DeploymentError> {
        let requirements = framework.requirements()?;
        let state = DeploymentState::from_records(framework.introspect()?)?;

        let requirements_path = self.paths.requirements_path();
        let state_path = self.paths.state_path();
        self.paths.ensure_dirs().map_err(|source| DeploymentError::Write {
            path: self.paths.home().to_path_buf(),
            source,
        })?;

        match fs::remove_file(&requirements_path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(DeploymentError::Write {
                    path: requirements_path,
                    source,
                })
            }
        }
        write_json_atomic(&state_path, &state).map_err(|source| DeploymentError::Write {
            path: state_path,
            source,
        })?;
        write_atomic(&requirements_path, fingerprint(&requirements).as_bytes()).map_err(
            |source| DeploymentError::Write {
                path: requirements_path,
                source,
            },
        )?;
        Ok(state)
    }

    fn load(&self, framework: &dyn Framework) -> Result<DeploymentState, DeploymentError> {
        let Some(reason) = self.refresh_reason(framework)? else {
            if let Ok(state) = self.read_state() {
                output::debug("reusing cached deployment state", self.verbosity);
                return Ok(state);
            }
            return self.refresh_with_notice(framework, RefreshReason::StateCorrupt);
        };
        self.refresh_with_notice(framework, reason)
    }

    fn refresh_with_notice(
        &self,
        framework: &dyn Framework,
        reason: RefreshReason,
    ) -> Result<DeploymentState, DeploymentError> {
        output::notice(
            format!(
                "Refreshing plugin deployment cache ({}). This may take a moment...",
                reason
            ),
            self.verbosity,
        );
        self.refresh(framework)
    }

    fn read_state(&self) -> Result<DeploymentState, StateRead> {
        let text = match fs::read_to_string(self.paths.state_path()) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(StateRead::Missing),
            Err(_) => return Err(StateRead::Corrupt),
        };
        match serde_json::from_str::<DeploymentState>(&text) {
            Ok(state) if state.format == STATE_FORMAT => Ok(state),
            _ => Err(StateRead::Corrupt),
        }
    }
}

enum StateRead {
    Missing,
    Corrupt,
}
