//! framework
//!
//! Seam between the command line and the plugin framework.
//!
//! # Architecture
//!
//! The framework is an opaque collaborator with three capabilities:
//!
//! - [`Framework::requirements`] - Cheap deployment fingerprint
//! - [`Framework::introspect`] - Expensive full description of every plugin
//! - [`Framework::invoke`] - Run one action and return its results
//!
//! Only the deployment cache calls `introspect`, and only when its stored
//! fingerprint is stale. Everything else works from the cached records.
//!
//! # Implementations
//!
//! - [`external::ExternalFramework`] - Plugins described by manifest files
//!   and run as subprocesses speaking JSON
//! - [`testing::DummyFramework`] - In-process dummy plugin, selected when
//!   `PLUGCLI_TEST` is set
//!
//! # Example
//!
//! ```
//! use plugcli::framework::{testing::DummyFramework, Framework};
//!
//! let framework = DummyFramework::new();
//! let plugins = framework.introspect().unwrap();
//! assert!(plugins.iter().any(|p| p.id == "dummy_plugin"));
//! ```

pub mod external;
pub mod parallel;
pub mod testing;

pub use parallel::ParallelConfig;

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;

use thiserror::Error;

use crate::core::result::QResult;
use crate::core::types::{ActionRecord, PluginRecord};
use crate::resolve::ResolvedArgs;
use crate::store::{Pool, StoreError};

/// Environment variable selecting the dummy deployment.
pub const TEST_ENV: &str = "PLUGCLI_TEST";

/// Errors while fingerprinting or introspecting a deployment.
#[derive(Debug, Error)]
pub enum FrameworkError {
    #[error("failed to read plugin manifest '{path}': {source}")]
    ManifestRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid plugin manifest '{path}': {message}")]
    ManifestInvalid { path: PathBuf, message: String },

    #[error("invalid requirement line '{0}'")]
    InvalidRequirement(String),
}

/// Errors raised by an action while it runs.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One exact `name==version` requirement.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Requirement {
    pub name: String,
    pub version: String,
}

impl Requirement {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Requirement for this tool itself.
    pub fn tool() -> Self {
        Self::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=={}", self.name, self.version)
    }
}

impl FromStr for Requirement {
    type Err = FrameworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once("==") {
            Some((name, version)) if !name.is_empty() && !version.is_empty() => {
                Ok(Self::new(name, version))
            }
            _ => Err(FrameworkError::InvalidRequirement(s.to_string())),
        }
    }
}

/// Destination of an action's own output.
#[derive(Debug)]
pub enum LogSink {
    /// Stream to the terminal.
    Terminal,
    /// Capture into a log file.
    File { file: File, path: PathBuf },
}

impl LogSink {
    pub fn path(&self) -> Option<&Path> {
        match self {
            LogSink::Terminal => None,
            LogSink::File { path, .. } => Some(path),
        }
    }

    /// Stdio handle for a child process writing to this sink.
    pub fn stdio(&self) -> io::Result<Stdio> {
        match self {
            LogSink::Terminal => Ok(Stdio::inherit()),
            LogSink::File { file, .. } => Ok(Stdio::from(file.try_clone()?)),
        }
    }
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LogSink::Terminal => io::stderr().write(buf),
            LogSink::File { file, .. } => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogSink::Terminal => io::stderr().flush(),
            LogSink::File { file, .. } => file.flush(),
        }
    }
}

/// Per-invocation services available to a running action.
pub struct ExecContext<'a> {
    pub log: &'a mut LogSink,
    /// Resumption pool, for pipelines with recycling enabled.
    pub pool: Option<&'a Pool>,
    pub parallel: Option<&'a ParallelConfig>,
}

/// The plugin framework.
pub trait Framework {
    /// Installed plugin packages plus this tool, as exact requirements.
    fn requirements(&self) -> Result<Vec<Requirement>, FrameworkError>;

    /// Describe every installed plugin. Expensive.
    fn introspect(&self) -> Result<Vec<PluginRecord>, FrameworkError>;

    /// Run an action, returning its outputs by name.
    fn invoke(
        &self,
        plugin: &PluginRecord,
        action: &ActionRecord,
        args: &ResolvedArgs,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Vec<(String, QResult)>, InvokeError>;
}

/// Select the framework for this process.
pub fn detect() -> Box<dyn Framework> {
    if std::env::var_os(TEST_ENV).is_some_and(|v| !v.is_empty()) {
        Box::new(testing::DummyFramework::new())
    } else {
        Box::new(external::ExternalFramework::from_env())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requirement_roundtrip() {
        let req: Requirement = "dummy-plugin==0.1.0".parse().unwrap();
        assert_eq!(req, Requirement::new("dummy-plugin", "0.1.0"));
        assert_eq!(req.to_string(), "dummy-plugin==0.1.0");
    }

    #[test]
    fn requirement_rejects_loose_versions() {
        assert!("dummy-plugin>=0.1".parse::<Requirement>().is_err());
        assert!("==1".parse::<Requirement>().is_err());
    }

    #[test]
    fn tool_requirement_uses_package_version() {
        assert_eq!(Requirement::tool().version, env!("CARGO_PKG_VERSION"));
    }
}
