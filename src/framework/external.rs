//! framework::external
//!
//! Plugins described by `*.plugin.json` manifests and run as subprocesses.
//!
//! # Discovery
//!
//! Every directory in `PLUGCLI_PLUGIN_PATH` (platform path-list syntax) is
//! scanned for files named `<anything>.plugin.json`. Each manifest is a
//! plugin record plus the command that runs its actions:
//!
//! ```json
//! {
//!   "id": "my_plugin", "name": "my-plugin", "version": "1.2.0",
//!   "website": "...", "user_support_text": "...",
//!   "description": "...", "short_description": "...",
//!   "actions": { ... },
//!   "command": ["./run-action"]
//! }
//! ```
//!
//! A relative program path is resolved against the manifest's directory.
//!
//! # Protocol
//!
//! The command receives one JSON request on stdin:
//!
//! ```json
//! {"plugin": "...", "action": "...", "args": {...},
//!  "pool": {"cache": "/path", "name": "..."} | null,
//!  "parallel": {...} | null}
//! ```
//!
//! and answers on stdout with `{"results": {"<output>": <artifact> |
//! {"members": [["key", <artifact>], ...]}}}`. Its stderr goes to the
//! invocation's log sink. A non-zero exit status is an action failure.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ExecContext, Framework, FrameworkError, InvokeError, Requirement};
use crate::core::result::{Artifact, QResult, ResultCollection};
use crate::core::types::{ActionRecord, PluginRecord};
use crate::resolve::ResolvedArgs;

/// Directories searched for plugin manifests.
pub const PLUGIN_PATH_ENV: &str = "PLUGCLI_PLUGIN_PATH";

const MANIFEST_SUFFIX: &str = ".plugin.json";

/// A plugin manifest on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    #[serde(flatten)]
    pub plugin: PluginRecord,
    pub command: Vec<String>,
}

/// Just enough of a manifest to fingerprint the deployment.
#[derive(Debug, Deserialize)]
struct ManifestHeader {
    name: String,
    version: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireResult {
    Collection { members: Vec<(String, Artifact)> },
    Single(Artifact),
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    results: BTreeMap<String, WireResult>,
}

/// Manifest-driven framework.
#[derive(Debug, Clone, Default)]
pub struct ExternalFramework {
    dirs: Vec<PathBuf>,
}

impl ExternalFramework {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// Search the directories named by `PLUGCLI_PLUGIN_PATH`.
    pub fn from_env() -> Self {
        let dirs = std::env::var_os(PLUGIN_PATH_ENV)
            .map(|v| std::env::split_paths(&v).collect())
            .unwrap_or_default();
        Self::new(dirs)
    }

    /// Manifest files in search order.
    fn manifest_paths(&self) -> Result<Vec<PathBuf>, FrameworkError> {
        let mut paths = Vec::new();
        for dir in &self.dirs {
            if !dir.is_dir() {
                continue;
            }
            let mut found = Vec::new();
            let entries = fs::read_dir(dir).map_err(|e| FrameworkError::ManifestRead {
                path: dir.clone(),
                source: e,
            })?;
            for entry in entries {
                let path = entry
                    .map_err(|e| FrameworkError::ManifestRead {
                        path: dir.clone(),
                        source: e,
                    })?
                    .path();
                let is_manifest = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(MANIFEST_SUFFIX));
                if is_manifest && path.is_file() {
                    found.push(path);
                }
            }
            found.sort();
            paths.extend(found);
        }
        Ok(paths)
    }

    fn read<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, FrameworkError> {
        let contents = fs::read_to_string(path).map_err(|e| FrameworkError::ManifestRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&contents).map_err(|e| FrameworkError::ManifestInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load every manifest, keyed by its path.
    pub fn manifests(&self) -> Result<Vec<(PathBuf, PluginManifest)>, FrameworkError> {
        let mut manifests: Vec<(PathBuf, PluginManifest)> = Vec::new();
        for path in self.manifest_paths()? {
            let manifest: PluginManifest = Self::read(&path)?;
            if manifest.command.is_empty() {
                return Err(FrameworkError::ManifestInvalid {
                    path,
                    message: "command must not be empty".to_string(),
                });
            }
            if manifests.iter().any(|(_, m)| m.plugin.id == manifest.plugin.id) {
                return Err(FrameworkError::ManifestInvalid {
                    path,
                    message: format!("plugin '{}' is defined more than once", manifest.plugin.id),
                });
            }
            manifests.push((path, manifest));
        }
        Ok(manifests)
    }

    fn command_for(&self, plugin_id: &str) -> Result<Command, InvokeError> {
        let manifests = self
            .manifests()
            .map_err(|e| InvokeError::Failed(e.to_string()))?;
        let (path, manifest) = manifests
            .into_iter()
            .find(|(_, m)| m.plugin.id == plugin_id)
            .ok_or_else(|| {
                InvokeError::Failed(format!("plugin '{}' is no longer installed", plugin_id))
            })?;

        let mut argv = manifest.command.into_iter();
        let program = argv.next().unwrap_or_default();
        let program = match path.parent() {
            Some(dir) if program.starts_with("./") || program.starts_with("../") => {
                dir.join(&program)
            }
            _ => PathBuf::from(program),
        };
        let mut command = Command::new(program);
        command.args(argv);
        Ok(command)
    }
}

impl Framework for ExternalFramework {
    fn requirements(&self) -> Result<Vec<Requirement>, FrameworkError> {
        let mut reqs = Vec::new();
        for path in self.manifest_paths()? {
            let header: ManifestHeader = Self::read(&path)?;
            reqs.push(Requirement::new(header.name, header.version));
        }
        reqs.push(Requirement::tool());
        reqs.sort();
        Ok(reqs)
    }

    fn introspect(&self) -> Result<Vec<PluginRecord>, FrameworkError> {
        Ok(self
            .manifests()?
            .into_iter()
            .map(|(_, m)| m.plugin)
            .collect())
    }

    fn invoke(
        &self,
        plugin: &PluginRecord,
        action: &ActionRecord,
        args: &ResolvedArgs,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Vec<(String, QResult)>, InvokeError> {
        let request = json!({
            "plugin": plugin.id,
            "action": action.id,
            "args": args.to_json(),
            "pool": ctx.pool.map(|p| json!({
                "cache": p.cache().path(),
                "name": p.name(),
            })),
            "parallel": ctx.parallel,
        });

        let mut command = self.command_for(&plugin.id)?;
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(ctx.log.stdio()?)
            .spawn()
            .map_err(|e| InvokeError::Failed(format!("failed to start '{}': {}", plugin.name, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(request.to_string().as_bytes())?;
            stdin.flush()?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(InvokeError::Failed(format!(
                "action '{}' exited with {}",
                action.id, output.status
            )));
        }

        let response: WireResponse = serde_json::from_slice(&output.stdout).map_err(|e| {
            InvokeError::Failed(format!("action '{}' returned invalid results: {}", action.id, e))
        })?;

        Ok(response
            .results
            .into_iter()
            .map(|(name, result)| {
                let result = match result {
                    WireResult::Single(artifact) => QResult::from(artifact),
                    WireResult::Collection { members } => {
                        QResult::Collection(ResultCollection::new(members))
                    }
                };
                (name, result)
            })
            .collect())
    }
}
