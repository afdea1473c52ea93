//! execute
//!
//! Execution adapter: runs one action and routes its outputs.
//!
//! # Lifecycle
//!
//! ```text
//! [Open pool] -> Open log -> Invoke -> Route outputs -> [Drop default pool] -> Drop log
//! ```
//!
//! # Invariants
//!
//! - The action's own output goes to the terminal in verbose mode and to a
//!   temporary log file otherwise. The log file is deleted only after the
//!   whole run succeeds, so a failure never loses diagnostics.
//! - Pipelines run inside a resumption pool unless recycling is disabled.
//!   The default pool is deleted after success; a named pool is kept.
//! - Every declared output is saved, either to a path or under a cache key.
//! - Every saved result cites the plugin and the action that produced it.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::citation;
use crate::core::naming::default_pool_name;
use crate::core::result::{is_no_space, QResult, ResultError};
use crate::core::types::{ActionKind, ActionRecord, PluginRecord};
use crate::framework::{ExecContext, Framework, InvokeError, LogSink, ParallelConfig};
use crate::resolve::{OutputDest, ResolvedArgs};
use crate::store::{Pool, ResultCache, StoreError};
use crate::ui::output::{self, Verbosity};

/// Errors from running an action.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The action itself failed.
    #[error("{message}")]
    Plugin {
        plugin: String,
        message: String,
        /// Kept log file, when output was captured.
        log: Option<PathBuf>,
    },

    #[error(
        "There is no space left on the device at {path}. Move it somewhere with more space \
         (for example with --use-cache or the [cache] path setting) or free up space there."
    )]
    NoSpace { path: PathBuf },

    /// Saving outputs failed after the action succeeded.
    #[error("{source}")]
    Routing {
        source: Box<ExecuteError>,
        log: Option<PathBuf>,
    },

    #[error("action did not produce the declared output '{0}'")]
    MissingOutput(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Result(#[from] ResultError),

    #[error("failed to create action log: {0}")]
    Log(std::io::Error),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ExecuteError {
    /// Report header for this error.
    pub fn header(&self) -> String {
        match self {
            ExecuteError::Plugin { plugin, .. } => format!("Plugin error from {}:", plugin),
            ExecuteError::NoSpace { .. } => "Out of space:".to_string(),
            ExecuteError::Routing { source, .. } => source.header(),
            _ => "An unexpected error has occurred:".to_string(),
        }
    }

    /// Report footer pointing at the captured output.
    pub fn footer(&self) -> Option<String> {
        match self {
            ExecuteError::Plugin { log: Some(path), .. }
            | ExecuteError::Routing { log: Some(path), .. } => {
                Some(format!("Debug info has been saved to {}", path.display()))
            }
            ExecuteError::Plugin { log: None, .. } => Some("See above for debug info.".to_string()),
            ExecuteError::Routing { source, .. } => source.footer(),
            _ => None,
        }
    }

    fn from_store(err: StoreError) -> Self {
        match err.no_space_path() {
            Some(path) => ExecuteError::NoSpace {
                path: path.to_path_buf(),
            },
            None => ExecuteError::Store(err),
        }
    }

    fn from_result(err: ResultError) -> Self {
        match err.no_space_path() {
            Some(path) => ExecuteError::NoSpace {
                path: path.to_path_buf(),
            },
            None => ExecuteError::Result(err),
        }
    }
}

/// Resumption pool selection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Recycle {
    /// Pool named after the plugin and action, removed after success.
    #[default]
    Default,
    /// Explicit pool, kept for later runs.
    Named(String),
    Disabled,
}

/// How to run one action.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Stream the action's output instead of capturing it.
    pub verbose: bool,
    pub verbosity: Verbosity,
    pub recycle: Recycle,
    /// Cache holding resumption pools.
    pub pool_cache: PathBuf,
    pub parallel: Option<ParallelConfig>,
}

/// One saved output.
#[derive(Debug, Clone, PartialEq)]
pub struct Saved {
    pub name: String,
    pub type_name: String,
    /// Path written, or `cache:key`.
    pub destination: String,
}

/// Run `action` and save each declared output.
pub fn execute(
    framework: &dyn Framework,
    plugin: &PluginRecord,
    action: &ActionRecord,
    args: &ResolvedArgs,
    options: &ExecOptions,
) -> Result<Vec<Saved>, ExecuteError> {
    let pool = open_pool(plugin, action, options)?;
    if let Some(pool) = &pool {
        output::debug(format!("using pool '{}'", pool.name()), options.verbosity);
    }
    let mut log = open_log(options.verbose)?;

    let results = {
        let mut ctx = ExecContext {
            log: &mut log,
            pool: pool.as_ref(),
            parallel: options.parallel.as_ref(),
        };
        framework.invoke(plugin, action, args, &mut ctx)
    };
    let results = match results {
        Ok(results) => results,
        Err(err) => return Err(invoke_failure(err, plugin, &log)),
    };
    let citations = citation::merge([&plugin.citations[..], &action.citations[..]]);
    let results = results
        .into_iter()
        .map(|(name, result)| (name, result.attribute(&plugin.id, &action.id, &citations)))
        .collect();

    let saved = match route_outputs(args, results) {
        Ok(saved) => saved,
        Err(err) => return Err(routing_failure(err, &log)),
    };

    if let (Some(pool), Recycle::Default) = (&pool, &options.recycle) {
        pool.cache()
            .remove_pool(pool.name())
            .map_err(ExecuteError::from_store)?;
    }
    close_log(log);
    Ok(saved)
}

/// Save each result to its resolved destination, in declaration order.
pub fn route_outputs(
    args: &ResolvedArgs,
    mut results: Vec<(String, QResult)>,
) -> Result<Vec<Saved>, ExecuteError> {
    let mut saved = Vec::with_capacity(args.outputs.len());
    for (name, dest) in &args.outputs {
        let index = results
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| ExecuteError::MissingOutput(name.clone()))?;
        let (_, result) = results.swap_remove(index);
        let destination = save_result(&result, dest)?;
        saved.push(Saved {
            name: name.clone(),
            type_name: result.type_name(),
            destination,
        });
    }
    Ok(saved)
}

fn save_result(result: &QResult, dest: &OutputDest) -> Result<String, ExecuteError> {
    match dest {
        OutputDest::Path(path) => {
            create_parent(path)?;
            let written = result.save(path).map_err(ExecuteError::from_result)?;
            Ok(written.display().to_string())
        }
        OutputDest::Cache { cache, key } => {
            cache
                .save_result(result, key)
                .map_err(ExecuteError::from_store)?;
            Ok(dest.to_string())
        }
    }
}

fn create_parent(path: &Path) -> Result<(), ExecuteError> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => fs::create_dir_all(parent).map_err(|source| {
            if is_no_space(&source) {
                ExecuteError::NoSpace {
                    path: parent.to_path_buf(),
                }
            } else {
                ExecuteError::Io {
                    path: parent.to_path_buf(),
                    source,
                }
            }
        }),
        None => Ok(()),
    }
}

fn open_pool(
    plugin: &PluginRecord,
    action: &ActionRecord,
    options: &ExecOptions,
) -> Result<Option<Pool>, ExecuteError> {
    if action.kind != ActionKind::Pipeline {
        return Ok(None);
    }
    let name = match &options.recycle {
        Recycle::Disabled => return Ok(None),
        Recycle::Default => default_pool_name(&plugin.id, &action.id),
        Recycle::Named(name) => name.clone(),
    };
    let cache = ResultCache::create(&options.pool_cache).map_err(ExecuteError::from_store)?;
    let pool = cache.create_pool(&name).map_err(ExecuteError::from_store)?;
    Ok(Some(pool))
}

fn open_log(verbose: bool) -> Result<LogSink, ExecuteError> {
    if verbose {
        return Ok(LogSink::Terminal);
    }
    let temp = tempfile::Builder::new()
        .prefix("plugcli-")
        .suffix(".log")
        .tempfile()
        .map_err(ExecuteError::Log)?;
    let (file, path) = temp.keep().map_err(|e| ExecuteError::Log(e.error))?;
    Ok(LogSink::File { file, path })
}

fn close_log(log: LogSink) {
    if let LogSink::File { file, path } = log {
        drop(file);
        let _ = fs::remove_file(path);
    }
}

fn invoke_failure(err: InvokeError, plugin: &PluginRecord, log: &LogSink) -> ExecuteError {
    match err {
        InvokeError::Io(source) if is_no_space(&source) => ExecuteError::NoSpace {
            path: std::env::temp_dir(),
        },
        InvokeError::Store(store) if store.no_space_path().is_some() => {
            ExecuteError::from_store(store)
        }
        other => ExecuteError::Plugin {
            plugin: plugin.name.clone(),
            message: other.to_string(),
            log: log.path().map(Path::to_path_buf),
        },
    }
}

/// The log stays on disk; point the report at it.
fn routing_failure(err: ExecuteError, log: &LogSink) -> ExecuteError {
    match log.path() {
        Some(path) => ExecuteError::Routing {
            source: Box::new(err),
            log: Some(path.to_path_buf()),
        },
        None => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::result::Artifact;
    use crate::framework::testing::DummyFramework;
    use crate::resolve::ArgValue;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(action_id: &str) -> (PluginRecord, ActionRecord) {
        let plugin = DummyFramework::new()
            .introspect()
            .unwrap()
            .into_iter()
            .find(|p| p.id == "dummy_plugin")
            .unwrap();
        let action = plugin.actions[action_id].clone();
        (plugin, action)
    }

    fn seq(values: &[i64]) -> ArgValue {
        ArgValue::Artifact(Artifact::new(
            "IntSequence1".parse().unwrap(),
            json!(values),
        ))
    }

    fn options(dir: &TempDir, recycle: Recycle) -> ExecOptions {
        ExecOptions {
            verbose: false,
            verbosity: Verbosity::Quiet,
            recycle,
            pool_cache: dir.path().join("pools"),
            parallel: None,
        }
    }

    #[test]
    fn concatenate_saves_to_path() {
        let dir = TempDir::new().unwrap();
        let (plugin, action) = record("concatenate_ints");
        let args = ResolvedArgs {
            values: vec![
                ("ints1".into(), seq(&[1, 2])),
                ("ints2".into(), seq(&[3])),
                ("int1".into(), ArgValue::Int(5)),
            ],
            outputs: vec![(
                "result".into(),
                OutputDest::Path(dir.path().join("nested/out")),
            )],
        };
        let saved = execute(
            &DummyFramework::new(),
            &plugin,
            &action,
            &args,
            &options(&dir, Recycle::Default),
        )
        .unwrap();

        assert_eq!(saved.len(), 1);
        assert!(saved[0].destination.ends_with("out.art"));
        let loaded = Artifact::load(&dir.path().join("nested/out.art")).unwrap();
        assert_eq!(loaded.data, json!([1, 2, 3, 5]));
        let keys: Vec<&str> = loaded.citations().iter().map(|c| c.key.as_str()).collect();
        let expected: Vec<&str> = plugin
            .citations
            .iter()
            .chain(&action.citations)
            .map(|c| c.key.as_str())
            .collect();
        assert!(!expected.is_empty());
        assert_eq!(keys, expected);
    }

    #[test]
    fn saves_into_cache_key() {
        let dir = TempDir::new().unwrap();
        let cache = ResultCache::create(&dir.path().join("cache")).unwrap();
        let (plugin, action) = record("concatenate_ints");
        let args = ResolvedArgs {
            values: vec![
                ("ints1".into(), seq(&[1])),
                ("ints2".into(), seq(&[2])),
                ("int1".into(), ArgValue::Int(3)),
            ],
            outputs: vec![(
                "result".into(),
                OutputDest::Cache {
                    cache: cache.clone(),
                    key: "joined".into(),
                },
            )],
        };
        execute(
            &DummyFramework::new(),
            &plugin,
            &action,
            &args,
            &options(&dir, Recycle::Default),
        )
        .unwrap();
        match cache.load("joined").unwrap() {
            QResult::Artifact(a) => assert_eq!(a.data, json!([1, 2, 3])),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn plugin_failure_keeps_log() {
        let dir = TempDir::new().unwrap();
        let (plugin, action) = record("failing_method");
        let args = ResolvedArgs {
            values: vec![("message".into(), ArgValue::Str("boom".into()))],
            outputs: Vec::new(),
        };
        let err = execute(
            &DummyFramework::new(),
            &plugin,
            &action,
            &args,
            &options(&dir, Recycle::Default),
        )
        .unwrap_err();

        assert_eq!(err.header(), "Plugin error from dummy-plugin:");
        assert_eq!(err.to_string(), "boom");
        match &err {
            ExecuteError::Plugin { log: Some(path), .. } => {
                assert!(path.exists());
                fs::remove_file(path).unwrap();
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(err.footer().unwrap().starts_with("Debug info has been saved to"));
    }

    #[test]
    fn routing_failure_keeps_log() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("blocker"), "not a directory").unwrap();
        let (plugin, action) = record("concatenate_ints");
        let args = ResolvedArgs {
            values: vec![
                ("ints1".into(), seq(&[1])),
                ("ints2".into(), seq(&[2])),
                ("int1".into(), ArgValue::Int(3)),
            ],
            outputs: vec![(
                "result".into(),
                OutputDest::Path(dir.path().join("blocker/out")),
            )],
        };
        let err = execute(
            &DummyFramework::new(),
            &plugin,
            &action,
            &args,
            &options(&dir, Recycle::Default),
        )
        .unwrap_err();

        assert_eq!(err.header(), "An unexpected error has occurred:");
        match &err {
            ExecuteError::Routing { source, log: Some(path) } => {
                assert!(matches!(**source, ExecuteError::Io { .. }));
                assert!(path.exists());
                fs::remove_file(path).unwrap();
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(err.footer().unwrap().starts_with("Debug info has been saved to"));
    }

    fn pipeline_args(dir: &TempDir, fail: bool) -> ResolvedArgs {
        let out = |name: &str| (name.to_string(), OutputDest::Path(dir.path().join(name)));
        ResolvedArgs {
            values: vec![
                ("ints1".into(), seq(&[1, 2])),
                ("ints2".into(), seq(&[3, 4])),
                ("fail".into(), ArgValue::Bool(fail)),
            ],
            outputs: vec![out("concatenated"), out("left"), out("right"), out("viz")],
        }
    }

    #[test]
    fn default_pool_removed_after_success() {
        let dir = TempDir::new().unwrap();
        let (plugin, action) = record("resumable_pipeline");
        let framework = DummyFramework::new();
        let opts = options(&dir, Recycle::Default);

        assert!(execute(&framework, &plugin, &action, &pipeline_args(&dir, true), &opts).is_err());
        let cache = ResultCache::open(&opts.pool_cache).unwrap();
        let name = default_pool_name(&plugin.id, &action.id);
        assert!(cache.has_key(&name));

        execute(&framework, &plugin, &action, &pipeline_args(&dir, false), &opts).unwrap();
        assert!(!cache.has_key(&name));
    }

    #[test]
    fn named_pool_is_kept() {
        let dir = TempDir::new().unwrap();
        let (plugin, action) = record("resumable_pipeline");
        let opts = options(&dir, Recycle::Named("mine".into()));
        execute(
            &DummyFramework::new(),
            &plugin,
            &action,
            &pipeline_args(&dir, false),
            &opts,
        )
        .unwrap();
        let cache = ResultCache::open(&opts.pool_cache).unwrap();
        assert!(cache.has_key("mine"));
    }

    #[test]
    fn disabled_recycling_creates_no_cache() {
        let dir = TempDir::new().unwrap();
        let (plugin, action) = record("resumable_pipeline");
        let opts = options(&dir, Recycle::Disabled);
        execute(
            &DummyFramework::new(),
            &plugin,
            &action,
            &pipeline_args(&dir, false),
            &opts,
        )
        .unwrap();
        assert!(!opts.pool_cache.exists());
    }

    #[test]
    fn missing_declared_output_is_reported() {
        let args = ResolvedArgs {
            values: Vec::new(),
            outputs: vec![("result".into(), OutputDest::Path(PathBuf::from("x")))],
        };
        let err = route_outputs(&args, Vec::new()).unwrap_err();
        assert!(matches!(err, ExecuteError::MissingOutput(name) if name == "result"));
    }
}
