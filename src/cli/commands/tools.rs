//! tools command - Cache management and result inspection
//!
//! # Subcommands
//!
//! - `cache-create`, `cache-store`, `cache-fetch`, `cache-remove`,
//!   `cache-status` - Manage a result cache
//! - `peek` - Summarize a result file or cache reference
//! - `inspect-metadata` - Show the columns of metadata sources
//! - `citations` - Print the BibTeX entries a result carries
//! - `view` - Open a visualization until the user quits
//! - `extract` - Unpack a result into a directory
//! - `validate` - Check that a result is well formed

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};

use super::viewer::{self, StagedView};
use crate::assemble::BIN_NAME;
use crate::cli::{Context, EXIT_FAILURE};
use crate::core::citation::bibliography;
use crate::core::metadata::Metadata;
use crate::core::paths::AppPaths;
use crate::core::result::{
    Artifact, PeekInfo, QResult, ResultError, ResultKind, ValidationLevel,
};
use crate::execute::ExecuteError;
use crate::resolve::reference::{load_metadata, parse_input};
use crate::store::{CacheLock, ResultCache};
use crate::ui::output::{self, format_list, Verbosity};

fn cache_arg() -> Arg {
    Arg::new("cache")
        .long("cache")
        .value_name("PATH")
        .required(true)
        .help("Path to a result cache")
}

fn key_arg() -> Arg {
    Arg::new("key")
        .long("key")
        .value_name("KEY")
        .required(true)
        .help("Key in the cache")
}

pub(super) fn command() -> Command {
    Command::new("tools")
        .about("Tools for working with results and caches.")
        .disable_help_subcommand(true)
        .subcommand(
            Command::new("cache-create")
                .about("Create an empty cache at the given location.")
                .arg(cache_arg()),
        )
        .subcommand(
            Command::new("cache-store")
                .about("Store a result file in the cache under a key.")
                .arg(cache_arg())
                .arg(
                    Arg::new("artifact-path")
                        .long("artifact-path")
                        .value_name("PATH")
                        .required(true)
                        .help("Result file or collection directory to store"),
                )
                .arg(key_arg()),
        )
        .subcommand(
            Command::new("cache-fetch")
                .about("Fetch the result stored under a key into a file.")
                .arg(cache_arg())
                .arg(key_arg())
                .arg(
                    Arg::new("output-path")
                        .long("output-path")
                        .value_name("PATH")
                        .required(true)
                        .help("Where to write the result"),
                ),
        )
        .subcommand(
            Command::new("cache-remove")
                .about("Remove a key from the cache.")
                .arg(cache_arg())
                .arg(key_arg()),
        )
        .subcommand(
            Command::new("cache-status")
                .about("List the keys, pools and data in the cache.")
                .arg(cache_arg()),
        )
        .subcommand(
            Command::new("peek")
                .about("Show the UUID, type and kind of a result.")
                .arg(
                    Arg::new("reference")
                        .value_name("RESULT")
                        .required(true)
                        .help("Result file, collection directory or <cache>:<key>"),
                ),
        )
        .subcommand(
            Command::new("inspect-metadata")
                .about("Inspect the columns of metadata files or results viewable as metadata.")
                .arg(
                    Arg::new("references")
                        .value_name("METADATA")
                        .required(true)
                        .action(ArgAction::Append)
                        .num_args(1..)
                        .help("Metadata files, results or <cache>:<key> references; several are merged"),
                ),
        )
        .subcommand(
            Command::new("citations")
                .about("Print citations for a result as BibTeX.")
                .arg(
                    Arg::new("reference")
                        .value_name("RESULT")
                        .required(true)
                        .help("Result file, collection directory or <cache>:<key>"),
                ),
        )
        .subcommand(
            Command::new("view")
                .about("Display a visualization until the command exits.")
                .long_about(format!(
                    "Display a visualization until the command exits. To keep the \
                     unpacked visualization after the command exits, use '{} tools extract'.",
                    BIN_NAME
                ))
                .arg(
                    Arg::new("path")
                        .value_name("VISUALIZATION")
                        .required(true)
                        .help("Visualization file"),
                )
                .arg(
                    Arg::new("index-extension")
                        .long("index-extension")
                        .value_name("EXT")
                        .default_value("html")
                        .help("Extension of the index file to open"),
                ),
        )
        .subcommand(
            Command::new("extract")
                .about("Unpack a result's data, metadata and citations into a directory.")
                .arg(
                    Arg::new("input-path")
                        .long("input-path")
                        .value_name("PATH")
                        .required(true)
                        .help("Artifact or visualization file to extract"),
                )
                .arg(
                    Arg::new("output-path")
                        .long("output-path")
                        .value_name("DIR")
                        .help("Directory to extract into [default: current working directory]"),
                ),
        )
        .subcommand(
            Command::new("validate")
                .about("Check that a result is well formed.")
                .arg(
                    Arg::new("path")
                        .value_name("RESULT")
                        .required(true)
                        .help("Result file or collection directory"),
                )
                .arg(
                    Arg::new("level")
                        .long("level")
                        .value_parser(["min", "max"])
                        .default_value("max")
                        .help("'min' checks the envelope; 'max' also checks the payload"),
                ),
        )
}

fn required<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a String> {
    matches
        .get_one::<String>(id)
        .with_context(|| format!("missing --{}", id))
}

/// Run a tools subcommand and return the exit status.
pub(super) fn run(sub: &str, matches: &ArgMatches, ctx: &Context) -> Result<i32> {
    let v = ctx.verbosity;
    match sub {
        "citations" => return citations(required(matches, "reference")?, v),
        "view" => {
            return view(
                Path::new(required(matches, "path")?),
                required(matches, "index-extension")?,
                &ctx.paths,
                v,
            )
        }
        "extract" => {
            let dest = match matches.get_one::<String>("output-path") {
                Some(dir) => PathBuf::from(dir),
                None => std::env::current_dir().context("cannot read the working directory")?,
            };
            extract(Path::new(required(matches, "input-path")?), &dest, v)?;
        }
        "validate" => {
            let level = required(matches, "level")?
                .parse::<ValidationLevel>()
                .map_err(anyhow::Error::msg)?;
            return Ok(validate(Path::new(required(matches, "path")?), level, v));
        }
        _ => run_cache_or_inspect(sub, matches, v)?,
    }
    Ok(0)
}

fn run_cache_or_inspect(sub: &str, matches: &ArgMatches, v: Verbosity) -> Result<()> {
    match sub {
        "cache-create" => cache_create(Path::new(required(matches, "cache")?), v),
        "cache-store" => cache_store(
            Path::new(required(matches, "cache")?),
            Path::new(required(matches, "artifact-path")?),
            required(matches, "key")?,
            v,
        ),
        "cache-fetch" => cache_fetch(
            Path::new(required(matches, "cache")?),
            required(matches, "key")?,
            Path::new(required(matches, "output-path")?),
            v,
        ),
        "cache-remove" => cache_remove(
            Path::new(required(matches, "cache")?),
            required(matches, "key")?,
            v,
        ),
        "cache-status" => cache_status(Path::new(required(matches, "cache")?), v),
        "peek" => peek(required(matches, "reference")?, v),
        "inspect-metadata" => {
            let refs: Vec<String> = matches
                .get_many::<String>("references")
                .map(|values| values.cloned().collect())
                .unwrap_or_default();
            inspect_metadata(&refs, v)
        }
        other => bail!("unknown tools subcommand '{}'", other),
    }
}

fn open_cache(path: &Path) -> Result<ResultCache> {
    ResultCache::open(path).map_err(anyhow::Error::from)
}

/// Create a cache (or confirm an existing one).
pub fn cache_create(path: &Path, verbosity: Verbosity) -> Result<()> {
    ResultCache::create(path)?;
    output::success(format!("Created cache at {}", path.display()), verbosity);
    Ok(())
}

/// Store the result at `source` under `key`.
pub fn cache_store(cache: &Path, source: &Path, key: &str, verbosity: Verbosity) -> Result<()> {
    let cache = open_cache(cache)?;
    let result = QResult::load(source)
        .with_context(|| format!("cannot load '{}'", source.display()))?;
    cache.save_result(&result, key)?;
    output::success(
        format!(
            "Saved the result at '{}' to the cache under the key '{}'",
            source.display(),
            key
        ),
        verbosity,
    );
    Ok(())
}

/// Write the result stored under `key` to `dest`.
pub fn cache_fetch(cache: &Path, key: &str, dest: &Path, verbosity: Verbosity) -> Result<()> {
    let cache = open_cache(cache)?;
    let result = cache.load(key)?;
    let written = result.save(dest).map_err(|err| match err.no_space_path() {
        Some(path) => anyhow::Error::new(ExecuteError::NoSpace {
            path: path.to_path_buf(),
        }),
        None => err.into(),
    })?;
    output::success(
        format!(
            "Loaded the key '{}' from the cache to '{}'",
            key,
            written.display()
        ),
        verbosity,
    );
    Ok(())
}

/// Remove `key` from the cache.
pub fn cache_remove(cache: &Path, key: &str, verbosity: Verbosity) -> Result<()> {
    let cache = open_cache(cache)?;
    cache.remove(key)?;
    output::success(format!("Removed the key '{}' from the cache", key), verbosity);
    Ok(())
}

/// Print the cache contents.
///
/// The listing and the per-key peeks happen under one lock.
pub fn cache_status(cache: &Path, verbosity: Verbosity) -> Result<()> {
    let handle = open_cache(cache)?;
    if CacheLock::is_contended(handle.path()) {
        output::notice("Waiting for another plug process to release the cache...", verbosity);
    }
    let status = handle.status()?;

    let keys: Vec<String> = status
        .key_types
        .iter()
        .map(|(key, type_name)| format!("{}: {}", key, type_name))
        .collect();
    let pools: Vec<String> = status
        .pools
        .iter()
        .map(|(name, count)| format!("{}: {} recorded", name, count))
        .collect();

    let mut lines = vec![format!("Status of the cache at: {}", cache.display()), String::new()];
    lines.push("Keys:".to_string());
    lines.push(if keys.is_empty() {
        "  (none)".to_string()
    } else {
        format_list(&keys, "  ")
    });
    lines.push("Pools:".to_string());
    lines.push(if pools.is_empty() {
        "  (none)".to_string()
    } else {
        format_list(&pools, "  ")
    });
    lines.push(format!("Data: {}", status.data_count));
    output::print(lines.join("\n"), verbosity);
    Ok(())
}

fn no_space_or(err: crate::resolve::ReferenceError) -> anyhow::Error {
    match err.no_space_path() {
        Some(path) => anyhow::Error::new(ExecuteError::NoSpace {
            path: path.to_path_buf(),
        }),
        None => err.into(),
    }
}

/// Print a summary of one result.
pub fn peek(reference: &str, verbosity: Verbosity) -> Result<()> {
    let input = parse_input(reference, None).map_err(no_space_or)?;
    let result = input.load().map_err(no_space_or)?;
    output::print(PeekInfo::from(&result), verbosity);
    Ok(())
}

/// Print the columns of the merged metadata.
pub fn inspect_metadata(references: &[String], verbosity: Verbosity) -> Result<()> {
    let tables = references
        .iter()
        .map(|r| load_metadata(r, None).map_err(no_space_or))
        .collect::<Result<Vec<_>>>()?;
    let merged = Metadata::merge(tables)?;
    output::print(render_metadata(&merged), verbosity);
    Ok(())
}

/// Print the citations of a result. Exits 1 when it has none.
pub fn citations(reference: &str, verbosity: Verbosity) -> Result<i32> {
    let input = parse_input(reference, None).map_err(no_space_or)?;
    let result = input
        .load()
        .map_err(no_space_or)
        .with_context(|| format!("There was a problem loading {} as a result", reference))?;
    let cited = result.citations();
    if cited.is_empty() {
        eprintln!("No citations found.");
        return Ok(EXIT_FAILURE);
    }
    output::print(bibliography(&cited).trim_end(), verbosity);
    Ok(0)
}

fn load_visualization(path: &Path) -> Result<Artifact> {
    let not_viz = || {
        anyhow::anyhow!(
            "{} is not a visualization. Only visualizations can be viewed.",
            path.display()
        )
    };
    if path.is_dir() {
        return Err(not_viz());
    }
    match Artifact::load(path) {
        Ok(viz) if viz.kind == ResultKind::Visualization => Ok(viz),
        Ok(_) | Err(ResultError::Invalid { .. }) => Err(not_viz()),
        Err(e) => Err(e.into()),
    }
}

/// Open a visualization and keep it available until the user quits.
pub fn view(path: &Path, index_extension: &str, paths: &AppPaths, verbosity: Verbosity) -> Result<i32> {
    let viz = load_visualization(path)?;
    let ext = index_extension.trim_start_matches('.');
    let indexes = viz.index_files();
    let Some(index_name) = indexes.get(ext) else {
        let available: Vec<&str> = indexes.keys().map(String::as_str).collect();
        bail!(
            "No index {} file is present in the visualization. Available index extensions are: {}",
            ext,
            available.join(", ")
        );
    };
    if viewer::is_headless() {
        bail!(
            "Visualization viewing is not supported in headless environments. Use '{} tools \
             extract' to unpack the visualization, then open its index file on a machine with a display.",
            BIN_NAME
        );
    }

    let views = paths.views_dir();
    let pruned = viewer::prune_stale(&views);
    if pruned > 0 {
        output::debug(format!("removed {} stale view(s) from {}", pruned, views.display()), verbosity);
    }
    let staged = StagedView::stage(&views, &viz, index_name)?;
    if let Err(err) = open::that(&staged.index) {
        let index = staged.index.clone();
        let _ = staged.close();
        bail!(
            "Viewing visualization failed while attempting to open {}: {}",
            index.display(),
            err
        );
    }
    output::debug(format!("opened {}", staged.index.display()), verbosity);

    viewer::wait_for_quit(&mut io::stdin().lock(), &mut io::stderr())?;
    let dir = staged.dir.clone();
    staged
        .close()
        .with_context(|| format!("cannot remove {}", dir.display()))?;
    Ok(0)
}

/// Unpack an artifact or visualization under `dest`.
pub fn extract(input: &Path, dest: &Path, verbosity: Verbosity) -> Result<PathBuf> {
    let invalid = || {
        anyhow::anyhow!(
            "{} is not a valid result. Only artifacts and visualizations can be extracted.",
            input.display()
        )
    };
    if input.is_dir() {
        return Err(invalid());
    }
    let result = match Artifact::load(input) {
        Ok(result) => result,
        Err(ResultError::Invalid { .. }) => return Err(invalid()),
        Err(e) => return Err(e.into()),
    };
    let dir = result.extract(dest).map_err(|err| match err.no_space_path() {
        Some(path) => anyhow::Error::new(ExecuteError::NoSpace {
            path: path.to_path_buf(),
        }),
        None => err.into(),
    })?;
    output::success(
        format!("Extracted {} to directory {}", input.display(), dir.display()),
        verbosity,
    );
    Ok(dir)
}

/// Validate a result and report the outcome; returns the exit status.
pub fn validate(path: &Path, level: ValidationLevel, verbosity: Verbosity) -> i32 {
    let result = match QResult::load(path) {
        Ok(result) => result,
        Err(err) => {
            output::report_error(
                &format!("There was a problem loading {} as a result:", path.display()),
                err,
                None,
            );
            return EXIT_FAILURE;
        }
    };
    match result.validate(level) {
        Ok(()) => {
            output::success(
                format!("Result {} appears to be valid at level={}.", path.display(), level),
                verbosity,
            );
            0
        }
        Err(err) => {
            output::report_error(
                &format!(
                    "Result {} does not appear to be valid at level={}:",
                    path.display(),
                    level
                ),
                err,
                None,
            );
            EXIT_FAILURE
        }
    }
}

fn render_metadata(metadata: &Metadata) -> String {
    let width = metadata
        .columns
        .iter()
        .map(|c| c.name.len())
        .chain(std::iter::once("COLUMN NAME".len()))
        .max()
        .unwrap_or_default();
    let mut lines = vec![format!("{:<width$}  TYPE", "COLUMN NAME", width = width)];
    lines.push(format!("{}  {}", "=".repeat(width), "=".repeat(11)));
    for column in &metadata.columns {
        lines.push(format!("{:<width$}  {}", column.name, column.kind, width = width));
    }
    lines.push(format!("{}  {}", "=".repeat(width), "=".repeat(11)));
    lines.push(format!("{:<width$}  {}", "IDS:", metadata.ids.len(), width = width));
    lines.push(format!(
        "{:<width$}  {}",
        "COLUMNS:",
        metadata.columns.len(),
        width = width
    ));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::result::Artifact;
    use crate::core::types::SemanticType;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn store_fetch_remove_roundtrip() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("cache");
        cache_create(&cache, Verbosity::Quiet).unwrap();

        let artifact = Artifact::new(SemanticType::new("IntSequence1"), json!([1, 2, 3]));
        let source = artifact.save(&dir.path().join("ints")).unwrap();
        cache_store(&cache, &source, "ints", Verbosity::Quiet).unwrap();

        let dest = dir.path().join("fetched");
        cache_fetch(&cache, "ints", &dest, Verbosity::Quiet).unwrap();
        let fetched = Artifact::load(&dir.path().join("fetched.art")).unwrap();
        assert_eq!(fetched, artifact);

        cache_remove(&cache, "ints", Verbosity::Quiet).unwrap();
        assert!(cache_fetch(&cache, "ints", &dest, Verbosity::Quiet).is_err());
    }

    #[test]
    fn store_rejects_invalid_key() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("cache");
        cache_create(&cache, Verbosity::Quiet).unwrap();
        let source = Artifact::new(SemanticType::new("SingleInt"), json!(1))
            .save(&dir.path().join("one"))
            .unwrap();
        assert!(cache_store(&cache, &source, "not valid id!", Verbosity::Quiet).is_err());
    }

    #[test]
    fn commands_on_non_cache_fail() {
        let dir = TempDir::new().unwrap();
        assert!(cache_status(dir.path(), Verbosity::Quiet).is_err());
    }

    #[test]
    fn metadata_table_lists_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("md.tsv");
        std::fs::write(&path, "id\tbody_site\tph\ns1\tgut\t6.5\ns2\tskin\t7.0\n").unwrap();
        let metadata = Metadata::load(&path).unwrap();
        let text = render_metadata(&metadata);
        assert!(text.contains("body_site"));
        assert!(text.contains("categorical"));
        assert!(text.contains("numeric"));
        assert!(text.lines().any(|l| l.starts_with("IDS:") && l.ends_with('2')));
    }

    #[test]
    fn peek_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let missing: PathBuf = dir.path().join("nope.art");
        assert!(peek(&missing.to_string_lossy(), Verbosity::Quiet).is_err());
    }
}
