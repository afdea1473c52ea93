//! assemble
//!
//! Builds the part of the command tree an invocation needs.
//!
//! # State Machine
//!
//! ```text
//! Root --name--> Plugin --name--> Action
//! ```
//!
//! Names are looked up in the cached deployment state. Only the selected
//! level is turned into a full clap command; help at the root and plugin
//! levels lists children from cached summaries. An unknown name produces an
//! [`UnknownName`] with close-match suggestions.
//!
//! # Action Commands
//!
//! An action command carries one option group per signature entry plus the
//! cross-cutting options (`--output-dir`, `--verbose`/`--quiet`,
//! `--cmd-config`, `--use-cache`, `--citations`). Pipelines also get
//! `--parallel`/`--parallel-config` and `--recycle`/`--no-recycle`. Running
//! it wires the resolver to the execution adapter.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, Command};
use thiserror::Error;

use crate::core::citation::{bibliography, Citation};
use crate::core::config::{CommandConfig, Config, ConfigError};
use crate::core::naming::{close_matches, to_cli_name};
use crate::core::types::{ActionKind, ActionRecord, PluginRecord, SignatureError};
use crate::execute::{self, ExecOptions, ExecuteError, Recycle, Saved};
use crate::framework::{Framework, ParallelConfig};
use crate::resolve::reference::validate_output_dir;
use crate::resolve::{
    ConfigFallback, FallbackChain, OutputDirFallback, RawArgs, ReferenceError, ResolutionFailure,
    ResolveError, Resolver,
};
use crate::store::ResultCache;
use crate::translate::{describe_signature, OptionGroup, MISC_HEADING};
use crate::ui::output::{self, Verbosity};

/// Name of the binary.
pub const BIN_NAME: &str = "plug";

/// Which level of the tree an invocation targets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommandSpec<'a> {
    Root,
    Builtin(&'a str),
    Plugin {
        name: &'a str,
        plugin: &'a PluginRecord,
    },
    Action {
        plugin_name: &'a str,
        plugin: &'a PluginRecord,
        action: &'a ActionRecord,
    },
}

/// A selected command and the arguments left for it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection<'a> {
    pub spec: CommandSpec<'a>,
    pub rest: &'a [String],
}

/// A command or action name that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct UnknownName {
    pub name: String,
    /// Plugin searched, for action names.
    pub plugin: Option<String>,
    pub suggestions: Vec<String>,
}

impl fmt::Display for UnknownName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.plugin {
            Some(plugin) => write!(f, "No such action \"{}\" in plugin \"{}\".", self.name, plugin)?,
            None => write!(f, "No such command \"{}\".", self.name)?,
        }
        match self.suggestions.as_slice() {
            [] => Ok(()),
            [only] => write!(f, " Did you mean \"{}\"?", only),
            many => {
                write!(f, " Did you mean one of:")?;
                for suggestion in many {
                    write!(f, "\n  {}", suggestion)?;
                }
                Ok(())
            }
        }
    }
}

/// Select the command `args` refers to.
pub fn select<'a>(
    plugins: &'a BTreeMap<String, PluginRecord>,
    builtins: &[&'a str],
    args: &'a [String],
) -> Result<Selection<'a>, UnknownName> {
    let Some(first) = args.first().filter(|a| !a.starts_with('-')) else {
        return Ok(Selection {
            spec: CommandSpec::Root,
            rest: args,
        });
    };
    if let Some(builtin) = builtins.iter().copied().find(|b| *b == first.as_str()) {
        return Ok(Selection {
            spec: CommandSpec::Builtin(builtin),
            rest: &args[1..],
        });
    }

    let Some((name, plugin)) = plugins.get_key_value(first.as_str()) else {
        let candidates = builtins.iter().copied().chain(plugins.keys().map(String::as_str));
        return Err(UnknownName {
            name: first.clone(),
            plugin: None,
            suggestions: close_matches(first, candidates),
        });
    };

    let Some(second) = args.get(1).filter(|a| !a.starts_with('-')) else {
        return Ok(Selection {
            spec: CommandSpec::Plugin { name, plugin },
            rest: &args[1..],
        });
    };
    match plugin.actions.values().find(|a| to_cli_name(&a.id) == *second) {
        Some(action) => Ok(Selection {
            spec: CommandSpec::Action {
                plugin_name: name,
                plugin,
                action,
            },
            rest: &args[2..],
        }),
        None => {
            let names: Vec<String> = plugin.actions.values().map(|a| to_cli_name(&a.id)).collect();
            Err(UnknownName {
                name: second.clone(),
                plugin: Some(name.clone()),
                suggestions: close_matches(second, names.iter().map(String::as_str)),
            })
        }
    }
}

/// Root command listing builtins first, then plugins.
pub fn root_command(builtins: Vec<Command>, plugins: &BTreeMap<String, PluginRecord>) -> Command {
    let mut command = Command::new(BIN_NAME)
        .version(env!("CARGO_PKG_VERSION"))
        .about("Command line interface to the installed plugins.")
        .disable_help_subcommand(true)
        .subcommand_help_heading("Commands");
    for builtin in builtins {
        command = command.subcommand(builtin);
    }
    for (name, plugin) in plugins {
        command = command.subcommand(Command::new(name.clone()).about(plugin.short_description.clone()));
    }
    command
}

fn plugin_about(plugin: &PluginRecord) -> String {
    let mut about = plugin.description.clone();
    if !plugin.website.is_empty() {
        about.push_str(&format!("\n\nPlugin website: {}", plugin.website));
    }
    if !plugin.user_support_text.is_empty() {
        about.push_str(&format!("\n\nGetting user support: {}", plugin.user_support_text));
    }
    if !plugin.citations.is_empty() {
        let cited: Vec<String> = plugin.citations.iter().map(Citation::summary).collect();
        about.push_str(&format!("\n\nCiting this plugin: {}", cited.join(" ")));
    }
    about
}

fn citations_arg() -> Arg {
    Arg::new("citations")
        .long("citations")
        .action(ArgAction::SetTrue)
        .help("Show citations and exit.")
}

/// What `--citations` prints, or `None` when there is nothing to cite.
pub fn citations_report(citations: &[Citation]) -> Option<String> {
    if citations.is_empty() {
        return None;
    }
    Some(format!(
        "% use `{} tools citations` on a result for the complete list\n\n{}",
        BIN_NAME,
        bibliography(citations)
    ))
}

fn summary(action: &ActionRecord) -> String {
    let first = action.description.lines().next().unwrap_or_default();
    if action.deprecated {
        format!("[deprecated] {}", first)
    } else {
        first.to_string()
    }
}

/// Plugin command listing its actions from the cached records.
pub fn plugin_command(name: &str, plugin: &PluginRecord) -> Command {
    let mut actions: Vec<(String, &ActionRecord)> = plugin
        .actions
        .values()
        .map(|a| (to_cli_name(&a.id), a))
        .collect();
    actions.sort_by(|a, b| a.0.cmp(&b.0));

    let mut command = Command::new(name.to_string())
        .bin_name(format!("{} {}", BIN_NAME, name))
        .no_binary_name(true)
        .version(plugin.version.clone())
        .about(plugin_about(plugin))
        .disable_help_subcommand(true)
        .subcommand_help_heading("Actions")
        .arg(citations_arg());
    for (cli, action) in actions {
        command = command.subcommand(Command::new(cli).about(summary(action)));
    }
    command
}

/// Parallel execution requested for a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ParallelMode {
    #[default]
    Off,
    /// `--parallel`: the configured default, else local threads.
    Default,
    /// `--parallel-config FILE`
    File(PathBuf),
}

/// Cross-cutting options of one action invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invocation {
    pub raw: RawArgs,
    pub output_dir: Option<String>,
    /// `Some(true)` for `--verbose`, `Some(false)` for `--quiet`.
    pub verbose: Option<bool>,
    pub cmd_config: Option<PathBuf>,
    pub use_cache: Option<PathBuf>,
    pub parallel: ParallelMode,
    /// `None` when neither `--recycle` nor `--no-recycle` was given.
    pub recycle: Option<Recycle>,
    /// `--citations`: print the action's citations instead of running it.
    pub citations: bool,
}

/// Errors from running an action command.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Resolution(#[from] ResolutionFailure),

    #[error(transparent)]
    Execute(#[from] ExecuteError),
}

/// An action bound to its option groups.
#[derive(Debug, Clone)]
pub struct ActionCommand<'a> {
    pub plugin_name: &'a str,
    pub plugin: &'a PluginRecord,
    pub action: &'a ActionRecord,
    pub groups: Vec<OptionGroup>,
}

impl<'a> ActionCommand<'a> {
    pub fn new(
        plugin_name: &'a str,
        plugin: &'a PluginRecord,
        action: &'a ActionRecord,
    ) -> Result<Self, SignatureError> {
        Ok(Self {
            plugin_name,
            plugin,
            action,
            groups: describe_signature(&action.signature)?,
        })
    }

    pub fn cli_name(&self) -> String {
        to_cli_name(&self.action.id)
    }

    fn is_pipeline(&self) -> bool {
        self.action.kind == ActionKind::Pipeline
    }

    /// The clap command for this action.
    pub fn command(&self) -> Command {
        let cli = self.cli_name();
        let mut about = self.action.description.clone();
        if self.action.deprecated {
            about.push_str("\n\nWARNING: This action is deprecated and will be removed in a future version.");
        }

        let mut command = Command::new(cli.clone())
            .bin_name(format!("{} {} {}", BIN_NAME, self.plugin_name, cli))
            .no_binary_name(true)
            .disable_version_flag(true)
            .about(self.action.name.clone())
            .long_about(about);
        if let Some(examples) = render_examples(self.action) {
            command = command.after_long_help(examples);
        }
        for group in &self.groups {
            command = command.args(group.to_args());
        }
        command.args(self.misc_args())
    }

    fn misc_args(&self) -> Vec<Arg> {
        let mut args = vec![
            Arg::new("output-dir")
                .long("output-dir")
                .value_name("PATH")
                .action(ArgAction::Set)
                .help("Output unspecified results to a directory"),
            Arg::new("verbose")
                .long("verbose")
                .action(ArgAction::SetTrue)
                .conflicts_with("quiet")
                .help("Display verbose output to stdout and/or stderr during execution of this action. Or silence output if execution is successful (silence is golden)."),
            Arg::new("quiet")
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Silence output if execution is successful"),
            Arg::new("cmd-config")
                .long("cmd-config")
                .value_name("FILE")
                .action(ArgAction::Set)
                .help("Use config file for command options"),
            Arg::new("use-cache")
                .long("use-cache")
                .value_name("CACHE")
                .action(ArgAction::Set)
                .help("Look up bare keys in this cache and keep resumption pools there"),
            citations_arg(),
        ];
        if self.is_pipeline() {
            args.extend([
                Arg::new("parallel")
                    .long("parallel")
                    .action(ArgAction::SetTrue)
                    .conflicts_with("parallel-config")
                    .help("Execute your action in parallel with the default parallel configuration"),
                Arg::new("parallel-config")
                    .long("parallel-config")
                    .value_name("FILE")
                    .action(ArgAction::Set)
                    .help("Execute your action in parallel using a config at the indicated path"),
                Arg::new("recycle")
                    .long("recycle")
                    .value_name("NAME")
                    .action(ArgAction::Set)
                    .conflicts_with("no-recycle")
                    .help("Recycle results from this named pool, and keep the pool afterwards"),
                Arg::new("no-recycle")
                    .long("no-recycle")
                    .action(ArgAction::SetTrue)
                    .help("Do not recycle results from a previous failed pipeline run or save the results from this run for future recycling"),
            ]);
        }
        args.into_iter().map(|a| a.help_heading(MISC_HEADING)).collect()
    }

    /// Parse `args` (everything after the action name).
    pub fn parse(&self, args: &[String]) -> Result<Invocation, clap::Error> {
        let matches = self.command().try_get_matches_from(args)?;
        Ok(self.invocation(&matches))
    }

    fn invocation(&self, matches: &ArgMatches) -> Invocation {
        let mut raw = RawArgs::default();
        for group in &self.groups {
            group.collect(matches, &mut raw);
        }

        let verbose = if matches.get_flag("verbose") {
            Some(true)
        } else if matches.get_flag("quiet") {
            Some(false)
        } else {
            None
        };

        let (parallel, recycle) = if self.is_pipeline() {
            let parallel = if matches.get_flag("parallel") {
                ParallelMode::Default
            } else if let Some(path) = matches.get_one::<String>("parallel-config") {
                ParallelMode::File(PathBuf::from(path))
            } else {
                ParallelMode::Off
            };
            let recycle = if matches.get_flag("no-recycle") {
                Some(Recycle::Disabled)
            } else {
                matches
                    .get_one::<String>("recycle")
                    .map(|name| Recycle::Named(name.clone()))
            };
            (parallel, recycle)
        } else {
            (ParallelMode::Off, None)
        };

        Invocation {
            raw,
            output_dir: matches.get_one::<String>("output-dir").cloned(),
            verbose,
            cmd_config: matches.get_one::<String>("cmd-config").map(PathBuf::from),
            use_cache: matches.get_one::<String>("use-cache").map(PathBuf::from),
            parallel,
            recycle,
            citations: matches.get_flag("citations"),
        }
    }

    /// Resolve the invocation and run the action.
    pub fn run(
        &self,
        framework: &dyn Framework,
        config: &Config,
        invocation: &Invocation,
    ) -> Result<Vec<Saved>, ActionError> {
        let verbose = invocation.verbose.unwrap_or_else(|| config.verbose());
        let verbosity = Verbosity::from_flags(
            invocation.verbose == Some(false),
            verbose || Verbosity::from_env() == Verbosity::Debug,
        );

        let mut problems = Vec::new();
        let mut chain = FallbackChain::new();
        if let Some(path) = &invocation.cmd_config {
            let cmd_config = CommandConfig::load(path)?;
            let names = [
                format!("{}.{}", self.plugin_name, self.cli_name()),
                format!("{}.{}", self.plugin.id, self.action.id),
            ];
            match cmd_config.section(&names)? {
                Some(section) => chain.push(ConfigFallback::new(section)),
                None => output::warn(
                    format!(
                        "no [\"{}\"] section in {}",
                        names[0],
                        cmd_config.path().display()
                    ),
                    verbosity,
                ),
            }
        }
        if let Some(dir) = &invocation.output_dir {
            match validate_output_dir(dir) {
                Ok(dir) => chain.push(OutputDirFallback::new(dir)),
                Err(source) => problems.push(ResolveError::Reference {
                    option: "--output-dir".to_string(),
                    source,
                }),
            }
        }
        let use_cache = match &invocation.use_cache {
            Some(path) => match ResultCache::open(path) {
                Ok(cache) => Some(cache),
                Err(source) => {
                    problems.push(ResolveError::Reference {
                        option: "--use-cache".to_string(),
                        source: ReferenceError::Store(source),
                    });
                    None
                }
            },
            None => None,
        };

        let resolver = Resolver::new(&chain, use_cache.as_ref());
        let resolved = resolver.resolve_all(&self.groups, &self.action.signature, &invocation.raw);
        let args = match resolved {
            Ok(args) if problems.is_empty() => args,
            Ok(_) => {
                return Err(ResolutionFailure {
                    problems,
                    missing_outputs: false,
                }
                .into())
            }
            Err(mut failure) => {
                problems.append(&mut failure.problems);
                failure.problems = problems;
                return Err(failure.into());
            }
        };

        let recycle = invocation.recycle.clone().unwrap_or(if config.recycle() {
            Recycle::Default
        } else {
            Recycle::Disabled
        });
        let parallel = match &invocation.parallel {
            ParallelMode::Off => None,
            ParallelMode::Default => Some(match config.parallel_config() {
                Some(path) => ParallelConfig::load(path)?,
                None => ParallelConfig::local(),
            }),
            ParallelMode::File(path) => Some(ParallelConfig::load(path)?),
        };
        let options = ExecOptions {
            verbose,
            verbosity,
            recycle,
            pool_cache: invocation
                .use_cache
                .clone()
                .unwrap_or_else(|| config.cache_path()),
            parallel,
        };

        if self.action.deprecated {
            output::warn(
                format!(
                    "{} {} is deprecated and will be removed in a future version.",
                    self.plugin_name,
                    self.cli_name()
                ),
                verbosity,
            );
        }
        output::debug(format!("resolved arguments: {}", args.to_json()), verbosity);

        let saved = execute::execute(framework, self.plugin, self.action, &args, &options)?;
        for item in &saved {
            output::success(
                format!("Saved {} to: {}", item.type_name, item.destination),
                verbosity,
            );
        }
        Ok(saved)
    }
}

fn render_examples(action: &ActionRecord) -> Option<String> {
    if action.examples.is_empty() {
        return None;
    }
    let mut text = String::from("Examples:");
    for example in &action.examples {
        text.push_str(&format!("\n  # {}", example.name));
        for line in &example.lines {
            text.push_str(&format!("\n  {}", line));
        }
        text.push('\n');
    }
    Some(text.trim_end().to_string())
}

/// Re-render a clap parse error in the resolver's report format.
///
/// Help and version requests are not errors and are returned unchanged.
pub fn usage_report(command: &mut Command, err: &clap::Error) -> String {
    let rendered = err.to_string();
    let message = rendered
        .lines()
        .next()
        .unwrap_or_default()
        .trim_start_matches("error: ");
    format!(
        "{}\n\nThere was a problem with the command:\n (1/1) {}",
        command.render_usage(),
        message
    )
}
