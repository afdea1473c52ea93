//! cli
//!
//! Command-line entry point for plugcli.
//!
//! # Responsibilities
//!
//! - Route builtin commands (`info`, `tools`, `dev`) without touching the
//!   plugin deployment
//! - Load the deployment cache and select the plugin or action command
//! - Map every failure to an exit status
//!
//! # Exit Status
//!
//! - `0` success, or help was shown
//! - `1` usage, resolution or execution error
//! - `2` unknown command, plugin or action name

pub mod commands;

use std::ffi::OsString;

use anyhow::{Context as _, Result};
use clap::error::ErrorKind;
use clap::Command;

use crate::assemble::{
    citations_report, plugin_command, root_command, select, ActionCommand, ActionError,
    CommandSpec, BIN_NAME,
};
use crate::core::citation::Citation;
use crate::core::config::Config;
use crate::core::paths::AppPaths;
use crate::deployment::DeploymentCache;
use crate::execute::ExecuteError;
use crate::framework;
use crate::ui::output::{self, Verbosity};

/// Exit status for usage, resolution and execution errors.
pub const EXIT_FAILURE: i32 = 1;
/// Exit status for an unrecognized command name.
pub const EXIT_UNKNOWN_COMMAND: i32 = 2;

/// Shared state for one process.
#[derive(Debug, Clone)]
pub struct Context {
    pub paths: AppPaths,
    pub config: Config,
    pub verbosity: Verbosity,
}

impl Context {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            paths: AppPaths::from_env(),
            config: Config::load().context("failed to load configuration")?,
            verbosity: Verbosity::from_env(),
        })
    }

    /// Deployment cache handle for this process.
    pub fn deployment(&self) -> DeploymentCache {
        DeploymentCache::new(self.paths.clone()).with_verbosity(self.verbosity)
    }
}

/// Run the CLI application and return the exit status.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> i32 {
    run_from(std::env::args_os().skip(1))
}

/// Run with explicit arguments (without the binary name).
pub fn run_from<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args: Vec<String> = args
        .into_iter()
        .map(|a| a.into().to_string_lossy().into_owned())
        .collect();
    match dispatch(&args) {
        Ok(code) => code,
        Err(err) => {
            output::error(format!("{:#}", err));
            EXIT_FAILURE
        }
    }
}

fn dispatch(args: &[String]) -> Result<i32> {
    let ctx = Context::from_env()?;

    if let Some(first) = args.first() {
        if commands::BUILTINS.contains(&first.as_str()) {
            return commands::dispatch(first, &args[1..], &ctx);
        }
    }

    let framework = framework::detect();
    let deployment = ctx.deployment();
    let plugins = deployment
        .get_plugins(framework.as_ref())
        .context("failed to load the plugin deployment")?;

    let selection = match select(plugins, commands::BUILTINS, args) {
        Ok(selection) => selection,
        Err(unknown) => {
            eprintln!("Error: {}", unknown);
            eprintln!("Run '{} --help' to list the available commands.", BIN_NAME);
            return Ok(EXIT_UNKNOWN_COMMAND);
        }
    };

    match selection.spec {
        CommandSpec::Root => {
            let mut root = root_command(commands::builtin_commands(), plugins);
            if selection.rest.is_empty() {
                root.print_help()?;
                return Ok(0);
            }
            let argv = std::iter::once(BIN_NAME.to_string()).chain(selection.rest.iter().cloned());
            match root.try_get_matches_from_mut(argv) {
                Ok(_) => {
                    root.print_help()?;
                    Ok(0)
                }
                Err(err) => Ok(clap_failure(&mut root, err)),
            }
        }
        CommandSpec::Builtin(name) => commands::dispatch(name, selection.rest, &ctx),
        CommandSpec::Plugin { name, plugin } => {
            let mut command = plugin_command(name, plugin);
            if selection.rest.is_empty() {
                command.print_long_help()?;
                return Ok(0);
            }
            match command.try_get_matches_from_mut(selection.rest) {
                Ok(matches) if matches.get_flag("citations") => {
                    Ok(show_citations(&plugin.citations, ctx.verbosity))
                }
                Ok(_) => {
                    command.print_long_help()?;
                    Ok(0)
                }
                Err(err) => Ok(clap_failure(&mut command, err)),
            }
        }
        CommandSpec::Action {
            plugin_name,
            plugin,
            action,
        } => {
            let command = ActionCommand::new(plugin_name, plugin, action)
                .with_context(|| format!("cannot build command for {} {}", plugin_name, action.id))?;
            if selection.rest.is_empty() {
                command.command().print_long_help()?;
                return Ok(0);
            }
            let invocation = match command.parse(selection.rest) {
                Ok(invocation) => invocation,
                Err(err) => return Ok(clap_failure(&mut command.command(), err)),
            };
            if invocation.citations {
                return Ok(show_citations(&action.citations, ctx.verbosity));
            }
            match command.run(framework.as_ref(), &ctx.config, &invocation) {
                Ok(_) => Ok(0),
                Err(err) => {
                    report_action_error(&mut command.command(), err);
                    Ok(EXIT_FAILURE)
                }
            }
        }
    }
}

/// Print a `--citations` report; exits 1 when there is nothing to cite.
pub fn show_citations(citations: &[Citation], verbosity: Verbosity) -> i32 {
    match citations_report(citations) {
        Some(report) => {
            output::print(report.trim_end(), verbosity);
            0
        }
        None => {
            eprintln!("No citations found.");
            EXIT_FAILURE
        }
    }
}

/// Print a clap parse outcome and return the exit status.
///
/// Help and version requests exit 0; anything else is a usage error.
pub fn clap_failure(command: &mut Command, err: clap::Error) -> i32 {
    match err.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            let _ = err.print();
            0
        }
        _ => {
            eprintln!("{}", crate::assemble::usage_report(command, &err));
            EXIT_FAILURE
        }
    }
}

fn report_action_error(command: &mut Command, err: ActionError) {
    match err {
        ActionError::Resolution(failure) => match failure.no_space_path() {
            Some(path) => report_execute(&ExecuteError::NoSpace {
                path: path.to_path_buf(),
            }),
            None => eprintln!("{}\n\n{}", command.render_usage(), failure),
        },
        ActionError::Execute(err) => report_execute(&err),
        ActionError::Config(err) => output::error(err),
    }
}

fn report_execute(err: &ExecuteError) {
    output::report_error(&err.header(), err, err.footer().as_deref());
}
