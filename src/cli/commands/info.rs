//! info command - Show the tool version, installed plugins and locations

use anyhow::{Context as _, Result};
use clap::Command;

use crate::cli::Context;
use crate::framework::{self, Framework};
use crate::ui::output;

pub(super) fn command() -> Command {
    Command::new("info").about("Display information about the current deployment.")
}

pub(super) fn run(ctx: &Context) -> Result<()> {
    let framework = framework::detect();
    info(ctx, framework.as_ref())
}

/// Print system versions, installed plugins and configuration locations.
pub fn info(ctx: &Context, framework: &dyn Framework) -> Result<()> {
    let deployment = ctx.deployment();
    let plugins = deployment
        .get_plugins(framework)
        .context("failed to load the plugin deployment")?;

    let mut lines = vec![
        "System versions".to_string(),
        format!("{}: {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        String::new(),
        "Installed plugins".to_string(),
    ];
    if plugins.is_empty() {
        lines.push("(none)".to_string());
    }
    for (name, plugin) in plugins {
        lines.push(format!("{}: {}", name, plugin.version));
    }
    lines.push(String::new());
    lines.push("Locations".to_string());
    lines.push(format!("Application home: {}", ctx.paths.home().display()));
    lines.push(format!(
        "Config file: {}",
        ctx.config
            .loaded_from()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(defaults)".to_string())
    ));
    lines.push(format!("Result cache: {}", ctx.config.cache_path().display()));

    output::print(lines.join("\n"), ctx.verbosity);
    Ok(())
}
