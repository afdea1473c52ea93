//! dev command - Developer utilities for plugin authors

use anyhow::{Context as _, Result};
use clap::Command;

use crate::cli::Context;
use crate::framework::{self, Framework};
use crate::ui::output;

pub(super) fn command() -> Command {
    Command::new("dev")
        .about("Utilities for developers and advanced users.")
        .disable_help_subcommand(true)
        .subcommand(
            Command::new("refresh-cache")
                .about("Refresh the deployment cache, picking up newly installed or changed plugins."),
        )
}

pub(super) fn run_refresh(ctx: &Context) -> Result<()> {
    let framework = framework::detect();
    refresh_cache(ctx, framework.as_ref())
}

/// Force a deployment refresh.
pub fn refresh_cache(ctx: &Context, framework: &dyn Framework) -> Result<()> {
    let state = ctx
        .deployment()
        .with_forced(true)
        .refresh(framework)
        .context("failed to refresh the deployment cache")?;
    output::success(
        format!(
            "Refreshed the deployment cache ({} plugin{}).",
            state.plugins.len(),
            if state.plugins.len() == 1 { "" } else { "s" }
        ),
        ctx.verbosity,
    );
    Ok(())
}
