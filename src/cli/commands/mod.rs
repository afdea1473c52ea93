//! cli::commands
//!
//! Builtin commands.
//!
//! # Architecture
//!
//! Each builtin exposes a clap `command()` and a handler taking the parsed
//! matches. Builtins are listed before plugins in root help and never
//! trigger a deployment refresh unless they need plugin records.

mod dev;
mod info;
mod tools;
mod viewer;

pub use dev::refresh_cache;
pub use info::info;
pub use tools::{
    cache_create, cache_fetch, cache_remove, cache_status, cache_store, citations, extract,
    inspect_metadata, peek, validate,
};

use anyhow::Result;
use clap::Command;

use super::{clap_failure, Context};
use crate::assemble::BIN_NAME;

/// Names reserved for builtin commands.
pub const BUILTINS: &[&str] = &["info", "tools", "dev"];

/// Builtin commands, in root help order.
pub fn builtin_commands() -> Vec<Command> {
    vec![info::command(), tools::command(), dev::command()]
}

/// Parse and run builtin `name` with `args`.
pub fn dispatch(name: &str, args: &[String], ctx: &Context) -> Result<i32> {
    let command = match name {
        "info" => info::command(),
        "tools" => tools::command(),
        _ => dev::command(),
    };
    let mut command = command.bin_name(format!("{} {}", BIN_NAME, name)).no_binary_name(true);
    let matches = match command.try_get_matches_from_mut(args) {
        Ok(matches) => matches,
        Err(err) => return Ok(clap_failure(&mut command, err)),
    };

    match name {
        "info" => info::run(ctx)?,
        "tools" => match matches.subcommand() {
            Some((sub, sub_matches)) => return tools::run(sub, sub_matches, ctx),
            None => command.print_help()?,
        },
        _ => match matches.subcommand() {
            Some(("refresh-cache", _)) => dev::run_refresh(ctx)?,
            _ => command.print_help()?,
        },
    }
    Ok(0)
}
