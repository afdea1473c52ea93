//! plugcli - a command line synthesized from an installed plugin deployment
//!
//! Commands are not declared statically. Each installed plugin describes its
//! actions and their typed signatures; plugcli turns those descriptions into
//! a `plug <plugin> <action> --i-... --p-... --o-...` command tree at
//! runtime, converts the tokens back into typed values, runs the action and
//! routes its results to files or to a result cache.
//!
//! # Architecture
//!
//! - [`cli`] - Entry point, builtin commands, exit statuses
//! - [`assemble`] - Builds the root, plugin or action command that is needed
//! - [`translate`] - Signature types to command-line options
//! - [`resolve`] - Command-line tokens to typed values
//! - [`execute`] - Runs an action and routes its outputs
//! - [`deployment`] - Cached plugin descriptions keyed by installed versions
//! - [`framework`] - The plugin framework seam
//! - [`store`] - Keyed result cache with resumption pools
//! - [`core`] - Domain types, formats and configuration
//! - [`ui`] - Output
//!
//! # Invariants
//!
//! 1. The expensive framework introspection runs only when the deployment
//!    fingerprint changes or a refresh is forced
//! 2. Every problem with an invocation is reported before anything runs
//! 3. Cache mutations hold the cache lock

pub mod assemble;
pub mod cli;
pub mod core;
pub mod deployment;
pub mod execute;
pub mod framework;
pub mod resolve;
pub mod store;
pub mod translate;
pub mod ui;
