//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Verbosity-aware printing and error reports
//!
//! # Design
//!
//! All terminal output goes through this module so that quiet and debug
//! modes behave the same in every command.

pub mod output;
