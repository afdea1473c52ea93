//! core
//!
//! Core domain types, formats and configuration for plugcli.
//!
//! # Modules
//!
//! - [`types`] - Type expressions, signatures, plugin and action records
//! - [`citation`] - BibTeX entries declared by plugins and actions
//! - [`naming`] - Command-line names, cache key rules, close matches
//! - [`paths`] - Centralized path routing for plugcli storage
//! - [`config`] - Global and per-command configuration
//! - [`atomic`] - Whole-file atomic writes
//! - [`result`] - Artifacts, visualizations and collections on disk
//! - [`metadata`] - Metadata tables and columns
//!
//! # Design Principles
//!
//! - Signatures are validated once, when they enter the deployment cache
//! - Formats are strict and self-describing
//! - Files are replaced whole, never edited in place

pub mod atomic;
pub mod citation;
pub mod config;
pub mod metadata;
pub mod naming;
pub mod paths;
pub mod result;
pub mod types;
