//! core::naming
//!
//! Naming rules shared by the command tree and the result cache.
//!
//! # Features
//!
//! - Convert identifiers to command-line names
//! - Validate cache keys and pool names
//! - Suggest close matches for mistyped names
//! - Derive the default resumption pool name for a pipeline

use sha2::{Digest, Sha256};
use thiserror::Error;

use super::types::Role;

/// Errors from name validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NamingError {
    #[error(
        "Key '{0}' is not a valid identifier. Keys must start with a letter or underscore \
         and contain only letters, digits and underscores."
    )]
    InvalidKey(String),
}

/// Convert an identifier into its command-line form.
///
/// # Example
///
/// ```
/// use plugcli::core::naming::to_cli_name;
///
/// assert_eq!(to_cli_name("dummy_plugin"), "dummy-plugin");
/// assert_eq!(to_cli_name("concatenate_ints"), "concatenate-ints");
/// ```
pub fn to_cli_name(name: &str) -> String {
    name.replace('_', "-")
}

/// Prefix used for an option of the given role.
pub fn role_prefix(role: Role) -> &'static str {
    match role {
        Role::Input => "i",
        Role::Parameter => "p",
        Role::Output => "o",
    }
}

/// Long option name (without leading dashes) for a signature entry.
///
/// ```
/// use plugcli::core::naming::option_name;
/// use plugcli::core::types::Role;
///
/// assert_eq!(option_name(Role::Parameter, "int_1"), "p-int-1");
/// ```
pub fn option_name(role: Role, name: &str) -> String {
    format!("{}-{}", role_prefix(role), to_cli_name(name))
}

/// Whether `key` is a valid identifier.
pub fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Validate a cache key or pool name.
pub fn validate_key(key: &str) -> Result<(), NamingError> {
    if is_identifier(key) {
        Ok(())
    } else {
        Err(NamingError::InvalidKey(key.to_string()))
    }
}

/// Similarity threshold for fuzzy suggestions.
const SIMILARITY_CUTOFF: f64 = 0.8;

/// Maximum suggestions shown before truncating.
const MAX_SUGGESTIONS: usize = 5;

/// Find candidates close to `name`.
///
/// Prefix matches win outright. Otherwise candidates with a normalized
/// Levenshtein similarity of at least 0.8 are returned, best first. Long
/// result lists are cut to four entries followed by `"..."`.
///
/// # Example
///
/// ```
/// use plugcli::core::naming::close_matches;
///
/// let names = ["dummy-plugin", "other-plugin"];
/// assert_eq!(close_matches("dummy", names.iter().copied()), vec!["dummy-plugin"]);
/// assert_eq!(close_matches("dumy-plugin", names.iter().copied()), vec!["dummy-plugin"]);
/// assert!(close_matches("zzz", names.iter().copied()).is_empty());
/// ```
pub fn close_matches<'a, I>(name: &str, candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let candidates: Vec<&str> = candidates.into_iter().collect();

    let mut matches: Vec<String> = candidates
        .iter()
        .filter(|c| c.starts_with(name))
        .map(|c| c.to_string())
        .collect();

    if matches.is_empty() {
        let mut scored: Vec<(f64, &str)> = candidates
            .iter()
            .map(|c| (strsim::normalized_levenshtein(name, c), *c))
            .filter(|(score, _)| *score >= SIMILARITY_CUTOFF)
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        matches = scored.into_iter().map(|(_, c)| c.to_string()).collect();
    } else {
        matches.sort();
    }

    if matches.len() > MAX_SUGGESTIONS {
        matches.truncate(MAX_SUGGESTIONS - 1);
        matches.push("...".to_string());
    }
    matches
}

/// Default resumption pool for a pipeline.
///
/// Stable per action, so a failed run can be resumed by simply rerunning.
///
/// ```
/// use plugcli::core::naming::default_pool_name;
///
/// let name = default_pool_name("dummy_plugin", "resumable_pipeline");
/// assert!(name.starts_with("recycle_dummy_plugin_resumable_pipeline_"));
/// assert_eq!(name, default_pool_name("dummy_plugin", "resumable_pipeline"));
/// ```
pub fn default_pool_name(plugin_id: &str, action_id: &str) -> String {
    let digest = Sha256::digest(format!("{}.{}", plugin_id, action_id).as_bytes());
    let hex = hex::encode(digest);
    format!("recycle_{}_{}_{}", plugin_id, action_id, &hex[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert!(is_identifier("foo"));
        assert!(is_identifier("_foo1"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("1foo"));
        assert!(!is_identifier("foo-bar"));
        assert!(!is_identifier("has space"));
    }

    #[test]
    fn validate_key_message_names_key() {
        let err = validate_key("not-valid").unwrap_err();
        assert!(err.to_string().contains("'not-valid'"));
        assert!(err.to_string().contains("identifier"));
    }

    #[test]
    fn close_matches_prefers_prefix() {
        let names = ["info", "tools", "dummy-plugin"];
        assert_eq!(close_matches("to", names.iter().copied()), vec!["tools"]);
    }

    #[test]
    fn close_matches_truncates_long_lists() {
        let names = ["ab1", "ab2", "ab3", "ab4", "ab5", "ab6"];
        let found = close_matches("ab", names.iter().copied());
        assert_eq!(found.len(), 5);
        assert_eq!(found.last().map(String::as_str), Some("..."));
    }

    #[test]
    fn pool_name_is_identifier() {
        assert!(is_identifier(&default_pool_name("a_b", "c_d")));
    }
}
