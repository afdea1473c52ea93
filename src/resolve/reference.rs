//! resolve::reference
//!
//! Input, output and metadata references.
//!
//! # Input grammar
//!
//! An artifact-typed value is tried, in order, as:
//!
//! 1. an existing file or collection directory
//! 2. `<cache>:<key>`, split on the last colon, when the prefix is a cache
//! 3. `<label>:<rest>` where `rest` is resolved by 1, 2 or 4 (collection
//!    members only)
//! 4. a bare key, looked up in the `--use-cache` cache (no colon only)
//!
//! Paths that legitimately contain colons are ambiguous. The order above
//! always prefers the filesystem.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::value::OutputDest;
use crate::core::metadata::{Metadata, MetadataError};
use crate::core::naming::{is_identifier, validate_key, NamingError};
use crate::core::result::{
    Artifact, QResult, ResultError, ARTIFACT_EXT, VISUALIZATION_EXT,
};
use crate::core::types::TypeExpr;
use crate::store::{ResultCache, StoreError};

/// Problems with a reference.
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("'{0}' is not an existing file or a <cache>:<key> reference")]
    NotFound(String),

    #[error("'{reference}' is a visualization, but an artifact is required.{hint}")]
    Visualization { reference: String, hint: String },

    #[error("'{0}' is a collection, but a single artifact is required")]
    UnexpectedCollection(String),

    #[error("Expected an artifact of at least type {expected}. An artifact of type {actual} was provided ('{reference}').")]
    TypeMismatch {
        reference: String,
        expected: String,
        actual: String,
    },

    #[error("'{0}' is an existing directory; outputs need a file path")]
    ExistingDirectory(PathBuf),

    #[error("Cache keys cannot be used as output dirs.")]
    CacheOutputDir,

    #[error("Output directory '{0}' already exists")]
    OutputDirExists(PathBuf),

    #[error("Cannot write to '{0}'")]
    NotWritable(PathBuf),

    #[error(transparent)]
    InvalidKey(#[from] NamingError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Result(#[from] ResultError),
}

impl ReferenceError {
    /// Location that ran out of space, if that is what failed.
    pub fn no_space_path(&self) -> Option<&Path> {
        match self {
            ReferenceError::Store(e) => e.no_space_path(),
            ReferenceError::Result(e) => e.no_space_path(),
            _ => None,
        }
    }
}

/// Where an input comes from.
#[derive(Debug, Clone)]
pub enum InputRef {
    File(PathBuf),
    Cache { cache: ResultCache, key: String },
}

impl InputRef {
    pub fn load(&self) -> Result<QResult, ReferenceError> {
        match self {
            InputRef::File(path) => Ok(QResult::load(path)?),
            InputRef::Cache { cache, key } => Ok(cache.load(key)?),
        }
    }
}

impl fmt::Display for InputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputRef::File(path) => write!(f, "{}", path.display()),
            InputRef::Cache { cache, key } => write!(f, "{}:{}", cache.path().display(), key),
        }
    }
}

/// Split `<cache>:<key>` when the prefix is an existing cache.
pub fn split_cache_ref(token: &str) -> Option<(ResultCache, String)> {
    let (prefix, key) = token.rsplit_once(':')?;
    if prefix.is_empty() || key.is_empty() {
        return None;
    }
    ResultCache::open(Path::new(prefix))
        .ok()
        .map(|cache| (cache, key.to_string()))
}

fn unlabeled(token: &str, use_cache: Option<&ResultCache>) -> Option<InputRef> {
    let path = Path::new(token);
    if path.exists() {
        return Some(InputRef::File(path.to_path_buf()));
    }
    if let Some((cache, key)) = split_cache_ref(token) {
        return Some(InputRef::Cache { cache, key });
    }
    match use_cache {
        Some(cache) if !token.contains(':') && !token.is_empty() => Some(InputRef::Cache {
            cache: cache.clone(),
            key: token.to_string(),
        }),
        _ => None,
    }
}

/// Parse a single input reference.
pub fn parse_input(token: &str, use_cache: Option<&ResultCache>) -> Result<InputRef, ReferenceError> {
    unlabeled(token, use_cache).ok_or_else(|| ReferenceError::NotFound(token.to_string()))
}

/// Parse a collection member reference, which may carry a `label:` prefix.
pub fn parse_member(
    token: &str,
    use_cache: Option<&ResultCache>,
) -> Result<(Option<String>, InputRef), ReferenceError> {
    if let Some(input) = unlabeled(token, use_cache) {
        return Ok((None, input));
    }
    if let Some((label, rest)) = token.split_once(':') {
        if is_identifier(label) {
            if let Some(input) = unlabeled(rest, use_cache) {
                return Ok((Some(label.to_string()), input));
            }
        }
    }
    Err(ReferenceError::NotFound(token.to_string()))
}

/// Check a loaded result against an artifact type.
pub fn expect_artifact(
    result: QResult,
    expected: &TypeExpr,
    reference: &str,
) -> Result<Artifact, ReferenceError> {
    match result {
        QResult::Artifact(artifact) => {
            let ok = artifact
                .semantic_type
                .as_ref()
                .is_some_and(|t| expected.accepts_semantic(t));
            if ok {
                Ok(artifact)
            } else {
                Err(ReferenceError::TypeMismatch {
                    reference: reference.to_string(),
                    expected: expected.to_string(),
                    actual: artifact.type_name(),
                })
            }
        }
        QResult::Visualization(_) => Err(ReferenceError::Visualization {
            reference: reference.to_string(),
            hint: artifact_hint(reference),
        }),
        QResult::Collection(_) => Err(ReferenceError::UnexpectedCollection(reference.to_string())),
    }
}

fn artifact_hint(reference: &str) -> String {
    let path = Path::new(reference);
    if path.extension().is_some_and(|e| e == VISUALIZATION_EXT) {
        let sibling = path.with_extension(ARTIFACT_EXT);
        if sibling.is_file() {
            return format!(" Did you mean '{}'?", sibling.display());
        }
    }
    String::new()
}

/// Parse an output destination.
///
/// A `<cache>:<key>` destination must use an identifier key. A path must
/// not be an existing directory.
pub fn parse_output(token: &str) -> Result<OutputDest, ReferenceError> {
    if let Some((cache, key)) = split_cache_ref(token) {
        validate_key(&key)?;
        return Ok(OutputDest::Cache { cache, key });
    }
    let path = PathBuf::from(token);
    if path.is_dir() {
        return Err(ReferenceError::ExistingDirectory(path));
    }
    Ok(OutputDest::Path(path))
}

/// Validate an `--output-dir` value.
pub fn validate_output_dir(token: &str) -> Result<PathBuf, ReferenceError> {
    if split_cache_ref(token).is_some() {
        return Err(ReferenceError::CacheOutputDir);
    }
    let path = PathBuf::from(token);
    if path.exists() {
        return Err(ReferenceError::OutputDirExists(path));
    }
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if let Ok(meta) = parent.metadata() {
        if meta.permissions().readonly() {
            return Err(ReferenceError::NotWritable(parent));
        }
    }
    Ok(path)
}

/// Load one metadata source.
///
/// A file that is a result envelope must be viewable as metadata; any other
/// file is read as TSV. Cache references always name results.
pub fn load_metadata(
    token: &str,
    use_cache: Option<&ResultCache>,
) -> Result<Metadata, ReferenceError> {
    match parse_input(token, use_cache)? {
        InputRef::File(path) => match Artifact::load(&path) {
            Ok(artifact) => Ok(Metadata::from_artifact(&artifact)?),
            Err(ResultError::Invalid { .. }) => Ok(Metadata::load(&path)?),
            Err(e) => Err(e.into()),
        },
        cached => match cached.load()? {
            QResult::Artifact(artifact) => Ok(Metadata::from_artifact(&artifact)?),
            other => Err(MetadataError::NotViewable(other.type_name()).into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SemanticType;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn seq() -> Artifact {
        Artifact::new(SemanticType::new("IntSequence1"), json!([1, 2]))
    }

    #[test]
    fn file_before_cache() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.art");
        seq().save(&path).unwrap();

        let input = parse_input(path.to_str().unwrap(), None).unwrap();
        assert!(matches!(input, InputRef::File(_)));
    }

    #[test]
    fn cache_reference() {
        let temp = TempDir::new().unwrap();
        let cache_path = temp.path().join("cache");
        let cache = ResultCache::create(&cache_path).unwrap();
        let artifact = seq();
        cache.save(&artifact, "ints").unwrap();

        let token = format!("{}:ints", cache_path.display());
        let input = parse_input(&token, None).unwrap();
        let loaded = expect_artifact(
            input.load().unwrap(),
            &TypeExpr::semantic("IntSequence1"),
            &token,
        )
        .unwrap();
        assert_eq!(loaded, artifact);
    }

    #[test]
    fn bare_key_uses_cache() {
        let temp = TempDir::new().unwrap();
        let cache = ResultCache::create(&temp.path().join("cache")).unwrap();
        cache.save(&seq(), "ints").unwrap();

        assert!(matches!(
            parse_input("ints", Some(&cache)).unwrap(),
            InputRef::Cache { .. }
        ));
        assert!(parse_input("ints", None).is_err());
    }

    #[test]
    fn labeled_member() {
        let temp = TempDir::new().unwrap();
        let cache_path = temp.path().join("cache");
        let cache = ResultCache::create(&cache_path).unwrap();
        cache.save(&seq(), "ints").unwrap();

        let token = format!("first:{}:ints", cache_path.display());
        let (label, input) = parse_member(&token, None).unwrap();
        assert_eq!(label.as_deref(), Some("first"));
        assert!(matches!(input, InputRef::Cache { key, .. } if key == "ints"));
    }

    #[test]
    fn invalid_output_key_rejected() {
        let temp = TempDir::new().unwrap();
        let cache_path = temp.path().join("mycache");
        ResultCache::create(&cache_path).unwrap();

        let err = parse_output(&format!("{}:not valid id!", cache_path.display())).unwrap_err();
        assert!(matches!(err, ReferenceError::InvalidKey(_)));
    }

    #[test]
    fn output_dir_rules() {
        let temp = TempDir::new().unwrap();
        let cache_path = temp.path().join("cache");
        ResultCache::create(&cache_path).unwrap();

        assert!(matches!(
            validate_output_dir(&format!("{}:key", cache_path.display())),
            Err(ReferenceError::CacheOutputDir)
        ));
        assert!(matches!(
            validate_output_dir(temp.path().to_str().unwrap()),
            Err(ReferenceError::OutputDirExists(_))
        ));
        assert!(validate_output_dir(temp.path().join("new").to_str().unwrap()).is_ok());
    }

    #[test]
    fn visualization_hint_names_artifact() {
        let temp = TempDir::new().unwrap();
        let viz = Artifact::visualization(json!({})).save(&temp.path().join("x")).unwrap();
        seq().save(&temp.path().join("x")).unwrap();

        let reference = viz.to_str().unwrap();
        let err = expect_artifact(
            QResult::load(&viz).unwrap(),
            &TypeExpr::semantic("IntSequence1"),
            reference,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Did you mean"));
    }

    #[test]
    fn type_mismatch() {
        let err = expect_artifact(
            QResult::Artifact(seq()),
            &TypeExpr::semantic("SingleInt"),
            "a.art",
        )
        .unwrap_err();
        assert!(matches!(err, ReferenceError::TypeMismatch { .. }));
    }

    #[test]
    fn metadata_from_tsv_and_artifact() {
        let temp = TempDir::new().unwrap();
        let tsv = temp.path().join("md.tsv");
        fs::write(&tsv, "id\tdepth\ns1\t1\ns2\t2\n").unwrap();
        let md = load_metadata(tsv.to_str().unwrap(), None).unwrap();
        assert_eq!(md.ids, vec!["s1", "s2"]);

        let mapping = Artifact::new(SemanticType::new("Mapping"), json!({"s1": "a", "s2": "b"}))
            .save(&temp.path().join("map"))
            .unwrap();
        let md = load_metadata(mapping.to_str().unwrap(), None).unwrap();
        assert_eq!(md.column_names(), vec!["value"]);

        let not_viewable = seq().save(&temp.path().join("seq")).unwrap();
        assert!(load_metadata(not_viewable.to_str().unwrap(), None).is_err());
    }
}
