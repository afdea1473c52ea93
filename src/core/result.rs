//! core::result
//!
//! On-disk action results.
//!
//! # Formats
//!
//! - Artifact: JSON envelope with a `.art` extension
//! - Visualization: JSON envelope with a `.viz` extension
//! - Collection: directory holding one member file per key plus a `.order`
//!   file listing the keys in order
//!
//! The envelope carries a random UUID, the semantic type (artifacts only),
//! a creation timestamp, optional provenance, and the plugin's payload.
//! A visualization's payload maps file names to file contents and holds at
//! least one `index.<ext>` file.
//!
//! # Extracted Layout
//!
//! ```text
//! <dest>/<uuid>/
//!   metadata.json        envelope without the payload
//!   provenance.json      producing plugin and action, when known
//!   citations.bib        when the provenance carries citations
//!   data/                payload: one file per visualization entry, or data.json
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use super::atomic::{write_atomic, write_json_atomic};
use super::citation::{self, Citation};
use super::types::SemanticType;

/// Extension appended to artifact files.
pub const ARTIFACT_EXT: &str = "art";
/// Extension appended to visualization files.
pub const VISUALIZATION_EXT: &str = "viz";
/// Key order file inside a collection directory.
pub const ORDER_FILE: &str = ".order";

/// Errors from reading or writing results.
#[derive(Debug, Error)]
pub enum ResultError {
    #[error("{0} does not exist")]
    NotFound(PathBuf),

    #[error("{path} is not a valid result file: {message}")]
    Invalid { path: PathBuf, message: String },

    #[error("{0} is not a result collection (missing .order)")]
    NotACollection(PathBuf),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ResultError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        ResultError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Location that ran out of space, if that is what failed.
    pub fn no_space_path(&self) -> Option<&Path> {
        match self {
            ResultError::Io { path, source } if is_no_space(source) => Some(path),
            _ => None,
        }
    }
}

/// ENOSPC on unix, ERROR_DISK_FULL on windows.
pub fn is_no_space(err: &std::io::Error) -> bool {
    let code = if cfg!(windows) { 112 } else { 28 };
    err.raw_os_error() == Some(code)
}

/// Artifact or visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Artifact,
    Visualization,
}

impl ResultKind {
    pub fn extension(self) -> &'static str {
        match self {
            ResultKind::Artifact => ARTIFACT_EXT,
            ResultKind::Visualization => VISUALIZATION_EXT,
        }
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultKind::Artifact => f.write_str("Artifact"),
            ResultKind::Visualization => f.write_str("Visualization"),
        }
    }
}

/// Which action produced a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub plugin: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,
}

/// How thoroughly `validate` checks a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationLevel {
    /// Envelope shape only.
    Min,
    /// Envelope and payload.
    #[default]
    Max,
}

impl FromStr for ValidationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "min" => Ok(ValidationLevel::Min),
            "max" => Ok(ValidationLevel::Max),
            other => Err(format!("unknown validation level '{}'", other)),
        }
    }
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationLevel::Min => f.write_str("min"),
            ValidationLevel::Max => f.write_str("max"),
        }
    }
}

/// A result that loads but is not well formed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("artifact has no semantic type")]
    MissingType,

    #[error("visualization declares a semantic type ({0})")]
    UnexpectedType(String),

    #[error("artifact payload is empty")]
    EmptyPayload,

    #[error("visualization payload is not a map of file names to contents")]
    NotAFileMap,

    #[error("visualization has no index file")]
    NoIndex,

    #[error("visualization file name '{0}' is not a plain relative path")]
    UnsafeName(String),

    #[error("collection key '{0}' appears more than once")]
    DuplicateKey(String),

    #[error("collection member '{key}': {source}")]
    Member {
        key: String,
        source: Box<ValidationError>,
    },
}

/// Visualization file names must stay inside the extraction directory.
fn is_plain_relative(name: &str) -> bool {
    let path = Path::new(name);
    !name.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

/// A single stored result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub uuid: Uuid,
    pub kind: ResultKind,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub semantic_type: Option<SemanticType>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    pub data: serde_json::Value,
}

impl Artifact {
    /// New artifact of `semantic_type` holding `data`.
    pub fn new(semantic_type: SemanticType, data: serde_json::Value) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            kind: ResultKind::Artifact,
            semantic_type: Some(semantic_type),
            created_at: Utc::now(),
            provenance: None,
            data,
        }
    }

    /// New visualization holding `data`.
    pub fn visualization(data: serde_json::Value) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            kind: ResultKind::Visualization,
            semantic_type: None,
            created_at: Utc::now(),
            provenance: None,
            data,
        }
    }

    pub fn with_provenance(mut self, plugin: &str, action: &str) -> Self {
        self.provenance = Some(Provenance {
            plugin: plugin.to_string(),
            action: action.to_string(),
            citations: Vec::new(),
        });
        self
    }

    /// Record the producing action, keeping provenance that is already set,
    /// and add `citations` to it.
    pub fn attribute(mut self, plugin: &str, action: &str, citations: &[Citation]) -> Self {
        let provenance = self.provenance.get_or_insert_with(|| Provenance {
            plugin: plugin.to_string(),
            action: action.to_string(),
            citations: Vec::new(),
        });
        provenance.citations = citation::merge([&provenance.citations[..], citations]);
        self
    }

    pub fn citations(&self) -> &[Citation] {
        match &self.provenance {
            Some(p) => &p.citations,
            None => &[],
        }
    }

    /// Index files of a visualization, by extension.
    pub fn index_files(&self) -> BTreeMap<String, String> {
        let Some(files) = self.data.as_object() else {
            return BTreeMap::new();
        };
        files
            .keys()
            .filter_map(|name| {
                let ext = name.strip_prefix("index.")?;
                (!ext.is_empty() && !ext.contains('/')).then(|| (ext.to_string(), name.clone()))
            })
            .collect()
    }

    /// Check the envelope, and at `Max` the payload too.
    pub fn validate(&self, level: ValidationLevel) -> Result<(), ValidationError> {
        match (self.kind, &self.semantic_type) {
            (ResultKind::Artifact, None) => return Err(ValidationError::MissingType),
            (ResultKind::Visualization, Some(t)) => {
                return Err(ValidationError::UnexpectedType(t.to_string()))
            }
            _ => {}
        }
        if level == ValidationLevel::Min {
            return Ok(());
        }
        match self.kind {
            ResultKind::Artifact if self.data.is_null() => Err(ValidationError::EmptyPayload),
            ResultKind::Artifact => Ok(()),
            ResultKind::Visualization => {
                let files = self.data.as_object().ok_or(ValidationError::NotAFileMap)?;
                if let Some(name) = files.keys().find(|name| !is_plain_relative(name)) {
                    return Err(ValidationError::UnsafeName(name.clone()));
                }
                if self.index_files().is_empty() {
                    return Err(ValidationError::NoIndex);
                }
                Ok(())
            }
        }
    }

    /// Unpack into `<dest>/<uuid>/`; returns that directory.
    pub fn extract(&self, dest: &Path) -> Result<PathBuf, ResultError> {
        let root = dest.join(self.uuid.to_string());
        let data_dir = root.join("data");
        fs::create_dir_all(&data_dir).map_err(|e| ResultError::io(&data_dir, e))?;

        let metadata = serde_json::json!({
            "uuid": self.uuid,
            "kind": self.kind,
            "type": self.semantic_type,
            "created_at": self.created_at,
        });
        let path = root.join("metadata.json");
        write_json_atomic(&path, &metadata).map_err(|e| ResultError::io(&path, e))?;

        if let Some(provenance) = &self.provenance {
            let path = root.join("provenance.json");
            let summary = serde_json::json!({
                "plugin": provenance.plugin,
                "action": provenance.action,
            });
            write_json_atomic(&path, &summary).map_err(|e| ResultError::io(&path, e))?;
            if !provenance.citations.is_empty() {
                let path = root.join("citations.bib");
                write_atomic(&path, citation::bibliography(&provenance.citations).as_bytes())
                    .map_err(|e| ResultError::io(&path, e))?;
            }
        }

        match (self.kind, self.data.as_object()) {
            (ResultKind::Visualization, Some(files)) => {
                for (name, content) in files {
                    if !is_plain_relative(name) {
                        return Err(ResultError::Invalid {
                            path: root.clone(),
                            message: ValidationError::UnsafeName(name.clone()).to_string(),
                        });
                    }
                    let path = data_dir.join(name);
                    let bytes = match content {
                        serde_json::Value::String(text) => text.clone().into_bytes(),
                        other => serde_json::to_vec_pretty(other).unwrap_or_default(),
                    };
                    write_atomic(&path, &bytes).map_err(|e| ResultError::io(&path, e))?;
                }
            }
            _ => {
                let path = data_dir.join("data.json");
                write_json_atomic(&path, &self.data).map_err(|e| ResultError::io(&path, e))?;
            }
        }
        Ok(root)
    }

    /// Display type: the semantic type, or `Visualization`.
    pub fn type_name(&self) -> String {
        match &self.semantic_type {
            Some(t) => t.to_string(),
            None => self.kind.to_string(),
        }
    }

    /// SHA-256 of the payload, hex encoded.
    pub fn checksum(&self) -> String {
        let bytes = serde_json::to_vec(&self.data).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }

    /// Save to `path`, appending the kind's extension if it is missing.
    ///
    /// Returns the path actually written.
    pub fn save(&self, path: &Path) -> Result<PathBuf, ResultError> {
        let path = with_extension(path, self.kind.extension());
        write_json_atomic(&path, self).map_err(|e| ResultError::io(&path, e))?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self, ResultError> {
        if !path.exists() {
            return Err(ResultError::NotFound(path.to_path_buf()));
        }
        let bytes = fs::read(path).map_err(|e| ResultError::io(path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| ResultError::Invalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Append `.ext` unless the path already ends with it.
pub fn with_extension(path: &Path, ext: &str) -> PathBuf {
    if path.extension().is_some_and(|e| e == ext) {
        path.to_path_buf()
    } else {
        let mut s = path.as_os_str().to_os_string();
        s.push(".");
        s.push(ext);
        PathBuf::from(s)
    }
}

/// An ordered, keyed group of results.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultCollection {
    pub members: Vec<(String, Artifact)>,
}

impl ResultCollection {
    pub fn new(members: Vec<(String, Artifact)>) -> Self {
        Self { members }
    }

    /// Save as a directory of member files plus `.order`.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, ResultError> {
        fs::create_dir_all(dir).map_err(|e| ResultError::io(dir, e))?;
        let mut order = String::new();
        for (key, artifact) in &self.members {
            artifact.save(&dir.join(key))?;
            order.push_str(key);
            order.push('\n');
        }
        let order_path = dir.join(ORDER_FILE);
        write_atomic(&order_path, order.as_bytes())
            .map_err(|e| ResultError::io(&order_path, e))?;
        Ok(dir.to_path_buf())
    }

    pub fn load(dir: &Path) -> Result<Self, ResultError> {
        if !dir.exists() {
            return Err(ResultError::NotFound(dir.to_path_buf()));
        }
        let order_path = dir.join(ORDER_FILE);
        if !order_path.is_file() {
            return Err(ResultError::NotACollection(dir.to_path_buf()));
        }
        let order = fs::read_to_string(&order_path).map_err(|e| ResultError::io(&order_path, e))?;

        let mut members = Vec::new();
        for key in order.lines().map(str::trim).filter(|k| !k.is_empty()) {
            let member = [ARTIFACT_EXT, VISUALIZATION_EXT]
                .iter()
                .map(|ext| dir.join(format!("{}.{}", key, ext)))
                .find(|p| p.is_file())
                .ok_or_else(|| ResultError::NotFound(dir.join(key)))?;
            members.push((key.to_string(), Artifact::load(&member)?));
        }
        Ok(Self { members })
    }

    pub fn is_collection_dir(path: &Path) -> bool {
        path.join(ORDER_FILE).is_file()
    }
}

/// Any result an action produces or consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum QResult {
    Artifact(Artifact),
    Visualization(Artifact),
    Collection(ResultCollection),
}

impl From<Artifact> for QResult {
    fn from(single: Artifact) -> Self {
        match single.kind {
            ResultKind::Artifact => QResult::Artifact(single),
            ResultKind::Visualization => QResult::Visualization(single),
        }
    }
}

impl QResult {
    /// Load a result file or collection directory.
    pub fn load(path: &Path) -> Result<Self, ResultError> {
        if path.is_dir() {
            Ok(QResult::Collection(ResultCollection::load(path)?))
        } else {
            Ok(Artifact::load(path)?.into())
        }
    }

    /// Save to `path`; returns the path actually written.
    pub fn save(&self, path: &Path) -> Result<PathBuf, ResultError> {
        match self {
            QResult::Artifact(a) | QResult::Visualization(a) => a.save(path),
            QResult::Collection(c) => c.save(path),
        }
    }

    /// Apply [`Artifact::attribute`] to every artifact in the result.
    pub fn attribute(self, plugin: &str, action: &str, citations: &[Citation]) -> Self {
        match self {
            QResult::Artifact(a) => QResult::Artifact(a.attribute(plugin, action, citations)),
            QResult::Visualization(v) => {
                QResult::Visualization(v.attribute(plugin, action, citations))
            }
            QResult::Collection(c) => QResult::Collection(ResultCollection::new(
                c.members
                    .into_iter()
                    .map(|(k, a)| (k, a.attribute(plugin, action, citations)))
                    .collect(),
            )),
        }
    }

    /// Citations of every artifact in the result, first entry per key.
    pub fn citations(&self) -> Vec<Citation> {
        match self {
            QResult::Artifact(a) | QResult::Visualization(a) => a.citations().to_vec(),
            QResult::Collection(c) => citation::merge(c.members.iter().map(|(_, a)| a.citations())),
        }
    }

    pub fn validate(&self, level: ValidationLevel) -> Result<(), ValidationError> {
        match self {
            QResult::Artifact(a) | QResult::Visualization(a) => a.validate(level),
            QResult::Collection(c) => {
                let mut seen = HashSet::new();
                for (key, member) in &c.members {
                    if !seen.insert(key.as_str()) {
                        return Err(ValidationError::DuplicateKey(key.clone()));
                    }
                    member.validate(level).map_err(|e| ValidationError::Member {
                        key: key.clone(),
                        source: Box::new(e),
                    })?;
                }
                Ok(())
            }
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            QResult::Artifact(a) | QResult::Visualization(a) => a.type_name(),
            QResult::Collection(c) => match c.members.first() {
                Some((_, first)) => format!("Collection[{}]", first.type_name()),
                None => "Collection[]".to_string(),
            },
        }
    }
}

/// Summary shown by `tools peek`.
#[derive(Debug, Clone, PartialEq)]
pub struct PeekInfo {
    pub uuid: Option<Uuid>,
    pub type_name: String,
    pub kind: &'static str,
    pub created_at: Option<DateTime<Utc>>,
    pub checksum: Option<String>,
    pub provenance: Option<Provenance>,
    pub members: usize,
}

impl From<&QResult> for PeekInfo {
    fn from(result: &QResult) -> Self {
        match result {
            QResult::Artifact(a) | QResult::Visualization(a) => Self {
                uuid: Some(a.uuid),
                type_name: a.type_name(),
                kind: if matches!(result, QResult::Artifact(_)) {
                    "artifact"
                } else {
                    "visualization"
                },
                created_at: Some(a.created_at),
                checksum: Some(a.checksum()),
                provenance: a.provenance.clone(),
                members: 1,
            },
            QResult::Collection(c) => Self {
                uuid: None,
                type_name: result.type_name(),
                kind: "collection",
                created_at: None,
                checksum: None,
                provenance: None,
                members: c.members.len(),
            },
        }
    }
}

impl fmt::Display for PeekInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(uuid) = &self.uuid {
            writeln!(f, "UUID:        {}", uuid)?;
        }
        writeln!(f, "Type:        {}", self.type_name)?;
        write!(f, "Kind:        {}", self.kind)?;
        if self.kind == "collection" {
            write!(f, "\nMembers:     {}", self.members)?;
        }
        if let Some(created) = &self.created_at {
            write!(f, "\nCreated:     {}", created.to_rfc3339())?;
        }
        if let Some(checksum) = &self.checksum {
            write!(f, "\nChecksum:    {}", checksum)?;
        }
        if let Some(p) = &self.provenance {
            write!(f, "\nCreated by:  {} {}", p.plugin, p.action)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn save_appends_extension_once() {
        let temp = TempDir::new().unwrap();
        let artifact = Artifact::new(SemanticType::new("IntSequence1"), json!([1, 2]));

        let written = artifact.save(&temp.path().join("out")).unwrap();
        assert_eq!(written, temp.path().join("out.art"));

        let written = artifact.save(&temp.path().join("again.art")).unwrap();
        assert_eq!(written, temp.path().join("again.art"));
    }

    #[test]
    fn load_restores_envelope() {
        let temp = TempDir::new().unwrap();
        let artifact = Artifact::new(SemanticType::new("Mapping"), json!({"a": "1"}))
            .with_provenance("dummy_plugin", "params_only");
        let path = artifact.save(&temp.path().join("m")).unwrap();

        let loaded = Artifact::load(&path).unwrap();
        assert_eq!(loaded, artifact);
        assert_eq!(loaded.type_name(), "Mapping");
    }

    #[test]
    fn load_garbage_is_invalid() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.art");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(
            Artifact::load(&path),
            Err(ResultError::Invalid { .. })
        ));
        assert!(matches!(
            Artifact::load(&temp.path().join("missing.art")),
            Err(ResultError::NotFound(_))
        ));
    }

    #[test]
    fn visualization_uses_viz_extension() {
        let temp = TempDir::new().unwrap();
        let viz = Artifact::visualization(json!({"index": "<html></html>"}));
        let path = viz.save(&temp.path().join("plot")).unwrap();
        assert_eq!(path.extension().unwrap(), "viz");
        assert_eq!(Artifact::load(&path).unwrap().type_name(), "Visualization");
    }

    #[test]
    fn collection_keeps_order() {
        let temp = TempDir::new().unwrap();
        let collection = ResultCollection::new(vec![
            (
                "zeta".to_string(),
                Artifact::new(SemanticType::new("SingleInt"), json!(1)),
            ),
            (
                "alpha".to_string(),
                Artifact::new(SemanticType::new("SingleInt"), json!(2)),
            ),
        ]);
        let dir = temp.path().join("ints");
        collection.save(&dir).unwrap();

        assert!(ResultCollection::is_collection_dir(&dir));
        let loaded = ResultCollection::load(&dir).unwrap();
        let keys: Vec<_> = loaded.members.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        assert_eq!(loaded, collection);
    }

    #[test]
    fn qresult_dispatches_on_kind() {
        let temp = TempDir::new().unwrap();
        let viz = Artifact::visualization(json!({}));
        let path = viz.save(&temp.path().join("v")).unwrap();
        assert!(matches!(QResult::load(&path).unwrap(), QResult::Visualization(_)));

        let art = Artifact::new(SemanticType::new("SingleInt"), json!(3));
        let path = art.save(&temp.path().join("a")).unwrap();
        let loaded = QResult::load(&path).unwrap();
        assert!(matches!(loaded, QResult::Artifact(_)));

        let peek = PeekInfo::from(&loaded);
        assert_eq!(peek.kind, "artifact");
        assert_eq!(peek.checksum.as_deref().map(str::len), Some(64));
        assert!(peek.to_string().contains("Type:        SingleInt"));
    }

    fn counts_viz() -> Artifact {
        Artifact::visualization(json!({
            "index.html": "<table></table>",
            "css/style.css": "table {}",
        }))
    }

    #[test]
    fn attribute_keeps_existing_provenance() {
        let cite = Citation::new("doe2024", "article");
        let art = Artifact::new(SemanticType::new("SingleInt"), json!(1))
            .with_provenance("dummy_plugin", "make_int")
            .attribute("other_plugin", "other", &[cite.clone()])
            .attribute("other_plugin", "other", &[cite.clone()]);
        let provenance = art.provenance.as_ref().unwrap();
        assert_eq!(provenance.plugin, "dummy_plugin");
        assert_eq!(art.citations(), &[cite][..]);

        let bare = Artifact::new(SemanticType::new("SingleInt"), json!(1)).attribute("p", "a", &[]);
        assert_eq!(bare.provenance.unwrap().action, "a");
    }

    #[test]
    fn citations_skip_serializing_when_empty() {
        let art = Artifact::new(SemanticType::new("SingleInt"), json!(1)).with_provenance("p", "a");
        let json = serde_json::to_value(&art).unwrap();
        assert_eq!(json["provenance"], json!({"plugin": "p", "action": "a"}));
    }

    #[test]
    fn validation_levels() {
        let mut untyped = Artifact::new(SemanticType::new("SingleInt"), json!(null));
        assert_eq!(untyped.validate(ValidationLevel::Min), Ok(()));
        assert_eq!(untyped.validate(ValidationLevel::Max), Err(ValidationError::EmptyPayload));
        untyped.semantic_type = None;
        assert_eq!(untyped.validate(ValidationLevel::Min), Err(ValidationError::MissingType));

        assert_eq!(counts_viz().validate(ValidationLevel::Max), Ok(()));
        let no_index = Artifact::visualization(json!({"page.html": ""}));
        assert_eq!(no_index.validate(ValidationLevel::Min), Ok(()));
        assert_eq!(no_index.validate(ValidationLevel::Max), Err(ValidationError::NoIndex));
        let escaping = Artifact::visualization(json!({"index.html": "", "../x": ""}));
        assert_eq!(
            escaping.validate(ValidationLevel::Max),
            Err(ValidationError::UnsafeName("../x".into()))
        );
        assert_eq!("max".parse::<ValidationLevel>(), Ok(ValidationLevel::Max));
        assert!("all".parse::<ValidationLevel>().is_err());
    }

    #[test]
    fn collection_validation_names_member() {
        let bad = Artifact::visualization(json!([]));
        let collection = QResult::Collection(ResultCollection::new(vec![
            ("ok".into(), Artifact::new(SemanticType::new("SingleInt"), json!(1))),
            ("bad".into(), bad),
        ]));
        let err = collection.validate(ValidationLevel::Max).unwrap_err();
        assert_eq!(
            err.to_string(),
            "collection member 'bad': visualization payload is not a map of file names to contents"
        );
    }

    #[test]
    fn extract_writes_payload_files() {
        let temp = TempDir::new().unwrap();
        let viz = counts_viz()
            .with_provenance("dummy_plugin", "most_common_viz")
            .attribute("dummy_plugin", "most_common_viz", &[Citation::new("doe2024", "article")]);
        let root = viz.extract(temp.path()).unwrap();

        assert_eq!(root, temp.path().join(viz.uuid.to_string()));
        assert_eq!(
            fs::read_to_string(root.join("data/index.html")).unwrap(),
            "<table></table>"
        );
        assert!(root.join("data/css/style.css").is_file());
        assert!(root.join("metadata.json").is_file());
        assert!(fs::read_to_string(root.join("citations.bib"))
            .unwrap()
            .starts_with("@article{doe2024,"));
        assert_eq!(viz.index_files()["html"], "index.html");
    }

    #[test]
    fn extract_artifact_writes_data_json() {
        let temp = TempDir::new().unwrap();
        let art = Artifact::new(SemanticType::new("IntSequence1"), json!([1, 2]));
        let root = art.extract(temp.path()).unwrap();
        let data: serde_json::Value =
            serde_json::from_slice(&fs::read(root.join("data/data.json")).unwrap()).unwrap();
        assert_eq!(data, json!([1, 2]));
        assert!(!root.join("provenance.json").exists());
    }

    #[test]
    fn plain_dir_is_not_collection() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            ResultCollection::load(temp.path()),
            Err(ResultError::NotACollection(_))
        ));
    }
}
