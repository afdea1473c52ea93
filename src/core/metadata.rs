//! core::metadata
//!
//! Tabular sample metadata.
//!
//! # File Format
//!
//! Tab-separated text. The first non-comment line is the header; its first
//! cell names the id column. Lines starting with `#` are comments, except a
//! `#types` directive row that pins column kinds:
//!
//! ```text
//! id	depth	site
//! #types	numeric	categorical
//! s1	10	north
//! s2	12	south
//! ```
//!
//! Columns without a directive are numeric when every non-empty value
//! parses as a number, categorical otherwise.
//!
//! # Merging
//!
//! Several `--m-<name>-file` values merge into one table on their shared
//! ids (inner join, first file's order). Overlapping column names are
//! rejected.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::result::Artifact;
use super::types::ColumnKind;

/// Errors from metadata loading and selection.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to read metadata file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("metadata file '{path}' is empty")]
    Empty { path: PathBuf },

    #[error("metadata file '{path}', line {line}: {message}")]
    Malformed {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("column '{column}' appears in more than one metadata source")]
    OverlappingColumn { column: String },

    #[error("the metadata sources share no ids")]
    NoSharedIds,

    #[error("metadata column '{column}' not found. Available columns: {available}")]
    MissingColumn { column: String, available: String },

    #[error("metadata column '{column}' is {actual}, expected {expected}")]
    ColumnKindMismatch {
        column: String,
        actual: ColumnKind,
        expected: String,
    },

    #[error("artifact of type {0} cannot be viewed as metadata")]
    NotViewable(String),
}

/// One named column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub values: Vec<String>,
}

/// A metadata table keyed by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub id_header: String,
    pub ids: Vec<String>,
    pub columns: Vec<Column>,
}

/// A single column selected from a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataColumn {
    pub name: String,
    pub kind: ColumnKind,
    pub ids: Vec<String>,
    pub values: Vec<String>,
}

impl Metadata {
    /// Load a TSV metadata file.
    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let text = fs::read_to_string(path).map_err(|e| MetadataError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&text, path)
    }

    /// Parse TSV text; `origin` is used in error messages.
    pub fn parse(text: &str, origin: &Path) -> Result<Self, MetadataError> {
        let malformed = |line: usize, message: String| MetadataError::Malformed {
            path: origin.to_path_buf(),
            line,
            message,
        };

        let mut header: Option<Vec<String>> = None;
        let mut directive: Option<Vec<String>> = None;
        let mut rows: Vec<Vec<String>> = Vec::new();
        let mut seen = HashSet::new();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            if raw.trim().is_empty() {
                continue;
            }
            let cells: Vec<String> = raw.split('\t').map(|c| c.trim().to_string()).collect();

            if raw.starts_with('#') {
                if header.is_some() && cells[0] == "#types" {
                    directive = Some(cells[1..].to_vec());
                }
                continue;
            }

            let Some(head) = &header else {
                if cells[0].is_empty() {
                    return Err(malformed(line_no, "id column header is empty".to_string()));
                }
                header = Some(cells);
                continue;
            };

            if cells.len() > head.len() {
                return Err(malformed(
                    line_no,
                    format!("expected {} cells, found {}", head.len(), cells.len()),
                ));
            }
            let id = &cells[0];
            if id.is_empty() {
                return Err(malformed(line_no, "empty id".to_string()));
            }
            if !seen.insert(id.clone()) {
                return Err(malformed(line_no, format!("duplicate id '{}'", id)));
            }
            let mut row = cells;
            row.resize(head.len(), String::new());
            rows.push(row);
        }

        let header = header.ok_or_else(|| MetadataError::Empty {
            path: origin.to_path_buf(),
        })?;

        let mut columns = Vec::new();
        for (col_idx, name) in header.iter().enumerate().skip(1) {
            let values: Vec<String> = rows.iter().map(|r| r[col_idx].clone()).collect();
            let pinned = directive
                .as_ref()
                .and_then(|d| d.get(col_idx - 1))
                .map(|k| k.to_ascii_lowercase());
            let kind = match pinned.as_deref() {
                Some("numeric") => {
                    if let Some(bad) = values.iter().find(|v| !v.is_empty() && v.parse::<f64>().is_err()) {
                        return Err(malformed(
                            0,
                            format!("column '{}' is declared numeric but contains '{}'", name, bad),
                        ));
                    }
                    ColumnKind::Numeric
                }
                Some("categorical") => ColumnKind::Categorical,
                Some(other) if !other.is_empty() => {
                    return Err(malformed(0, format!("unknown column type '{}'", other)));
                }
                _ => infer_kind(&values),
            };
            columns.push(Column {
                name: name.clone(),
                kind,
                values,
            });
        }

        Ok(Metadata {
            id_header: header[0].clone(),
            ids: rows.into_iter().map(|mut r| r.swap_remove(0)).collect(),
            columns,
        })
    }

    /// View an artifact's payload as metadata.
    ///
    /// The payload must map ids to either scalars (one `value` column) or
    /// objects of scalars (one column per field).
    pub fn from_artifact(artifact: &Artifact) -> Result<Self, MetadataError> {
        let not_viewable = || MetadataError::NotViewable(artifact.type_name());
        let object = artifact.data.as_object().ok_or_else(not_viewable)?;

        let mut names: Vec<String> = Vec::new();
        let mut cells: Vec<HashMap<String, String>> = Vec::new();
        for value in object.values() {
            let mut row = HashMap::new();
            match value {
                serde_json::Value::Object(fields) => {
                    for (k, v) in fields {
                        if !names.contains(k) {
                            names.push(k.clone());
                        }
                        row.insert(k.clone(), scalar_text(v).ok_or_else(not_viewable)?);
                    }
                }
                scalar => {
                    if names.is_empty() {
                        names.push("value".to_string());
                    }
                    row.insert("value".to_string(), scalar_text(scalar).ok_or_else(not_viewable)?);
                }
            }
            cells.push(row);
        }

        let columns = names
            .into_iter()
            .map(|name| {
                let values: Vec<String> = cells
                    .iter()
                    .map(|row| row.get(&name).cloned().unwrap_or_default())
                    .collect();
                Column {
                    kind: infer_kind(&values),
                    name,
                    values,
                }
            })
            .collect();

        Ok(Metadata {
            id_header: "id".to_string(),
            ids: object.keys().cloned().collect(),
            columns,
        })
    }

    /// Merge tables on shared ids.
    pub fn merge(tables: Vec<Metadata>) -> Result<Self, MetadataError> {
        let mut iter = tables.into_iter();
        let Some(mut merged) = iter.next() else {
            return Err(MetadataError::NoSharedIds);
        };

        for other in iter {
            for column in &other.columns {
                if merged.columns.iter().any(|c| c.name == column.name) {
                    return Err(MetadataError::OverlappingColumn {
                        column: column.name.clone(),
                    });
                }
            }

            let other_index: HashMap<&str, usize> = other
                .ids
                .iter()
                .enumerate()
                .map(|(i, id)| (id.as_str(), i))
                .collect();
            let keep: Vec<(usize, usize)> = merged
                .ids
                .iter()
                .enumerate()
                .filter_map(|(i, id)| other_index.get(id.as_str()).map(|j| (i, *j)))
                .collect();
            if keep.is_empty() {
                return Err(MetadataError::NoSharedIds);
            }

            merged.ids = keep.iter().map(|(i, _)| merged.ids[*i].clone()).collect();
            for column in &mut merged.columns {
                column.values = keep.iter().map(|(i, _)| column.values[*i].clone()).collect();
            }
            for column in other.columns {
                merged.columns.push(Column {
                    values: keep.iter().map(|(_, j)| column.values[*j].clone()).collect(),
                    ..column
                });
            }
        }
        Ok(merged)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Select one column, checking its kind against `accepts`.
    ///
    /// An empty `accepts` list allows any kind.
    pub fn column(&self, name: &str, accepts: &[ColumnKind]) -> Result<MetadataColumn, MetadataError> {
        let column = self
            .columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| MetadataError::MissingColumn {
                column: name.to_string(),
                available: self.column_names().join(", "),
            })?;

        if !accepts.is_empty() && !accepts.contains(&column.kind) {
            let expected: Vec<String> = accepts.iter().map(|k| k.to_string()).collect();
            return Err(MetadataError::ColumnKindMismatch {
                column: name.to_string(),
                actual: column.kind,
                expected: expected.join(" or "),
            });
        }

        Ok(MetadataColumn {
            name: column.name.clone(),
            kind: column.kind,
            ids: self.ids.clone(),
            values: column.values.clone(),
        })
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.id_header)?;
        writeln!(f, "  ids:     {}", self.ids.len())?;
        write!(f, "  columns: {}", self.columns.len())?;
        for column in &self.columns {
            write!(f, "\n    {} ({})", column.name, column.kind)?;
        }
        Ok(())
    }
}

fn infer_kind(values: &[String]) -> ColumnKind {
    let mut non_empty = values.iter().filter(|v| !v.is_empty()).peekable();
    if non_empty.peek().is_some() && non_empty.all(|v| v.parse::<f64>().is_ok()) {
        ColumnKind::Numeric
    } else {
        ColumnKind::Categorical
    }
}

fn scalar_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Null => Some(String::new()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SemanticType;
    use serde_json::json;

    fn parse(text: &str) -> Result<Metadata, MetadataError> {
        Metadata::parse(text, Path::new("md.tsv"))
    }

    #[test]
    fn parse_infers_kinds() {
        let md = parse("id\tdepth\tsite\ns1\t10\tnorth\ns2\t12.5\tsouth\n").unwrap();
        assert_eq!(md.ids, vec!["s1", "s2"]);
        assert_eq!(md.columns[0].kind, ColumnKind::Numeric);
        assert_eq!(md.columns[1].kind, ColumnKind::Categorical);
    }

    #[test]
    fn types_directive_overrides_inference() {
        let md = parse("id\tcode\n#types\tcategorical\ns1\t1\ns2\t2\n").unwrap();
        assert_eq!(md.columns[0].kind, ColumnKind::Categorical);
    }

    #[test]
    fn duplicate_ids_rejected() {
        let err = parse("id\ta\ns1\tx\ns1\ty\n").unwrap_err();
        assert!(err.to_string().contains("duplicate id 's1'"));
    }

    #[test]
    fn empty_file_rejected() {
        assert!(matches!(parse("# only a comment\n"), Err(MetadataError::Empty { .. })));
    }

    #[test]
    fn merge_joins_on_shared_ids() {
        let a = parse("id\ta\ns1\t1\ns2\t2\ns3\t3\n").unwrap();
        let b = parse("id\tb\ns3\tz\ns1\tx\n").unwrap();
        let merged = Metadata::merge(vec![a, b]).unwrap();
        assert_eq!(merged.ids, vec!["s1", "s3"]);
        assert_eq!(merged.columns[0].values, vec!["1", "3"]);
        assert_eq!(merged.columns[1].values, vec!["x", "z"]);
    }

    #[test]
    fn merge_rejects_overlapping_columns() {
        let a = parse("id\ta\ns1\t1\n").unwrap();
        let b = parse("id\ta\ns1\t2\n").unwrap();
        assert!(matches!(
            Metadata::merge(vec![a, b]),
            Err(MetadataError::OverlappingColumn { .. })
        ));
    }

    #[test]
    fn column_kind_checked() {
        let md = parse("id\tsite\ns1\tnorth\n").unwrap();
        assert!(md.column("site", &[ColumnKind::Categorical]).is_ok());
        assert!(matches!(
            md.column("site", &[ColumnKind::Numeric]),
            Err(MetadataError::ColumnKindMismatch { .. })
        ));
        let err = md.column("nope", &[]).unwrap_err();
        assert!(err.to_string().contains("Available columns: site"));
    }

    #[test]
    fn mapping_artifact_viewable() {
        let artifact = Artifact::new(SemanticType::new("Mapping"), json!({"a": "1", "b": "2"}));
        let md = Metadata::from_artifact(&artifact).unwrap();
        assert_eq!(md.ids, vec!["a", "b"]);
        assert_eq!(md.column_names(), vec!["value"]);
        assert_eq!(md.columns[0].kind, ColumnKind::Numeric);
    }

    #[test]
    fn sequence_artifact_not_viewable() {
        let artifact = Artifact::new(SemanticType::new("IntSequence1"), json!([1, 2]));
        assert!(matches!(
            Metadata::from_artifact(&artifact),
            Err(MetadataError::NotViewable(_))
        ));
    }
}
