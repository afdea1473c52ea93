//! resolve::value
//!
//! Converted argument values handed to the framework.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde_json::{json, Value};

use crate::core::metadata::{Metadata, MetadataColumn};
use crate::core::result::Artifact;
use crate::store::ResultCache;

/// A fully converted argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// Explicitly optional and absent.
    None,
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    List(Vec<ArgValue>),
    Set(Vec<ArgValue>),
    /// Named members, from `key:value` tokens or a loaded collection.
    Keyed(Vec<(String, ArgValue)>),
    Artifact(Artifact),
    Metadata(Metadata),
    MetadataColumn(MetadataColumn),
}

impl ArgValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ArgValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_artifact(&self) -> Option<&Artifact> {
        match self {
            ArgValue::Artifact(a) => Some(a),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ArgValue::None)
    }

    /// Members of a list, set or keyed collection.
    pub fn members(&self) -> Vec<&ArgValue> {
        match self {
            ArgValue::List(items) | ArgValue::Set(items) => items.iter().collect(),
            ArgValue::Keyed(items) => items.iter().map(|(_, v)| v).collect(),
            _ => Vec::new(),
        }
    }

    /// Key used to detect duplicates in a set.
    pub fn identity(&self) -> String {
        match self {
            ArgValue::Artifact(a) => a.uuid.to_string(),
            other => other.to_string(),
        }
    }

    /// JSON form sent to out-of-process plugins.
    pub fn to_json(&self) -> Value {
        match self {
            ArgValue::None => Value::Null,
            ArgValue::Int(i) => json!(i),
            ArgValue::Float(f) => json!(f),
            ArgValue::Str(s) => json!(s),
            ArgValue::Bool(b) => json!(b),
            ArgValue::List(items) | ArgValue::Set(items) => {
                Value::Array(items.iter().map(ArgValue::to_json).collect())
            }
            ArgValue::Keyed(items) => Value::Object(
                items
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            ArgValue::Artifact(a) => serde_json::to_value(a).unwrap_or(Value::Null),
            ArgValue::Metadata(m) => serde_json::to_value(m).unwrap_or(Value::Null),
            ArgValue::MetadataColumn(c) => serde_json::to_value(c).unwrap_or(Value::Null),
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::None => f.write_str("None"),
            ArgValue::Int(i) => write!(f, "{}", i),
            ArgValue::Float(x) => write!(f, "{}", x),
            ArgValue::Str(s) => f.write_str(s),
            ArgValue::Bool(b) => write!(f, "{}", b),
            ArgValue::List(items) | ArgValue::Set(items) => {
                let parts: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            ArgValue::Keyed(items) => {
                let parts: Vec<String> = items.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            ArgValue::Artifact(a) => write!(f, "<{} {}>", a.type_name(), a.uuid),
            ArgValue::Metadata(m) => write!(f, "<Metadata {} ids>", m.ids.len()),
            ArgValue::MetadataColumn(c) => write!(f, "<MetadataColumn {}>", c.name),
        }
    }
}

/// Where an output is saved.
#[derive(Debug, Clone)]
pub enum OutputDest {
    Path(PathBuf),
    Cache { cache: ResultCache, key: String },
}

impl fmt::Display for OutputDest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputDest::Path(p) => write!(f, "{}", p.display()),
            OutputDest::Cache { cache, key } => write!(f, "{}:{}", cache.path().display(), key),
        }
    }
}

/// The resolved argument set of one invocation.
///
/// Inputs and parameters keep signature order. Built once and consumed by
/// the execution adapter.
#[derive(Debug, Clone, Default)]
pub struct ResolvedArgs {
    pub values: Vec<(String, ArgValue)>,
    pub outputs: Vec<(String, OutputDest)>,
}

impl ResolvedArgs {
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn output(&self, name: &str) -> Option<&OutputDest> {
        self.outputs.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    /// JSON object of inputs and parameters.
    pub fn to_json(&self) -> Value {
        let map: BTreeMap<&str, Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.as_str(), v.to_json()))
            .collect();
        json!(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_nested() {
        let v = ArgValue::Keyed(vec![
            ("a".into(), ArgValue::Int(1)),
            ("b".into(), ArgValue::List(vec![ArgValue::Str("x".into())])),
        ]);
        assert_eq!(v.to_string(), "{a: 1, b: [x]}");
    }

    #[test]
    fn json_of_args() {
        let args = ResolvedArgs {
            values: vec![
                ("int1".into(), ArgValue::Int(5)),
                ("flag".into(), ArgValue::None),
            ],
            outputs: Vec::new(),
        };
        assert_eq!(args.to_json(), json!({"int1": 5, "flag": null}));
        assert_eq!(args.get("int1").and_then(ArgValue::as_int), Some(5));
    }
}
