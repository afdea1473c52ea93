//! core::types
//!
//! Strong types for action signatures.
//!
//! # Types
//!
//! - [`TypeExpr`] - Tagged type expression tree (primitive, semantic, collection, ...)
//! - [`SemanticType`] - Artifact type with generic fields, matched by containment
//! - [`Predicate`] - Range or Choices restriction on a primitive
//! - [`Signature`] - Ordered parameter list of one action
//! - [`PluginRecord`] / [`ActionRecord`] - Cached deployment data
//!
//! # Validation
//!
//! Signatures are validated when they are loaded from the deployment cache.
//! Nested collections and cross-container unions are rejected there, so the
//! translator and resolver never see them.
//!
//! # Examples
//!
//! ```
//! use plugcli::core::types::{SemanticType, TypeExpr};
//!
//! let actual: SemanticType = "FeatureTable[Frequency]".parse().unwrap();
//! let expected = TypeExpr::Semantic("FeatureTable[Frequency]".parse().unwrap());
//! assert!(expected.accepts_semantic(&actual));
//!
//! assert!("Broken[".parse::<SemanticType>().is_err());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::citation::Citation;

/// Errors from type parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid semantic type: {0}")]
    InvalidSemanticType(String),
}

/// Errors raised while validating a signature.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("parameter '{name}' has type {repr}: collections of collections are not supported")]
    NestedCollection { name: String, repr: String },

    #[error("parameter '{name}' has type {repr}: a union cannot mix List and Set members")]
    CrossContainerUnion { name: String, repr: String },

    #[error("parameter '{name}' has type {repr}: a union cannot mix collection and non-collection members")]
    MixedUnion { name: String, repr: String },

    #[error("parameter '{name}' has type {repr}, which is not valid for an {role}")]
    InvalidRole {
        name: String,
        repr: String,
        role: Role,
    },

    #[error("duplicate parameter name '{0}'")]
    DuplicateName(String),
}

/// Name of a primitive type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveName {
    Int,
    Str,
    Float,
    Bool,
    Color,
}

impl fmt::Display for PrimitiveName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimitiveName::Int => "Int",
            PrimitiveName::Str => "Str",
            PrimitiveName::Float => "Float",
            PrimitiveName::Bool => "Bool",
            PrimitiveName::Color => "Color",
        };
        f.write_str(name)
    }
}

/// A restriction on the values a primitive accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum Predicate {
    /// Numeric interval. `None` bounds are unbounded.
    Range {
        start: Option<f64>,
        end: Option<f64>,
        #[serde(default = "default_true")]
        inclusive_start: bool,
        #[serde(default)]
        inclusive_end: bool,
    },
    /// Enumerated string values.
    Choices { choices: Vec<String> },
}

fn default_true() -> bool {
    true
}

impl Predicate {
    /// Range with the default inclusivity: `[start, end)`.
    pub fn range(start: Option<f64>, end: Option<f64>) -> Self {
        Predicate::Range {
            start,
            end,
            inclusive_start: true,
            inclusive_end: false,
        }
    }

    pub fn choices<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Predicate::Choices {
            choices: choices.into_iter().map(Into::into).collect(),
        }
    }

    /// Inclusive integer bounds equivalent to this range.
    ///
    /// An exclusive start of `0` becomes an inclusive minimum of `1`.
    pub fn int_bounds(&self) -> Option<(Option<i64>, Option<i64>)> {
        match self {
            Predicate::Range {
                start,
                end,
                inclusive_start,
                inclusive_end,
            } => {
                let lo = start.map(|raw| {
                    let s = raw.ceil() as i64;
                    if *inclusive_start || (s as f64) != raw {
                        s
                    } else {
                        s + 1
                    }
                });
                let hi = end.map(|raw| {
                    let e = raw.floor() as i64;
                    if *inclusive_end || (e as f64) != raw {
                        e
                    } else {
                        e - 1
                    }
                });
                Some((lo, hi))
            }
            Predicate::Choices { .. } => None,
        }
    }

    /// Check a float against the range, honoring inclusivity.
    pub fn contains_float(&self, value: f64) -> bool {
        match self {
            Predicate::Range {
                start,
                end,
                inclusive_start,
                inclusive_end,
            } => {
                let above = match start {
                    Some(s) if *inclusive_start => value >= *s,
                    Some(s) => value > *s,
                    None => true,
                };
                let below = match end {
                    Some(e) if *inclusive_end => value <= *e,
                    Some(e) => value < *e,
                    None => true,
                };
                above && below
            }
            Predicate::Choices { .. } => true,
        }
    }

    /// Whether this is exactly the inclusive `[0, 1]` interval.
    pub fn is_proportion(&self) -> bool {
        matches!(
            self,
            Predicate::Range {
                start: Some(s),
                end: Some(e),
                inclusive_start: true,
                inclusive_end: true,
            } if *s == 0.0 && *e == 1.0
        )
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Range {
                start,
                end,
                inclusive_start,
                inclusive_end,
            } => {
                write!(f, "Range({}, {}", format_bound(*start), format_bound(*end))?;
                if !inclusive_start {
                    f.write_str(", inclusive_start=False")?;
                }
                if *inclusive_end {
                    f.write_str(", inclusive_end=True")?;
                }
                f.write_str(")")
            }
            Predicate::Choices { choices } => {
                let quoted: Vec<String> = choices.iter().map(|c| format!("'{}'", c)).collect();
                write!(f, "Choices({})", quoted.join(", "))
            }
        }
    }
}

fn format_bound(bound: Option<f64>) -> String {
    match bound {
        None => "None".to_string(),
        Some(b) => format_number(b),
    }
}

/// Render a float without a trailing `.0` when it is integral.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

/// A primitive type with an optional predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Primitive {
    pub name: PrimitiveName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Predicate>,
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.predicate {
            Some(p) => write!(f, "{} % {}", self.name, p),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A semantic (artifact) type such as `FeatureTable[Frequency]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SemanticType {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<SemanticType>,
}

impl SemanticType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_fields(name: impl Into<String>, fields: Vec<SemanticType>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Containment check: `self` is usable where `expected` is declared.
    ///
    /// A field named `*` in the expected type matches any field.
    pub fn is_subtype_of(&self, expected: &SemanticType) -> bool {
        if self.name != expected.name || self.fields.len() != expected.fields.len() {
            return false;
        }
        self.fields
            .iter()
            .zip(&expected.fields)
            .all(|(a, e)| e.name == "*" || a.is_subtype_of(e))
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.fields.is_empty() {
            let fields: Vec<String> = self.fields.iter().map(|t| t.to_string()).collect();
            write!(f, "[{}]", fields.join(", "))?;
        }
        Ok(())
    }
}

impl FromStr for SemanticType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = SemanticParser {
            input: s,
            chars: s.char_indices().peekable(),
        };
        let parsed = parser.parse_type()?;
        parser.skip_ws();
        if parser.chars.peek().is_some() {
            return Err(TypeError::InvalidSemanticType(s.to_string()));
        }
        Ok(parsed)
    }
}

struct SemanticParser<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl SemanticParser<'_> {
    fn skip_ws(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn invalid(&self) -> TypeError {
        TypeError::InvalidSemanticType(self.input.to_string())
    }

    fn parse_type(&mut self) -> Result<SemanticType, TypeError> {
        self.skip_ws();
        let mut name = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' || c == '*' {
                name.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(self.invalid());
        }

        self.skip_ws();
        let mut fields = Vec::new();
        if matches!(self.chars.peek(), Some((_, '['))) {
            self.chars.next();
            loop {
                fields.push(self.parse_type()?);
                self.skip_ws();
                match self.chars.next() {
                    Some((_, ',')) => continue,
                    Some((_, ']')) => break,
                    _ => return Err(self.invalid()),
                }
            }
        }
        Ok(SemanticType { name, fields })
    }
}

/// Collection container kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Container {
    List,
    Set,
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Container::List => f.write_str("List"),
            Container::Set => f.write_str("Set"),
        }
    }
}

/// Runtime type of a metadata column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Categorical,
    Numeric,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Categorical => f.write_str("categorical"),
            ColumnKind::Numeric => f.write_str("numeric"),
        }
    }
}

/// A signature type expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeExpr {
    Primitive(Primitive),
    Semantic(SemanticType),
    Visualization,
    Collection {
        container: Container,
        member: Box<TypeExpr>,
    },
    Union {
        members: Vec<TypeExpr>,
    },
    Metadata,
    MetadataColumn {
        accepts: Vec<ColumnKind>,
    },
}

/// How a (possibly union) type spreads over a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionStyle<'a> {
    pub container: Container,
    /// Member types with unions flattened.
    pub members: Vec<&'a TypeExpr>,
}

impl TypeExpr {
    pub fn int() -> Self {
        TypeExpr::Primitive(Primitive {
            name: PrimitiveName::Int,
            predicate: None,
        })
    }

    pub fn primitive(name: PrimitiveName, predicate: Option<Predicate>) -> Self {
        TypeExpr::Primitive(Primitive { name, predicate })
    }

    pub fn semantic(name: &str) -> Self {
        match name.parse() {
            Ok(t) => TypeExpr::Semantic(t),
            Err(_) => TypeExpr::Semantic(SemanticType::new(name)),
        }
    }

    pub fn list(member: TypeExpr) -> Self {
        TypeExpr::Collection {
            container: Container::List,
            member: Box::new(member),
        }
    }

    pub fn set(member: TypeExpr) -> Self {
        TypeExpr::Collection {
            container: Container::Set,
            member: Box::new(member),
        }
    }

    pub fn union(members: Vec<TypeExpr>) -> Self {
        TypeExpr::Union { members }
    }

    /// Collection container and flattened members, if this is a collection.
    ///
    /// Unions of collections collapse to their (single) container.
    pub fn collection_style(&self) -> Option<CollectionStyle<'_>> {
        match self {
            TypeExpr::Collection { container, member } => Some(CollectionStyle {
                container: *container,
                members: member.flatten_union(),
            }),
            TypeExpr::Union { members } => {
                let mut container = None;
                let mut flat = Vec::new();
                for m in members {
                    if let TypeExpr::Collection {
                        container: c,
                        member,
                    } = m
                    {
                        container.get_or_insert(*c);
                        flat.extend(member.flatten_union());
                    } else {
                        return None;
                    }
                }
                container.map(|container| CollectionStyle {
                    container,
                    members: flat,
                })
            }
            _ => None,
        }
    }

    fn flatten_union(&self) -> Vec<&TypeExpr> {
        match self {
            TypeExpr::Union { members } => members.iter().flat_map(|m| m.flatten_union()).collect(),
            other => vec![other],
        }
    }

    /// The non-collection members this type is made of.
    pub fn leaves(&self) -> Vec<&TypeExpr> {
        match self.collection_style() {
            Some(style) => style.members,
            None => self.flatten_union(),
        }
    }

    /// Whether values are artifacts (possibly inside a collection).
    pub fn is_semantic(&self) -> bool {
        self.leaves()
            .iter()
            .all(|t| matches!(t, TypeExpr::Semantic(_)))
    }

    pub fn is_visualization(&self) -> bool {
        matches!(self, TypeExpr::Visualization)
    }

    pub fn is_metadata(&self) -> bool {
        matches!(self, TypeExpr::Metadata | TypeExpr::MetadataColumn { .. })
    }

    pub fn is_bool(&self) -> bool {
        self.leaves().iter().any(|t| {
            matches!(
                t,
                TypeExpr::Primitive(Primitive {
                    name: PrimitiveName::Bool,
                    ..
                })
            )
        })
    }

    /// Whether an artifact of type `actual` satisfies this expression.
    pub fn accepts_semantic(&self, actual: &SemanticType) -> bool {
        self.leaves().iter().any(|t| match t {
            TypeExpr::Semantic(expected) => actual.is_subtype_of(expected),
            _ => false,
        })
    }

    /// Validate structural invariants for parameter `name`.
    pub fn validate(&self, name: &str) -> Result<(), SignatureError> {
        match self {
            TypeExpr::Collection { member, .. } => {
                if member
                    .flatten_union()
                    .iter()
                    .any(|m| matches!(m, TypeExpr::Collection { .. }))
                {
                    return Err(SignatureError::NestedCollection {
                        name: name.to_string(),
                        repr: self.to_string(),
                    });
                }
                Ok(())
            }
            TypeExpr::Union { members } => {
                let flat = self.flatten_union();
                let containers: Vec<Container> = flat
                    .iter()
                    .filter_map(|m| match m {
                        TypeExpr::Collection { container, .. } => Some(*container),
                        _ => None,
                    })
                    .collect();
                if !containers.is_empty() && containers.len() != flat.len() {
                    return Err(SignatureError::MixedUnion {
                        name: name.to_string(),
                        repr: self.to_string(),
                    });
                }
                if containers.windows(2).any(|w| w[0] != w[1]) {
                    return Err(SignatureError::CrossContainerUnion {
                        name: name.to_string(),
                        repr: self.to_string(),
                    });
                }
                members.iter().try_for_each(|m| m.validate(name))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Primitive(p) => write!(f, "{}", p),
            TypeExpr::Semantic(s) => write!(f, "{}", s),
            TypeExpr::Visualization => f.write_str("Visualization"),
            TypeExpr::Collection { container, member } => write!(f, "{}[{}]", container, member),
            TypeExpr::Union { members } => {
                let parts: Vec<String> = members.iter().map(|m| m.to_string()).collect();
                f.write_str(&parts.join(" | "))
            }
            TypeExpr::Metadata => f.write_str("Metadata"),
            TypeExpr::MetadataColumn { accepts } => {
                let parts: Vec<&str> = accepts
                    .iter()
                    .map(|k| match k {
                        ColumnKind::Categorical => "Categorical",
                        ColumnKind::Numeric => "Numeric",
                    })
                    .collect();
                write!(f, "MetadataColumn[{}]", parts.join(" | "))
            }
        }
    }
}

/// Which side of the signature a parameter lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Input,
    Parameter,
    Output,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Input => f.write_str("input"),
            Role::Parameter => f.write_str("parameter"),
            Role::Output => f.write_str("output"),
        }
    }
}

/// Default state of a signature entry.
///
/// `Optional` is an explicit default of "no value", distinct from
/// having no default at all.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum DefaultValue {
    #[default]
    Required,
    Optional,
    Value(serde_json::Value),
}

impl DefaultValue {
    pub fn is_required(&self) -> bool {
        matches!(self, DefaultValue::Required)
    }
}

/// One parameter of an action signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureEntry {
    pub name: String,
    pub role: Role,
    #[serde(rename = "type")]
    pub type_expr: TypeExpr,
    #[serde(default)]
    pub default: DefaultValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SignatureEntry {
    pub fn new(name: impl Into<String>, role: Role, type_expr: TypeExpr) -> Self {
        Self {
            name: name.into(),
            role,
            type_expr,
            default: DefaultValue::Required,
            description: None,
        }
    }

    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = default;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Ordered signature of an action.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Signature {
    pub entries: Vec<SignatureEntry>,
}

impl Signature {
    pub fn new(entries: Vec<SignatureEntry>) -> Self {
        Self { entries }
    }

    pub fn inputs(&self) -> impl Iterator<Item = &SignatureEntry> {
        self.by_role(Role::Input)
    }

    pub fn parameters(&self) -> impl Iterator<Item = &SignatureEntry> {
        self.by_role(Role::Parameter)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &SignatureEntry> {
        self.by_role(Role::Output)
    }

    fn by_role(&self, role: Role) -> impl Iterator<Item = &SignatureEntry> {
        self.entries.iter().filter(move |e| e.role == role)
    }

    pub fn get(&self, name: &str) -> Option<&SignatureEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Check every entry's type and role combination.
    pub fn validate(&self) -> Result<(), SignatureError> {
        let mut seen = std::collections::HashSet::new();
        for entry in &self.entries {
            if !seen.insert(entry.name.as_str()) {
                return Err(SignatureError::DuplicateName(entry.name.clone()));
            }
            entry.type_expr.validate(&entry.name)?;

            let ok = match entry.role {
                Role::Input => entry.type_expr.is_semantic(),
                Role::Output => entry.type_expr.is_semantic() || entry.type_expr.is_visualization(),
                Role::Parameter => {
                    !entry.type_expr.is_semantic() && !entry.type_expr.is_visualization()
                }
            };
            if !ok {
                return Err(SignatureError::InvalidRole {
                    name: entry.name.clone(),
                    repr: entry.type_expr.to_string(),
                    role: entry.role,
                });
            }
        }
        Ok(())
    }
}

/// Kind of action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Method,
    Visualizer,
    Pipeline,
}

/// A rendered usage example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageExample {
    pub name: String,
    pub lines: Vec<String>,
}

/// Cached description of one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub kind: ActionKind,
    pub signature: Signature,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub examples: Vec<UsageExample>,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

/// Cached description of one plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginRecord {
    pub id: String,
    pub name: String,
    pub version: String,
    pub website: String,
    pub user_support_text: String,
    pub description: String,
    pub short_description: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    pub actions: BTreeMap<String, ActionRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semantic_type_parse_and_display() {
        let t: SemanticType = "FeatureTable[Frequency]".parse().unwrap();
        assert_eq!(t.name, "FeatureTable");
        assert_eq!(t.fields, vec![SemanticType::new("Frequency")]);
        assert_eq!(t.to_string(), "FeatureTable[Frequency]");

        let nested: SemanticType = "Map[Key, Pair[A, B]]".parse().unwrap();
        assert_eq!(nested.to_string(), "Map[Key, Pair[A, B]]");
    }

    #[test]
    fn semantic_type_parse_rejects_garbage() {
        assert!("".parse::<SemanticType>().is_err());
        assert!("A[".parse::<SemanticType>().is_err());
        assert!("A]".parse::<SemanticType>().is_err());
        assert!("A[B,]".parse::<SemanticType>().is_err());
    }

    #[test]
    fn subtype_containment() {
        let freq: SemanticType = "FeatureTable[Frequency]".parse().unwrap();
        let any: SemanticType = "FeatureTable[*]".parse().unwrap();
        let rel: SemanticType = "FeatureTable[RelativeFrequency]".parse().unwrap();
        assert!(freq.is_subtype_of(&any));
        assert!(!freq.is_subtype_of(&rel));
        assert!(!any.is_subtype_of(&freq));
    }

    #[test]
    fn union_accepts_any_member() {
        let expr = TypeExpr::union(vec![
            TypeExpr::semantic("IntSequence1"),
            TypeExpr::semantic("IntSequence2"),
        ]);
        assert!(expr.accepts_semantic(&SemanticType::new("IntSequence2")));
        assert!(!expr.accepts_semantic(&SemanticType::new("Mapping")));
    }

    #[test]
    fn int_bounds_honor_inclusivity() {
        let p = Predicate::Range {
            start: Some(0.0),
            end: Some(10.0),
            inclusive_start: false,
            inclusive_end: false,
        };
        assert_eq!(p.int_bounds(), Some((Some(1), Some(9))));

        let p = Predicate::range(Some(0.0), None);
        assert_eq!(p.int_bounds(), Some((Some(0), None)));
    }

    #[test]
    fn float_range_contains() {
        let p = Predicate::Range {
            start: Some(0.0),
            end: Some(1.0),
            inclusive_start: true,
            inclusive_end: true,
        };
        assert!(p.is_proportion());
        assert!(p.contains_float(0.0));
        assert!(p.contains_float(1.0));
        assert!(!p.contains_float(1.01));
        assert!(!Predicate::range(Some(0.0), Some(1.0)).is_proportion());
    }

    #[test]
    fn predicate_display() {
        assert_eq!(
            Predicate::range(Some(0.0), None).to_string(),
            "Range(0, None)"
        );
        assert_eq!(
            Predicate::choices(["a", "b"]).to_string(),
            "Choices('a', 'b')"
        );
        let p = TypeExpr::primitive(PrimitiveName::Int, Some(Predicate::range(Some(0.0), None)));
        assert_eq!(p.to_string(), "Int % Range(0, None)");
    }

    #[test]
    fn nested_collection_rejected() {
        let expr = TypeExpr::list(TypeExpr::list(TypeExpr::int()));
        assert!(matches!(
            expr.validate("x"),
            Err(SignatureError::NestedCollection { .. })
        ));
    }

    #[test]
    fn cross_container_union_rejected() {
        let expr = TypeExpr::union(vec![
            TypeExpr::list(TypeExpr::int()),
            TypeExpr::set(TypeExpr::int()),
        ]);
        assert!(matches!(
            expr.validate("x"),
            Err(SignatureError::CrossContainerUnion { .. })
        ));
    }

    #[test]
    fn same_container_union_collapses() {
        let expr = TypeExpr::union(vec![
            TypeExpr::list(TypeExpr::int()),
            TypeExpr::list(TypeExpr::primitive(PrimitiveName::Str, None)),
        ]);
        assert!(expr.validate("x").is_ok());
        let style = expr.collection_style().unwrap();
        assert_eq!(style.container, Container::List);
        assert_eq!(style.members.len(), 2);
    }

    #[test]
    fn signature_rejects_primitive_input() {
        let sig = Signature::new(vec![SignatureEntry::new("x", Role::Input, TypeExpr::int())]);
        assert!(matches!(
            sig.validate(),
            Err(SignatureError::InvalidRole { .. })
        ));
    }

    #[test]
    fn type_expr_serde_roundtrip_keeps_tags() {
        let expr = TypeExpr::set(TypeExpr::primitive(
            PrimitiveName::Str,
            Some(Predicate::choices(["a"])),
        ));
        let json = serde_json::to_value(&expr).unwrap();
        assert_eq!(json["kind"], "collection");
        assert_eq!(json["member"]["kind"], "primitive");
        assert_eq!(json["member"]["predicate"]["name"], "Choices");
        let back: TypeExpr = serde_json::from_value(json).unwrap();
        assert_eq!(back, expr);
    }

    #[test]
    fn default_value_null_is_distinct_from_optional() {
        let entry = SignatureEntry::new("x", Role::Parameter, TypeExpr::int())
            .with_default(DefaultValue::Value(serde_json::Value::Null));
        let back: SignatureEntry =
            serde_json::from_str(&serde_json::to_string(&entry).unwrap()).unwrap();
        assert_eq!(back.default, DefaultValue::Value(serde_json::Value::Null));
    }
}
