//! resolve
//!
//! Converts command-line tokens into typed argument values.
//!
//! # Lookup order
//!
//! For every option of an action:
//!
//! 1. Tokens given on the command line
//! 2. The [`FallbackChain`] (command config file, `--output-dir`), first hit wins
//! 3. The signature default
//!
//! An option with none of these is missing. Every option is resolved before
//! anything is reported, so one [`ResolutionFailure`] lists all missing
//! options and invalid values together.
//!
//! # Example
//!
//! ```
//! use plugcli::core::types::{Role, Signature, SignatureEntry, TypeExpr};
//! use plugcli::resolve::{ArgValue, FallbackChain, RawArgs, Resolver};
//! use plugcli::translate::describe_signature;
//!
//! let signature = Signature::new(vec![SignatureEntry::new("int1", Role::Parameter, TypeExpr::int())]);
//! let groups = describe_signature(&signature).unwrap();
//!
//! let mut raw = RawArgs::default();
//! raw.push_tokens("p-int1", ["5".to_string()]);
//!
//! let chain = FallbackChain::new();
//! let resolver = Resolver::new(&chain, None);
//! let args = resolver.resolve_all(&groups, &signature, &raw).unwrap();
//! assert_eq!(args.get("int1"), Some(&ArgValue::Int(5)));
//! ```

pub mod fallback;
pub mod primitive;
pub mod reference;
pub mod value;

pub use fallback::{ConfigFallback, Fallback, FallbackChain, NotFound, OutputDirFallback};
pub use reference::{InputRef, ReferenceError};
pub use value::{ArgValue, OutputDest, ResolvedArgs};

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use thiserror::Error;

use crate::core::metadata::{Metadata, MetadataError};
use crate::core::naming::is_identifier;
use crate::core::result::QResult;
use crate::core::types::{
    Container, DefaultValue, PrimitiveName, Role, Signature, SignatureEntry, TypeExpr,
};
use crate::store::ResultCache;
use crate::translate::{OptionFlags, OptionGroup};

/// Command-line occurrences, keyed by flag name without dashes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawArgs {
    tokens: BTreeMap<String, Vec<String>>,
    flags: BTreeMap<String, bool>,
}

impl RawArgs {
    pub fn push_tokens(&mut self, flag: &str, values: impl IntoIterator<Item = String>) {
        self.tokens.entry(flag.to_string()).or_default().extend(values);
    }

    /// Record an explicit boolean under the positive flag name.
    pub fn set_flag(&mut self, flag: &str, value: bool) {
        self.flags.insert(flag.to_string(), value);
    }

    pub fn tokens(&self, flag: &str) -> Option<&[String]> {
        self.tokens.get(flag).map(Vec::as_slice)
    }

    pub fn flag(&self, flag: &str) -> Option<bool> {
        self.flags.get(flag).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.flags.is_empty()
    }
}

/// One problem with one option.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Missing option: {0}")]
    Missing(String),

    #[error("Invalid value for {option}: {message}")]
    Invalid { option: String, message: String },

    #[error("{option} received {received}, which contains duplicates of the following: {duplicates}")]
    Duplicates {
        option: String,
        received: String,
        duplicates: String,
    },

    #[error("Keyed values cannot be mixed with unkeyed values. {option} received '{value}'.")]
    MixedKeys { option: String, value: String },

    #[error("{option} was provided without {companion}. Provide both or neither.")]
    MissingCompanion { option: String, companion: String },

    #[error("Invalid value for {option}: {source}")]
    Reference {
        option: String,
        source: ReferenceError,
    },

    #[error("Invalid value for {option}: {source}")]
    Metadata {
        option: String,
        source: MetadataError,
    },
}

impl ResolveError {
    fn reference(group: &OptionGroup, source: ReferenceError) -> Self {
        ResolveError::Reference {
            option: group.display_flag(),
            source,
        }
    }

    fn invalid(group: &OptionGroup, message: impl Into<String>) -> Self {
        ResolveError::Invalid {
            option: group.display_flag(),
            message: message.into(),
        }
    }

    /// Location that ran out of space, if that is what failed.
    pub fn no_space_path(&self) -> Option<&Path> {
        match self {
            ResolveError::Reference { source, .. } => source.no_space_path(),
            _ => None,
        }
    }
}

/// Every problem found while resolving one invocation.
#[derive(Debug)]
pub struct ResolutionFailure {
    pub problems: Vec<ResolveError>,
    /// Whether any output destination was missing.
    pub missing_outputs: bool,
}

impl ResolutionFailure {
    pub fn no_space_path(&self) -> Option<&Path> {
        self.problems.iter().find_map(ResolveError::no_space_path)
    }
}

impl std::error::Error for ResolutionFailure {}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.problems.len();
        if total == 1 {
            write!(f, "There was a problem with the command:")?;
        } else {
            write!(f, "There were some problems with the command:")?;
        }
        for (i, problem) in self.problems.iter().enumerate() {
            write!(f, "\n ({}/{}) {}", i + 1, total, problem)?;
        }
        if self.missing_outputs {
            write!(
                f,
                "\nNote: every output needs a destination. Name each missing output, or use \
                 --output-dir to write all unnamed outputs into one new directory."
            )?;
        }
        Ok(())
    }
}

/// Outcome for one option.
#[derive(Debug, Clone)]
pub enum Resolution {
    Value(ArgValue),
    Output(OutputDest),
    Missing,
}

/// A converted value tagged with the token it came from.
struct Item<T> {
    token: String,
    key: Option<String>,
    value: T,
}

/// Resolves options against the command line, fallbacks and defaults.
pub struct Resolver<'a> {
    chain: &'a FallbackChain,
    use_cache: Option<&'a ResultCache>,
}

impl<'a> Resolver<'a> {
    pub fn new(chain: &'a FallbackChain, use_cache: Option<&'a ResultCache>) -> Self {
        Self { chain, use_cache }
    }

    /// Resolve every entry of `signature`; `groups` must be its descriptions.
    pub fn resolve_all(
        &self,
        groups: &[OptionGroup],
        signature: &Signature,
        raw: &RawArgs,
    ) -> Result<ResolvedArgs, ResolutionFailure> {
        let mut args = ResolvedArgs::default();
        let mut problems = Vec::new();
        let mut missing_outputs = false;

        for (group, entry) in groups.iter().zip(&signature.entries) {
            match self.resolve(group, entry, raw) {
                Ok(Resolution::Value(value)) => args.values.push((entry.name.clone(), value)),
                Ok(Resolution::Output(dest)) => args.outputs.push((entry.name.clone(), dest)),
                Ok(Resolution::Missing) => {
                    missing_outputs |= entry.role == Role::Output;
                    problems.push(ResolveError::Missing(group.display_flag()));
                }
                Err(e) => problems.push(e),
            }
        }

        if problems.is_empty() {
            Ok(args)
        } else {
            Err(ResolutionFailure {
                problems,
                missing_outputs,
            })
        }
    }

    /// Resolve one option.
    pub fn resolve(
        &self,
        group: &OptionGroup,
        entry: &SignatureEntry,
        raw: &RawArgs,
    ) -> Result<Resolution, ResolveError> {
        match &group.flags {
            OptionFlags::Paired { on, .. } => self.resolve_bool(group, entry, on, raw),
            OptionFlags::MetadataFile(file) => match self.lookup(group, file, raw) {
                Some(tokens) => Ok(Resolution::Value(ArgValue::Metadata(
                    self.merged_metadata(group, &tokens)?,
                ))),
                None => Ok(default_for(entry)),
            },
            OptionFlags::MetadataColumn { file, column } => {
                self.resolve_column(group, entry, file, column, raw)
            }
            OptionFlags::Single(flag) => {
                let Some(tokens) = self.lookup(group, flag, raw) else {
                    return Ok(default_for(entry));
                };
                match entry.role {
                    Role::Output => self.resolve_output(group, &tokens),
                    Role::Input => self.resolve_input(group, &entry.type_expr, &tokens),
                    Role::Parameter => self.resolve_parameter(group, &entry.type_expr, &tokens),
                }
            }
        }
    }

    fn lookup(&self, group: &OptionGroup, flag: &str, raw: &RawArgs) -> Option<Vec<String>> {
        match raw.tokens(flag) {
            Some(tokens) if !tokens.is_empty() => Some(tokens.to_vec()),
            _ => self.chain.lookup(group, flag).ok(),
        }
    }

    fn resolve_bool(
        &self,
        group: &OptionGroup,
        entry: &SignatureEntry,
        on: &str,
        raw: &RawArgs,
    ) -> Result<Resolution, ResolveError> {
        if let Some(value) = raw.flag(on) {
            return Ok(Resolution::Value(ArgValue::Bool(value)));
        }
        match self.chain.lookup(group, on) {
            Ok(tokens) => {
                let token = single(group, &tokens)?;
                primitive::parse_bool(token)
                    .map(|b| Resolution::Value(ArgValue::Bool(b)))
                    .ok_or_else(|| {
                        ResolveError::invalid(group, format!("'{}' is not a valid boolean.", token))
                    })
            }
            Err(NotFound) => Ok(default_for(entry)),
        }
    }

    fn resolve_output(&self, group: &OptionGroup, tokens: &[String]) -> Result<Resolution, ResolveError> {
        let token = single(group, tokens)?;
        reference::parse_output(token)
            .map(Resolution::Output)
            .map_err(|e| ResolveError::reference(group, e))
    }

    fn resolve_parameter(
        &self,
        group: &OptionGroup,
        type_expr: &TypeExpr,
        tokens: &[String],
    ) -> Result<Resolution, ResolveError> {
        let Some(style) = type_expr.collection_style() else {
            let token = single(group, tokens)?;
            return primitive::parse_value(type_expr, token)
                .map(Resolution::Value)
                .map_err(|message| ResolveError::invalid(group, message));
        };

        let member = member_type(&style.members);
        let keyed_syntax = !takes_free_text(&member);
        let mut items = Vec::new();
        for token in tokens {
            let (key, text) = match token.split_once(':') {
                Some((key, rest)) if keyed_syntax && is_identifier(key) => {
                    (Some(key.to_string()), rest)
                }
                _ => (None, token.as_str()),
            };
            let value = primitive::parse_value(&member, text)
                .map_err(|message| ResolveError::invalid(group, message))?;
            items.push(Item {
                token: token.clone(),
                key,
                value,
            });
        }
        cast_collection(group, style.container, items).map(Resolution::Value)
    }

    fn resolve_input(
        &self,
        group: &OptionGroup,
        type_expr: &TypeExpr,
        tokens: &[String],
    ) -> Result<Resolution, ResolveError> {
        let Some(style) = type_expr.collection_style() else {
            let token = single(group, tokens)?;
            let input = reference::parse_input(token, self.use_cache)
                .map_err(|e| ResolveError::reference(group, e))?;
            let loaded = input.load().map_err(|e| ResolveError::reference(group, e))?;
            return reference::expect_artifact(loaded, type_expr, token)
                .map(|a| Resolution::Value(ArgValue::Artifact(a)))
                .map_err(|e| ResolveError::reference(group, e));
        };

        let member = member_type(&style.members);
        let mut items = Vec::new();
        for token in tokens {
            let (key, input) = reference::parse_member(token, self.use_cache)
                .map_err(|e| ResolveError::reference(group, e))?;
            let loaded = input.load().map_err(|e| ResolveError::reference(group, e))?;

            // A lone reference to a stored collection supplies every member.
            if let (QResult::Collection(collection), None, 1) = (&loaded, &key, tokens.len()) {
                for (name, artifact) in &collection.members {
                    let reference = format!("{}/{}", token, name);
                    let artifact = reference::expect_artifact(
                        QResult::from(artifact.clone()),
                        &member,
                        &reference,
                    )
                    .map_err(|e| ResolveError::reference(group, e))?;
                    items.push(Item {
                        token: reference,
                        key: Some(name.clone()),
                        value: ArgValue::Artifact(artifact),
                    });
                }
                continue;
            }

            let artifact = reference::expect_artifact(loaded, &member, token)
                .map_err(|e| ResolveError::reference(group, e))?;
            items.push(Item {
                token: token.clone(),
                key,
                value: ArgValue::Artifact(artifact),
            });
        }
        cast_collection(group, style.container, items).map(Resolution::Value)
    }

    fn merged_metadata(&self, group: &OptionGroup, tokens: &[String]) -> Result<Metadata, ResolveError> {
        let mut tables = Vec::new();
        for token in tokens {
            tables.push(
                reference::load_metadata(token, self.use_cache)
                    .map_err(|e| ResolveError::reference(group, e))?,
            );
        }
        Metadata::merge(tables).map_err(|source| ResolveError::Metadata {
            option: group.display_flag(),
            source,
        })
    }

    fn resolve_column(
        &self,
        group: &OptionGroup,
        entry: &SignatureEntry,
        file: &str,
        column: &str,
        raw: &RawArgs,
    ) -> Result<Resolution, ResolveError> {
        let files = self.lookup(group, file, raw);
        let columns = self.lookup(group, column, raw);
        let (files, columns) = match (files, columns) {
            (None, None) => return Ok(default_for(entry)),
            (Some(_), None) => {
                return Err(ResolveError::MissingCompanion {
                    option: format!("--{}", file),
                    companion: format!("--{}", column),
                })
            }
            (None, Some(_)) => {
                return Err(ResolveError::MissingCompanion {
                    option: format!("--{}", column),
                    companion: format!("--{}", file),
                })
            }
            (Some(files), Some(columns)) => (files, columns),
        };

        let name = single(group, &columns)?;
        let accepts = match &entry.type_expr {
            TypeExpr::MetadataColumn { accepts } => accepts.as_slice(),
            _ => &[],
        };
        let metadata = self.merged_metadata(group, &files)?;
        metadata
            .column(name, accepts)
            .map(|c| Resolution::Value(ArgValue::MetadataColumn(c)))
            .map_err(|source| ResolveError::Metadata {
                option: format!("--{}", column),
                source,
            })
    }
}

fn single<'t>(group: &OptionGroup, tokens: &'t [String]) -> Result<&'t str, ResolveError> {
    match tokens {
        [token] => Ok(token.as_str()),
        _ => Err(ResolveError::invalid(
            group,
            format!("expected one value, received {}", tokens.len()),
        )),
    }
}

fn default_for(entry: &SignatureEntry) -> Resolution {
    match &entry.default {
        DefaultValue::Required => Resolution::Missing,
        DefaultValue::Optional => Resolution::Value(ArgValue::None),
        DefaultValue::Value(v) => Resolution::Value(primitive::from_default(&entry.type_expr, v)),
    }
}

fn member_type(members: &[&TypeExpr]) -> TypeExpr {
    match members {
        [one] => (*one).clone(),
        many => TypeExpr::union(many.iter().map(|m| (*m).clone()).collect()),
    }
}

/// Whether a member accepts arbitrary text, so `word:rest` is a whole value
/// rather than a keyed member.
fn takes_free_text(member: &TypeExpr) -> bool {
    member.leaves().iter().any(|leaf| {
        matches!(
            leaf,
            TypeExpr::Primitive(p) if matches!(p.name, PrimitiveName::Str | PrimitiveName::Color)
        )
    })
}

/// Cast converted items into the declared container.
///
/// All items must be keyed or all unkeyed. A set must not lose members to
/// de-duplication, and keys must be unique.
fn cast_collection(
    group: &OptionGroup,
    container: Container,
    items: Vec<Item<ArgValue>>,
) -> Result<ArgValue, ResolveError> {
    let keyed = items.first().is_some_and(|i| i.key.is_some());
    if let Some(odd) = items.iter().find(|i| i.key.is_some() != keyed) {
        return Err(ResolveError::MixedKeys {
            option: group.display_flag(),
            value: odd.token.clone(),
        });
    }

    let received = || {
        let tokens: Vec<&str> = items.iter().map(|i| i.token.as_str()).collect();
        format!("[{}]", tokens.join(", "))
    };

    if keyed {
        let keys: Vec<String> = items.iter().filter_map(|i| i.key.clone()).collect();
        let duplicates = duplicates(keys.iter().cloned());
        if !duplicates.is_empty() {
            return Err(ResolveError::Duplicates {
                option: group.display_flag(),
                received: received(),
                duplicates: duplicates.join(", "),
            });
        }
        if container == Container::Set {
            let dups = duplicates_of(&items);
            if !dups.is_empty() {
                return Err(ResolveError::Duplicates {
                    option: group.display_flag(),
                    received: received(),
                    duplicates: dups.join(", "),
                });
            }
        }
        return Ok(ArgValue::Keyed(
            items
                .into_iter()
                .map(|i| (i.key.unwrap_or_default(), i.value))
                .collect(),
        ));
    }

    match container {
        Container::List => Ok(ArgValue::List(items.into_iter().map(|i| i.value).collect())),
        Container::Set => {
            let dups = duplicates_of(&items);
            if !dups.is_empty() {
                return Err(ResolveError::Duplicates {
                    option: group.display_flag(),
                    received: received(),
                    duplicates: dups.join(", "),
                });
            }
            Ok(ArgValue::Set(items.into_iter().map(|i| i.value).collect()))
        }
    }
}

fn duplicates_of(items: &[Item<ArgValue>]) -> Vec<String> {
    duplicates(items.iter().map(|i| i.value.identity()))
}

/// Values that occur more than once, in first-repeat order.
fn duplicates(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut dups = Vec::new();
    for v in values {
        if !seen.insert(v.clone()) && !dups.contains(&v) {
            dups.push(v);
        }
    }
    dups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::result::Artifact;
    use crate::core::types::{ColumnKind, PrimitiveName, Predicate, SemanticType};
    use crate::translate::describe_signature;
    use serde_json::json;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn sig(entries: Vec<SignatureEntry>) -> (Signature, Vec<OptionGroup>) {
        let signature = Signature::new(entries);
        let groups = describe_signature(&signature).unwrap();
        (signature, groups)
    }

    fn raw(pairs: &[(&str, &str)]) -> RawArgs {
        let mut raw = RawArgs::default();
        for (flag, value) in pairs {
            raw.push_tokens(flag, [value.to_string()]);
        }
        raw
    }

    fn resolve(
        signature: &Signature,
        groups: &[OptionGroup],
        raw: &RawArgs,
    ) -> Result<ResolvedArgs, ResolutionFailure> {
        let chain = FallbackChain::new();
        Resolver::new(&chain, None).resolve_all(groups, signature, raw)
    }

    #[test]
    fn all_missing_reported_together() {
        let (signature, groups) = sig(vec![
            SignatureEntry::new("ints1", Role::Input, TypeExpr::semantic("IntSequence1")),
            SignatureEntry::new("ints2", Role::Input, TypeExpr::semantic("IntSequence1")),
            SignatureEntry::new("result", Role::Output, TypeExpr::semantic("IntSequence1")),
        ]);
        let failure = resolve(&signature, &groups, &RawArgs::default()).unwrap_err();

        assert_eq!(failure.problems.len(), 3);
        assert!(failure.missing_outputs);
        let text = failure.to_string();
        assert!(text.contains("(2/3) Missing option: --i-ints2"));
        assert!(text.contains("--output-dir"));
    }

    #[test]
    fn bool_tri_state() {
        let (signature, groups) = sig(vec![SignatureEntry::new(
            "flag",
            Role::Parameter,
            TypeExpr::primitive(PrimitiveName::Bool, None),
        )
        .with_default(DefaultValue::Optional)]);

        let absent = resolve(&signature, &groups, &RawArgs::default()).unwrap();
        assert_eq!(absent.get("flag"), Some(&ArgValue::None));

        let mut on = RawArgs::default();
        on.set_flag("p-flag", true);
        assert_eq!(
            resolve(&signature, &groups, &on).unwrap().get("flag"),
            Some(&ArgValue::Bool(true))
        );

        let mut off = RawArgs::default();
        off.set_flag("p-flag", false);
        assert_eq!(
            resolve(&signature, &groups, &off).unwrap().get("flag"),
            Some(&ArgValue::Bool(false))
        );
    }

    #[test]
    fn config_text_booleans() {
        let (signature, groups) = sig(vec![SignatureEntry::new(
            "flag",
            Role::Parameter,
            TypeExpr::primitive(PrimitiveName::Bool, None),
        )]);
        let mut section = crate::core::config::CommandSection::new();
        section.insert("p-flag".into(), vec!["Off".into()]);
        let chain = FallbackChain::new().with(ConfigFallback::new(section));

        let args = Resolver::new(&chain, None)
            .resolve_all(&groups, &signature, &RawArgs::default())
            .unwrap();
        assert_eq!(args.get("flag"), Some(&ArgValue::Bool(false)));
    }

    #[test]
    fn command_line_beats_config() {
        let (signature, groups) = sig(vec![SignatureEntry::new(
            "int1",
            Role::Parameter,
            TypeExpr::int(),
        )]);
        let mut section = crate::core::config::CommandSection::new();
        section.insert("p-int1".into(), vec!["1".into()]);
        let chain = FallbackChain::new().with(ConfigFallback::new(section));
        let resolver = Resolver::new(&chain, None);

        let from_cli = resolver
            .resolve_all(&groups, &signature, &raw(&[("p-int1", "7")]))
            .unwrap();
        assert_eq!(from_cli.get("int1"), Some(&ArgValue::Int(7)));

        let from_config = resolver
            .resolve_all(&groups, &signature, &RawArgs::default())
            .unwrap();
        assert_eq!(from_config.get("int1"), Some(&ArgValue::Int(1)));
    }

    #[test]
    fn range_violation_reported() {
        let (signature, groups) = sig(vec![SignatureEntry::new(
            "int1",
            Role::Parameter,
            TypeExpr::primitive(PrimitiveName::Int, Some(Predicate::range(Some(0.0), None))),
        )]);
        let failure = resolve(&signature, &groups, &raw(&[("p-int1", "-5")])).unwrap_err();
        assert!(failure.to_string().contains("-5 is not in the range x>=0."));
    }

    #[test]
    fn set_duplicates_named() {
        let (signature, groups) = sig(vec![SignatureEntry::new(
            "ints",
            Role::Parameter,
            TypeExpr::set(TypeExpr::int()),
        )]);
        let mut r = RawArgs::default();
        r.push_tokens("p-ints", ["1", "2", "1"].map(String::from));
        let failure = resolve(&signature, &groups, &r).unwrap_err();
        assert!(matches!(
            &failure.problems[0],
            ResolveError::Duplicates { duplicates, .. } if duplicates == "1"
        ));
    }

    #[test]
    fn list_keeps_duplicates_and_order() {
        let (signature, groups) = sig(vec![SignatureEntry::new(
            "ints",
            Role::Parameter,
            TypeExpr::list(TypeExpr::int()),
        )]);
        let mut r = RawArgs::default();
        r.push_tokens("p-ints", ["3", "1", "3"].map(String::from));
        let args = resolve(&signature, &groups, &r).unwrap();
        assert_eq!(
            args.get("ints"),
            Some(&ArgValue::List(vec![
                ArgValue::Int(3),
                ArgValue::Int(1),
                ArgValue::Int(3)
            ]))
        );
    }

    #[test]
    fn keyed_and_mixed_collections() {
        let (signature, groups) = sig(vec![SignatureEntry::new(
            "ints",
            Role::Parameter,
            TypeExpr::list(TypeExpr::int()),
        )]);

        let mut keyed = RawArgs::default();
        keyed.push_tokens("p-ints", ["foo:0", "bar:1"].map(String::from));
        let args = resolve(&signature, &groups, &keyed).unwrap();
        assert_eq!(
            args.get("ints"),
            Some(&ArgValue::Keyed(vec![
                ("foo".into(), ArgValue::Int(0)),
                ("bar".into(), ArgValue::Int(1))
            ]))
        );

        let mut mixed = RawArgs::default();
        mixed.push_tokens("p-ints", ["foo:0", "1"].map(String::from));
        let failure = resolve(&signature, &groups, &mixed).unwrap_err();
        assert!(matches!(
            &failure.problems[0],
            ResolveError::MixedKeys { value, .. } if value == "1"
        ));
    }

    #[test]
    fn str_members_keep_colons() {
        let (signature, groups) = sig(vec![
            SignatureEntry::new(
                "urls",
                Role::Parameter,
                TypeExpr::list(TypeExpr::primitive(PrimitiveName::Str, None)),
            ),
            SignatureEntry::new(
                "tags",
                Role::Parameter,
                TypeExpr::set(TypeExpr::primitive(PrimitiveName::Str, None)),
            ),
        ]);

        let mut raw = RawArgs::default();
        raw.push_tokens(
            "p-urls",
            ["https://example.org/a", "plain", "ftp:b"].map(String::from),
        );
        raw.push_tokens("p-tags", ["http://x", "k:v"].map(String::from));
        let args = resolve(&signature, &groups, &raw).unwrap();
        assert_eq!(
            args.get("urls"),
            Some(&ArgValue::List(vec![
                ArgValue::Str("https://example.org/a".into()),
                ArgValue::Str("plain".into()),
                ArgValue::Str("ftp:b".into()),
            ]))
        );
        assert_eq!(
            args.get("tags"),
            Some(&ArgValue::Set(vec![
                ArgValue::Str("http://x".into()),
                ArgValue::Str("k:v".into()),
            ]))
        );
    }

    #[test]
    fn artifact_inputs_and_collection_expansion() {
        let temp = TempDir::new().unwrap();
        let cache = ResultCache::create(&temp.path().join("cache")).unwrap();
        let one = Artifact::new(SemanticType::new("SingleInt"), json!(1));
        let two = Artifact::new(SemanticType::new("SingleInt"), json!(2));
        cache
            .save_collection(
                &crate::core::result::ResultCollection::new(vec![
                    ("a".into(), one.clone()),
                    ("b".into(), two.clone()),
                ]),
                "pair",
            )
            .unwrap();

        let (signature, groups) = sig(vec![SignatureEntry::new(
            "ints",
            Role::Input,
            TypeExpr::list(TypeExpr::semantic("SingleInt")),
        )]);
        let token = format!("{}:pair", cache.path().display());
        let args = resolve(&signature, &groups, &raw(&[("i-ints", token.as_str())])).unwrap();
        match args.get("ints") {
            Some(ArgValue::Keyed(members)) => {
                assert_eq!(members.len(), 2);
                assert_eq!(members[0].0, "a");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn metadata_column_needs_both_parts() {
        let temp = TempDir::new().unwrap();
        let tsv = temp.path().join("md.tsv");
        fs::write(&tsv, "id\tsite\tdepth\ns1\tnorth\t1\ns2\tsouth\t2\n").unwrap();

        let (signature, groups) = sig(vec![SignatureEntry::new(
            "md",
            Role::Parameter,
            TypeExpr::MetadataColumn {
                accepts: vec![ColumnKind::Numeric],
            },
        )]);

        let failure = resolve(
            &signature,
            &groups,
            &raw(&[("m-md-file", tsv.to_str().unwrap())]),
        )
        .unwrap_err();
        assert!(failure.to_string().contains("--m-md-column"));

        let failure = resolve(
            &signature,
            &groups,
            &raw(&[("m-md-file", tsv.to_str().unwrap()), ("m-md-column", "site")]),
        )
        .unwrap_err();
        assert!(failure.to_string().contains("is categorical, expected numeric"));

        let args = resolve(
            &signature,
            &groups,
            &raw(&[("m-md-file", tsv.to_str().unwrap()), ("m-md-column", "depth")]),
        )
        .unwrap();
        assert!(matches!(args.get("md"), Some(ArgValue::MetadataColumn(c)) if c.name == "depth"));
    }

    #[test]
    fn output_dir_fills_missing_outputs() {
        let temp = TempDir::new().unwrap();
        let (signature, groups) = sig(vec![
            SignatureEntry::new("left", Role::Output, TypeExpr::semantic("IntSequence1")),
            SignatureEntry::new("right", Role::Output, TypeExpr::semantic("IntSequence1")),
        ]);
        let dir = temp.path().join("out");
        let chain = FallbackChain::new().with(OutputDirFallback::new(dir.clone()));
        let explicit = temp.path().join("mine");

        let args = Resolver::new(&chain, None)
            .resolve_all(&groups, &signature, &raw(&[("o-left", explicit.to_str().unwrap())]))
            .unwrap();

        assert!(matches!(args.output("left"), Some(OutputDest::Path(p)) if *p == explicit));
        assert!(
            matches!(args.output("right"), Some(OutputDest::Path(p)) if *p == PathBuf::from(&dir).join("right"))
        );
    }
}
