//! translate
//!
//! Turns signature type expressions into command-line options.
//!
//! # Rules
//!
//! | Type                         | Option                              | Arity    |
//! |------------------------------|-------------------------------------|----------|
//! | `Bool`                       | `--p-x` / `--p-no-x`                | flag     |
//! | other primitive              | `--p-x VALUE`                       | single   |
//! | artifact / visualization     | `--i-x ARTIFACT`, `--o-x ARTIFACT`  | single   |
//! | `List[..]` / `Set[..]`       | value repeated                      | multiple |
//! | `Metadata`                   | `--m-x-file METADATA`               | multiple |
//! | `MetadataColumn[..]`         | `--m-x-file` plus `--m-x-column`    | paired   |
//!
//! Every option is optional as far as clap is concerned. Requiredness,
//! predicates and container casting are enforced when arguments are
//! resolved, so that all problems with an invocation surface together.

use std::fmt;

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches};

use crate::core::naming::{option_name, role_prefix, to_cli_name};
use crate::core::types::{
    DefaultValue, Primitive, PrimitiveName, Role, Signature, SignatureEntry, SignatureError,
    TypeExpr,
};
use crate::resolve::RawArgs;

/// Help heading for input options.
pub const INPUTS_HEADING: &str = "Inputs";
/// Help heading for parameter options.
pub const PARAMETERS_HEADING: &str = "Parameters";
/// Help heading for output options.
pub const OUTPUTS_HEADING: &str = "Outputs";
/// Help heading for options every action command carries.
pub const MISC_HEADING: &str = "Miscellaneous";

/// How many values an option takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Single,
    Multiple,
}

/// The flags an entry is exposed as, without leading dashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionFlags {
    Single(String),
    Paired { on: String, off: String },
    MetadataFile(String),
    MetadataColumn { file: String, column: String },
}

impl OptionFlags {
    /// The flag named in errors about this entry.
    pub fn primary(&self) -> &str {
        match self {
            OptionFlags::Single(name) | OptionFlags::MetadataFile(name) => name,
            OptionFlags::Paired { on, .. } => on,
            OptionFlags::MetadataColumn { file, .. } => file,
        }
    }

    /// Every flag, in declaration order.
    pub fn all(&self) -> Vec<&str> {
        match self {
            OptionFlags::Single(name) | OptionFlags::MetadataFile(name) => vec![name],
            OptionFlags::Paired { on, off } => vec![on, off],
            OptionFlags::MetadataColumn { file, column } => vec![file, column],
        }
    }
}

/// Requiredness shown in help.
#[derive(Debug, Clone, PartialEq)]
pub enum RequirementLabel {
    Required,
    Optional,
    Default(String),
}

impl fmt::Display for RequirementLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequirementLabel::Required => f.write_str("[required]"),
            RequirementLabel::Optional => f.write_str("[optional]"),
            RequirementLabel::Default(v) => write!(f, "[default: {}]", v),
        }
    }
}

impl From<&DefaultValue> for RequirementLabel {
    fn from(default: &DefaultValue) -> Self {
        match default {
            DefaultValue::Required => RequirementLabel::Required,
            DefaultValue::Optional | DefaultValue::Value(serde_json::Value::Null) => {
                RequirementLabel::Optional
            }
            DefaultValue::Value(serde_json::Value::String(s)) => {
                RequirementLabel::Default(format!("'{}'", s))
            }
            DefaultValue::Value(v) => RequirementLabel::Default(v.to_string()),
        }
    }
}

/// Command-line surface of one signature entry.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionGroup {
    /// Signature entry name.
    pub name: String,
    pub role: Role,
    pub flags: OptionFlags,
    pub arity: Arity,
    pub requirement: RequirementLabel,
    /// Placeholder with multiplicity suffix, e.g. `INTEGERS...`.
    pub metavar: String,
    pub type_repr: String,
    pub description: Option<String>,
    /// Whether values may start with `-`.
    pub numeric: bool,
}

/// Placeholder for a single value of `type_expr`.
pub fn metavar(type_expr: &TypeExpr) -> &'static str {
    match type_expr {
        TypeExpr::Primitive(p) => primitive_metavar(p),
        TypeExpr::Semantic(_) => "ARTIFACT",
        TypeExpr::Visualization => "VISUALIZATION",
        TypeExpr::Metadata | TypeExpr::MetadataColumn { .. } => "METADATA",
        TypeExpr::Collection { member, .. } => metavar(member),
        TypeExpr::Union { .. } => match type_expr.leaves().as_slice() {
            [single] => metavar(single),
            leaves if leaves.iter().all(|t| t.is_semantic()) => "ARTIFACT",
            _ => "VALUE",
        },
    }
}

fn primitive_metavar(p: &Primitive) -> &'static str {
    match p.name {
        PrimitiveName::Int => "INTEGER",
        PrimitiveName::Str => "TEXT",
        PrimitiveName::Float => {
            if p.predicate.as_ref().is_some_and(|pred| pred.is_proportion()) {
                "PROPORTION"
            } else {
                "NUMBER"
            }
        }
        PrimitiveName::Bool => "",
        PrimitiveName::Color => "COLOR",
    }
}

/// Plural placeholder for a repeatable option.
///
/// ```
/// use plugcli::translate::pluralize;
///
/// assert_eq!(pluralize("INTEGER"), "INTEGERS...");
/// assert_eq!(pluralize("TEXT"), "TEXT...");
/// ```
pub fn pluralize(singular: &str) -> String {
    match singular {
        "TEXT" | "" | "METADATA" => format!("{}...", singular),
        other => format!("{}S...", other),
    }
}

/// How many values `type_expr` takes.
pub fn arity(type_expr: &TypeExpr) -> Arity {
    if type_expr.collection_style().is_some() || type_expr.is_metadata() {
        Arity::Multiple
    } else {
        Arity::Single
    }
}

fn is_numeric(type_expr: &TypeExpr) -> bool {
    type_expr.leaves().iter().any(|t| {
        matches!(
            t,
            TypeExpr::Primitive(Primitive {
                name: PrimitiveName::Int | PrimitiveName::Float,
                ..
            })
        )
    })
}

/// Describe one signature entry.
pub fn describe(entry: &SignatureEntry) -> OptionGroup {
    let type_expr = &entry.type_expr;
    let cli = to_cli_name(&entry.name);
    let flags = match type_expr {
        TypeExpr::Metadata => OptionFlags::MetadataFile(format!("m-{}-file", cli)),
        TypeExpr::MetadataColumn { .. } => OptionFlags::MetadataColumn {
            file: format!("m-{}-file", cli),
            column: format!("m-{}-column", cli),
        },
        TypeExpr::Primitive(Primitive {
            name: PrimitiveName::Bool,
            ..
        }) => OptionFlags::Paired {
            on: option_name(entry.role, &entry.name),
            off: format!("{}-no-{}", role_prefix(entry.role), cli),
        },
        _ => OptionFlags::Single(option_name(entry.role, &entry.name)),
    };

    let arity = arity(type_expr);
    let singular = metavar(type_expr);
    let metavar = match arity {
        Arity::Multiple => pluralize(singular),
        Arity::Single => singular.to_string(),
    };

    OptionGroup {
        name: entry.name.clone(),
        role: entry.role,
        flags,
        arity,
        requirement: RequirementLabel::from(&entry.default),
        metavar,
        type_repr: type_expr.to_string(),
        description: entry.description.clone(),
        numeric: is_numeric(type_expr),
    }
}

/// Describe every entry of a signature, in signature order.
///
/// Fails if the signature is structurally invalid, which includes
/// cross-container unions.
pub fn describe_signature(signature: &Signature) -> Result<Vec<OptionGroup>, SignatureError> {
    signature.validate()?;
    Ok(signature.entries.iter().map(describe).collect())
}

impl OptionGroup {
    pub fn heading(&self) -> &'static str {
        match self.role {
            Role::Input => INPUTS_HEADING,
            Role::Parameter => PARAMETERS_HEADING,
            Role::Output => OUTPUTS_HEADING,
        }
    }

    /// Primary flag with dashes, e.g. `--p-int1`.
    pub fn display_flag(&self) -> String {
        format!("--{}", self.flags.primary())
    }

    /// Help line: type, description and requirement label.
    pub fn help(&self) -> String {
        let mut help = self.type_repr.clone();
        if let Some(description) = &self.description {
            help.push_str("  ");
            help.push_str(description);
        }
        help.push(' ');
        help.push_str(&self.requirement.to_string());
        help
    }

    fn value_name(&self) -> String {
        self.metavar.trim_end_matches("...").to_string()
    }

    fn value_arg(&self, id: &str) -> Arg {
        let arg = Arg::new(id.to_string())
            .long(id.to_string())
            .value_name(self.value_name())
            .help_heading(self.heading())
            .allow_negative_numbers(self.numeric);
        match self.arity {
            Arity::Single => arg.action(ArgAction::Set).num_args(1),
            Arity::Multiple => arg.action(ArgAction::Append).num_args(1..),
        }
    }

    /// clap arguments for this group.
    pub fn to_args(&self) -> Vec<Arg> {
        match &self.flags {
            OptionFlags::Single(name) | OptionFlags::MetadataFile(name) => {
                vec![self.value_arg(name).help(self.help())]
            }
            OptionFlags::Paired { on, off } => vec![
                Arg::new(on.clone())
                    .long(on.clone())
                    .action(ArgAction::SetTrue)
                    .conflicts_with(off.clone())
                    .help(self.help())
                    .help_heading(self.heading()),
                Arg::new(off.clone())
                    .long(off.clone())
                    .action(ArgAction::SetTrue)
                    .help(format!("Opposite of --{}", on))
                    .help_heading(self.heading()),
            ],
            OptionFlags::MetadataColumn { file, column } => vec![
                self.value_arg(file)
                    .help(format!("Metadata file or artifact viewable as metadata. {}", self.requirement)),
                Arg::new(column.clone())
                    .long(column.clone())
                    .value_name("COLUMN")
                    .action(ArgAction::Set)
                    .num_args(1)
                    .help(self.help())
                    .help_heading(self.heading()),
            ],
        }
    }

    /// Copy this group's command-line occurrences into `raw`.
    pub fn collect(&self, matches: &ArgMatches, raw: &mut RawArgs) {
        match &self.flags {
            OptionFlags::Paired { on, off } => {
                if explicit(matches, on) {
                    raw.set_flag(on, true);
                } else if explicit(matches, off) {
                    raw.set_flag(on, false);
                }
            }
            flags => {
                for id in flags.all() {
                    if let Ok(Some(values)) = matches.try_get_many::<String>(id) {
                        raw.push_tokens(id, values.cloned());
                    }
                }
            }
        }
    }
}

fn explicit(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ColumnKind, Predicate};
    use clap::Command;
    use serde_json::json;

    fn entry(role: Role, name: &str, t: TypeExpr) -> SignatureEntry {
        SignatureEntry::new(name, role, t)
    }

    #[test]
    fn bool_is_paired() {
        let group = describe(&entry(
            Role::Parameter,
            "verbose_out",
            TypeExpr::primitive(PrimitiveName::Bool, None),
        ));
        assert_eq!(
            group.flags,
            OptionFlags::Paired {
                on: "p-verbose-out".into(),
                off: "p-no-verbose-out".into()
            }
        );
        assert_eq!(group.metavar, "");
    }

    #[test]
    fn proportion_metavar() {
        let proportion = TypeExpr::primitive(
            PrimitiveName::Float,
            Some(Predicate::Range {
                start: Some(0.0),
                end: Some(1.0),
                inclusive_start: true,
                inclusive_end: true,
            }),
        );
        assert_eq!(metavar(&proportion), "PROPORTION");

        let half_open = TypeExpr::primitive(
            PrimitiveName::Float,
            Some(Predicate::range(Some(0.0), Some(1.0))),
        );
        assert_eq!(metavar(&half_open), "NUMBER");
    }

    #[test]
    fn collections_pluralize() {
        let ints = describe(&entry(
            Role::Parameter,
            "ints",
            TypeExpr::list(TypeExpr::int()),
        ));
        assert_eq!(ints.arity, Arity::Multiple);
        assert_eq!(ints.metavar, "INTEGERS...");

        let texts = describe(&entry(
            Role::Parameter,
            "names",
            TypeExpr::set(TypeExpr::primitive(PrimitiveName::Str, None)),
        ));
        assert_eq!(texts.metavar, "TEXT...");

        let artifacts = describe(&entry(
            Role::Input,
            "ints",
            TypeExpr::list(TypeExpr::semantic("SingleInt")),
        ));
        assert_eq!(artifacts.metavar, "ARTIFACTS...");
    }

    #[test]
    fn metadata_column_pairs_options() {
        let group = describe(&entry(
            Role::Parameter,
            "sample_md",
            TypeExpr::MetadataColumn {
                accepts: vec![ColumnKind::Numeric],
            },
        ));
        assert_eq!(
            group.flags,
            OptionFlags::MetadataColumn {
                file: "m-sample-md-file".into(),
                column: "m-sample-md-column".into()
            }
        );
        assert_eq!(group.metavar, "METADATA...");
        assert_eq!(group.to_args().len(), 2);
    }

    #[test]
    fn requirement_labels() {
        let required = describe(&entry(Role::Parameter, "a", TypeExpr::int()));
        assert_eq!(required.requirement.to_string(), "[required]");

        let optional = describe(
            &entry(Role::Parameter, "a", TypeExpr::int()).with_default(DefaultValue::Optional),
        );
        assert_eq!(optional.requirement.to_string(), "[optional]");

        let valued = describe(
            &entry(Role::Parameter, "a", TypeExpr::primitive(PrimitiveName::Str, None))
                .with_default(DefaultValue::Value(json!("cat"))),
        );
        assert_eq!(valued.requirement.to_string(), "[default: 'cat']");
    }

    #[test]
    fn cross_container_union_rejected() {
        let sig = Signature::new(vec![entry(
            Role::Parameter,
            "ints",
            TypeExpr::union(vec![
                TypeExpr::list(TypeExpr::int()),
                TypeExpr::set(TypeExpr::int()),
            ]),
        )]);
        assert!(describe_signature(&sig).is_err());
    }

    #[test]
    fn collect_reads_matches() {
        let groups = vec![
            describe(&entry(Role::Parameter, "int1", TypeExpr::int())),
            describe(&entry(
                Role::Parameter,
                "flag",
                TypeExpr::primitive(PrimitiveName::Bool, None),
            )),
            describe(&entry(
                Role::Parameter,
                "ints",
                TypeExpr::list(TypeExpr::int()),
            )),
        ];
        let cmd = groups
            .iter()
            .flat_map(|g| g.to_args())
            .fold(Command::new("t"), |cmd, arg| cmd.arg(arg));

        let matches = cmd
            .try_get_matches_from([
                "t", "--p-int1", "-5", "--p-no-flag", "--p-ints", "1", "2", "--p-ints", "3",
            ])
            .unwrap();
        let mut raw = RawArgs::default();
        for g in &groups {
            g.collect(&matches, &mut raw);
        }

        assert_eq!(raw.tokens("p-int1"), Some(&["-5".to_string()][..]));
        assert_eq!(raw.flag("p-flag"), Some(false));
        assert_eq!(raw.tokens("p-ints").map(|t| t.len()), Some(3));
    }

    #[test]
    fn both_bool_forms_conflict() {
        let group = describe(&entry(
            Role::Parameter,
            "flag",
            TypeExpr::primitive(PrimitiveName::Bool, None),
        ));
        let cmd = group
            .to_args()
            .into_iter()
            .fold(Command::new("t"), |cmd, arg| cmd.arg(arg));
        assert!(cmd
            .try_get_matches_from(["t", "--p-flag", "--p-no-flag"])
            .is_err());
    }

    #[test]
    fn repeated_single_option_is_error() {
        let group = describe(&entry(Role::Parameter, "int1", TypeExpr::int()));
        let cmd = group
            .to_args()
            .into_iter()
            .fold(Command::new("t"), |cmd, arg| cmd.arg(arg));
        assert!(cmd
            .try_get_matches_from(["t", "--p-int1", "1", "--p-int1", "2"])
            .is_err());
    }
}
