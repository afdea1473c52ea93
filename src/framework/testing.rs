//! framework::testing
//!
//! In-process dummy deployment.
//!
//! # Plugins
//!
//! - `dummy_plugin` - integer sequence actions covering every signature
//!   shape the command line supports (unions, predicates, collections,
//!   metadata, visualizers, a resumable pipeline, a failing action); the
//!   plugin and `concatenate_ints` declare citations
//! - `other_plugin` - a single trivial action, no citations
//!
//! # Data
//!
//! `IntSequence1`/`IntSequence2` hold a JSON array of integers, `SingleInt`
//! an integer, and `Mapping` an object of strings (viewable as metadata).
//!
//! Setting `PLUGCLI_TEST_VERSION` changes the reported plugin versions, which
//! simulates an upgraded deployment.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::io::Write;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use super::{ExecContext, Framework, FrameworkError, InvokeError, Requirement};
use crate::core::citation::Citation;
use crate::core::result::{Artifact, QResult, ResultCollection};
use crate::core::types::{
    ActionKind, ActionRecord, ColumnKind, DefaultValue, PluginRecord, Predicate, PrimitiveName,
    Role, SemanticType, Signature, SignatureEntry, TypeExpr, UsageExample,
};
use crate::resolve::{ArgValue, ResolvedArgs};
use crate::store::Pool;

const DEFAULT_VERSION: &str = "0.1.0";

/// The dummy framework.
#[derive(Debug, Default)]
pub struct DummyFramework {
    introspections: Cell<usize>,
}

impl DummyFramework {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times [`Framework::introspect`] has run.
    pub fn introspection_count(&self) -> usize {
        self.introspections.get()
    }

    fn version() -> String {
        std::env::var("PLUGCLI_TEST_VERSION")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_VERSION.to_string())
    }
}

fn input(name: &str, type_expr: TypeExpr, description: &str) -> SignatureEntry {
    SignatureEntry::new(name, Role::Input, type_expr).with_description(description)
}

fn param(name: &str, type_expr: TypeExpr, description: &str) -> SignatureEntry {
    SignatureEntry::new(name, Role::Parameter, type_expr).with_description(description)
}

fn output(name: &str, type_expr: TypeExpr, description: &str) -> SignatureEntry {
    SignatureEntry::new(name, Role::Output, type_expr).with_description(description)
}

fn int_sequence() -> TypeExpr {
    TypeExpr::union(vec![
        TypeExpr::semantic("IntSequence1"),
        TypeExpr::semantic("IntSequence2"),
    ])
}

fn prim(name: PrimitiveName) -> TypeExpr {
    TypeExpr::primitive(name, None)
}

fn action(
    id: &str,
    kind: ActionKind,
    description: &str,
    entries: Vec<SignatureEntry>,
) -> ActionRecord {
    ActionRecord {
        id: id.to_string(),
        name: id.replace('_', " "),
        description: description.to_string(),
        kind,
        signature: Signature::new(entries),
        deprecated: false,
        examples: Vec::new(),
        citations: Vec::new(),
    }
}

fn plugin_citations() -> Vec<Citation> {
    vec![Citation::new("doe2024", "article")
        .field("author", "Doe, Jane and Roe, Richard")
        .field("title", "Integer sequences as a test bed for plugin front ends")
        .field("journal", "Journal of Test Fixtures")
        .field("year", "2024")]
}

fn dummy_actions() -> Vec<ActionRecord> {
    let mut concatenate = action(
        "concatenate_ints",
        ActionKind::Method,
        "This method concatenates integers from two sequences, followed by an extra integer.",
        vec![
            input("ints1", int_sequence(), "The first sequence of integers."),
            input("ints2", int_sequence(), "The second sequence of integers."),
            param(
                "int1",
                TypeExpr::primitive(PrimitiveName::Int, Some(Predicate::range(Some(0.0), None))),
                "An integer appended after both sequences.",
            ),
            output(
                "result",
                TypeExpr::semantic("IntSequence1"),
                "The concatenated sequence.",
            ),
        ],
    );
    concatenate.examples = vec![UsageExample {
        name: "concatenate_ints_simple".to_string(),
        lines: vec![
            "plug dummy-plugin concatenate-ints \\".to_string(),
            "  --i-ints1 ints-a.art \\".to_string(),
            "  --i-ints2 ints-b.art \\".to_string(),
            "  --p-int1 4 \\".to_string(),
            "  --o-result concatenated.art".to_string(),
        ],
    }];
    concatenate.citations = vec![Citation::new("knuth1997", "book")
        .field("author", "Knuth, Donald E.")
        .field("title", "The Art of Computer Programming, Volume 1")
        .field("publisher", "Addison-Wesley")
        .field("year", "1997")];

    let split = action(
        "split_ints",
        ActionKind::Method,
        "Split a sequence of integers in half.",
        vec![
            input("ints", TypeExpr::semantic("IntSequence1"), "The sequence to split."),
            output("left", TypeExpr::semantic("IntSequence1"), "First half."),
            output("right", TypeExpr::semantic("IntSequence1"), "Second half."),
        ],
    );

    let params_only = action(
        "params_only_method",
        ActionKind::Method,
        "Record every parameter value in a mapping.",
        vec![
            param("name", prim(PrimitiveName::Str), "A name."),
            param(
                "age",
                TypeExpr::primitive(
                    PrimitiveName::Int,
                    Some(Predicate::Range {
                        start: Some(0.0),
                        end: Some(150.0),
                        inclusive_start: false,
                        inclusive_end: true,
                    }),
                ),
                "An age in years.",
            ),
            param(
                "kind",
                TypeExpr::primitive(PrimitiveName::Str, Some(Predicate::choices(["cat", "dog"]))),
                "The kind of animal.",
            )
            .with_default(DefaultValue::Value(json!("cat"))),
            param(
                "ratio",
                TypeExpr::primitive(
                    PrimitiveName::Float,
                    Some(Predicate::Range {
                        start: Some(0.0),
                        end: Some(1.0),
                        inclusive_start: true,
                        inclusive_end: true,
                    }),
                ),
                "A proportion.",
            )
            .with_default(DefaultValue::Value(json!(0.5))),
            param("flag", prim(PrimitiveName::Bool), "An optional switch.")
                .with_default(DefaultValue::Optional),
            param(
                "threshold",
                TypeExpr::union(vec![prim(PrimitiveName::Int), prim(PrimitiveName::Str)]),
                "A number or the word 'auto'.",
            )
            .with_default(DefaultValue::Optional),
            param("color", prim(PrimitiveName::Color), "A plot color.")
                .with_default(DefaultValue::Optional),
            output("out", TypeExpr::semantic("Mapping"), "The recorded values."),
        ],
    );

    let list_params = action(
        "list_params",
        ActionKind::Method,
        "Turn a list of integers into a collection of artifacts.",
        vec![
            param("ints", TypeExpr::list(prim(PrimitiveName::Int)), "Integers."),
            output(
                "output",
                TypeExpr::list(TypeExpr::semantic("SingleInt")),
                "One artifact per integer.",
            ),
        ],
    );

    let set_params = action(
        "set_params",
        ActionKind::Method,
        "Sum a set of distinct integers.",
        vec![
            param("ints", TypeExpr::set(prim(PrimitiveName::Int)), "Distinct integers."),
            output("total", TypeExpr::semantic("SingleInt"), "Their sum."),
        ],
    );

    let list_of_strs = action(
        "list_of_strs",
        ActionKind::Method,
        "Record a list of strings, such as URLs, in a mapping.",
        vec![
            param("labels", TypeExpr::list(prim(PrimitiveName::Str)), "Free-form strings."),
            output("out", TypeExpr::semantic("Mapping"), "Position to string."),
        ],
    );

    let list_of_ints = action(
        "list_of_ints",
        ActionKind::Method,
        "Pass a collection of integer artifacts through unchanged.",
        vec![
            input(
                "ints",
                TypeExpr::list(TypeExpr::semantic("SingleInt")),
                "The collection.",
            ),
            output(
                "output",
                TypeExpr::list(TypeExpr::semantic("SingleInt")),
                "The same collection.",
            ),
        ],
    );

    let identity_with_metadata = action(
        "identity_with_metadata",
        ActionKind::Method,
        "Return the input unchanged after reading metadata.",
        vec![
            input("ints", int_sequence(), "Any sequence."),
            param("metadata", TypeExpr::Metadata, "Sample metadata."),
            output("out", TypeExpr::semantic("IntSequence1"), "The same sequence."),
        ],
    );

    let identity_with_column = action(
        "identity_with_metadata_column",
        ActionKind::Method,
        "Return the input unchanged after reading one metadata column.",
        vec![
            input("ints", int_sequence(), "Any sequence."),
            param(
                "metadata",
                TypeExpr::MetadataColumn {
                    accepts: vec![ColumnKind::Categorical, ColumnKind::Numeric],
                },
                "A metadata column.",
            ),
            output("out", TypeExpr::semantic("IntSequence1"), "The same sequence."),
        ],
    );

    let numeric_column = action(
        "identity_with_numeric_column",
        ActionKind::Method,
        "Like identity_with_metadata_column but only numeric columns are accepted.",
        vec![
            input("ints", int_sequence(), "Any sequence."),
            param(
                "metadata",
                TypeExpr::MetadataColumn {
                    accepts: vec![ColumnKind::Numeric],
                },
                "A numeric metadata column.",
            )
            .with_default(DefaultValue::Optional),
            output("out", TypeExpr::semantic("IntSequence1"), "The same sequence."),
        ],
    );

    let viz = action(
        "most_common_viz",
        ActionKind::Visualizer,
        "Visualize the most common integers.",
        vec![
            input("ints", int_sequence(), "The sequence."),
            output("visualization", TypeExpr::Visualization, "The counts table."),
        ],
    );

    let pipeline = action(
        "resumable_pipeline",
        ActionKind::Pipeline,
        "Concatenate, split and visualize. Recorded steps are reused when rerun.",
        vec![
            input("ints1", TypeExpr::semantic("IntSequence1"), "First sequence."),
            input("ints2", TypeExpr::semantic("IntSequence1"), "Second sequence."),
            param("fail", prim(PrimitiveName::Bool), "Fail after the split step.")
                .with_default(DefaultValue::Value(json!(false))),
            output("concatenated", TypeExpr::semantic("IntSequence1"), "Both sequences."),
            output("left", TypeExpr::semantic("IntSequence1"), "First half."),
            output("right", TypeExpr::semantic("IntSequence1"), "Second half."),
            output("viz", TypeExpr::Visualization, "Counts of the concatenation."),
        ],
    );

    let mut deprecated = action(
        "deprecated_method",
        ActionKind::Method,
        "An old way to build a single integer.",
        vec![
            param("value", prim(PrimitiveName::Int), "The value."),
            output("out", TypeExpr::semantic("SingleInt"), "The value as an artifact."),
        ],
    );
    deprecated.deprecated = true;

    let failing = action(
        "failing_method",
        ActionKind::Method,
        "Always raises an error.",
        vec![
            param("message", prim(PrimitiveName::Str), "Error text.")
                .with_default(DefaultValue::Value(json!("deliberate failure"))),
            output("out", TypeExpr::semantic("SingleInt"), "Never produced."),
        ],
    );

    vec![
        concatenate,
        split,
        params_only,
        list_params,
        set_params,
        list_of_strs,
        list_of_ints,
        identity_with_metadata,
        identity_with_column,
        numeric_column,
        viz,
        pipeline,
        deprecated,
        failing,
    ]
}

fn plugin(
    id: &str,
    version: &str,
    description: &str,
    citations: Vec<Citation>,
    actions: Vec<ActionRecord>,
) -> PluginRecord {
    PluginRecord {
        id: id.to_string(),
        name: id.replace('_', "-"),
        version: version.to_string(),
        website: format!("https://example.org/{}", id.replace('_', "-")),
        user_support_text: "Please open an issue on the project tracker.".to_string(),
        description: description.to_string(),
        short_description: description
            .split('.')
            .next()
            .unwrap_or(description)
            .to_string(),
        citations,
        actions: actions.into_iter().map(|a| (a.id.clone(), a)).collect(),
    }
}

impl Framework for DummyFramework {
    fn requirements(&self) -> Result<Vec<Requirement>, FrameworkError> {
        let version = Self::version();
        Ok(vec![
            Requirement::new("dummy-plugin", version.clone()),
            Requirement::new("other-plugin", version),
            Requirement::tool(),
        ])
    }

    fn introspect(&self) -> Result<Vec<PluginRecord>, FrameworkError> {
        self.introspections.set(self.introspections.get() + 1);
        let version = Self::version();
        Ok(vec![
            plugin(
                "dummy_plugin",
                &version,
                "Dummy plugin for exercising the command line. Every action works on integers.",
                plugin_citations(),
                dummy_actions(),
            ),
            plugin(
                "other_plugin",
                &version,
                "Second plugin. It exists so the root listing has company.",
                Vec::new(),
                vec![action(
                    "make_int",
                    ActionKind::Method,
                    "Wrap an integer in an artifact.",
                    vec![
                        param("value", prim(PrimitiveName::Int), "The value."),
                        output("out", TypeExpr::semantic("SingleInt"), "The artifact."),
                    ],
                )],
            ),
        ])
    }

    fn invoke(
        &self,
        plugin: &PluginRecord,
        action: &ActionRecord,
        args: &ResolvedArgs,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Vec<(String, QResult)>, InvokeError> {
        writeln!(ctx.log, "Running {} {}", plugin.id, action.id)?;
        let outputs = match action.id.as_str() {
            "concatenate_ints" => {
                let mut all = ints_of(args, "ints1")?;
                all.extend(ints_of(args, "ints2")?);
                all.push(int_param(args, "int1")?);
                vec![("result", seq(all))]
            }
            "split_ints" => {
                let all = ints_of(args, "ints")?;
                let (left, right) = all.split_at(all.len() / 2);
                vec![("left", seq(left.to_vec())), ("right", seq(right.to_vec()))]
            }
            "params_only_method" => {
                let record: BTreeMap<String, String> = args
                    .values
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_string()))
                    .collect();
                vec![(
                    "out",
                    QResult::Artifact(Artifact::new(SemanticType::new("Mapping"), json!(record))),
                )]
            }
            "list_params" => {
                let members = match arg(args, "ints")? {
                    ArgValue::Keyed(items) => items
                        .iter()
                        .map(|(k, v)| Ok((k.clone(), single_int(as_int(v)?))))
                        .collect::<Result<Vec<_>, InvokeError>>()?,
                    other => other
                        .members()
                        .iter()
                        .enumerate()
                        .map(|(i, v)| Ok((i.to_string(), single_int(as_int(v)?))))
                        .collect::<Result<Vec<_>, InvokeError>>()?,
                };
                vec![("output", QResult::Collection(ResultCollection::new(members)))]
            }
            "set_params" => {
                let total = arg(args, "ints")?
                    .members()
                    .iter()
                    .map(|v| as_int(v))
                    .sum::<Result<i64, InvokeError>>()?;
                vec![("total", QResult::Artifact(single_int(total)))]
            }
            "list_of_strs" => {
                let record: BTreeMap<String, String> = arg(args, "labels")?
                    .members()
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), v.to_string()))
                    .collect();
                vec![(
                    "out",
                    QResult::Artifact(Artifact::new(SemanticType::new("Mapping"), json!(record))),
                )]
            }
            "list_of_ints" => {
                let members = match arg(args, "ints")? {
                    ArgValue::Keyed(items) => items
                        .iter()
                        .map(|(k, v)| Ok((k.clone(), as_artifact(v)?.clone())))
                        .collect::<Result<Vec<_>, InvokeError>>()?,
                    other => other
                        .members()
                        .iter()
                        .enumerate()
                        .map(|(i, v)| Ok((i.to_string(), as_artifact(v)?.clone())))
                        .collect::<Result<Vec<_>, InvokeError>>()?,
                };
                vec![("output", QResult::Collection(ResultCollection::new(members)))]
            }
            "identity_with_metadata" | "identity_with_metadata_column" | "identity_with_numeric_column" => {
                match arg(args, "metadata")? {
                    ArgValue::Metadata(md) => {
                        writeln!(ctx.log, "metadata: {} ids, columns {:?}", md.ids.len(), md.column_names())?;
                    }
                    ArgValue::MetadataColumn(col) => {
                        writeln!(ctx.log, "column {} ({}): {} values", col.name, col.kind, col.values.len())?;
                    }
                    _ => writeln!(ctx.log, "no metadata")?,
                }
                vec![("out", seq(ints_of(args, "ints")?))]
            }
            "most_common_viz" => {
                let all = ints_of(args, "ints")?;
                vec![("visualization", counts_viz(&all))]
            }
            "resumable_pipeline" => return resumable_pipeline(plugin, action, args, ctx),
            "deprecated_method" | "make_int" => {
                vec![("out", QResult::Artifact(single_int(int_param(args, "value")?)))]
            }
            "failing_method" => {
                let message = arg(args, "message")?.to_string();
                writeln!(ctx.log, "about to fail")?;
                return Err(InvokeError::Failed(message));
            }
            other => return Err(InvokeError::Failed(format!("unknown action '{}'", other))),
        };

        Ok(outputs
            .into_iter()
            .map(|(name, result)| (name.to_string(), with_provenance(result, plugin, action)))
            .collect())
    }
}

fn with_provenance(result: QResult, plugin: &PluginRecord, action: &ActionRecord) -> QResult {
    match result {
        QResult::Artifact(a) => QResult::Artifact(a.with_provenance(&plugin.id, &action.id)),
        QResult::Visualization(v) => {
            QResult::Visualization(v.with_provenance(&plugin.id, &action.id))
        }
        QResult::Collection(c) => QResult::Collection(ResultCollection::new(
            c.members
                .into_iter()
                .map(|(k, a)| (k, a.with_provenance(&plugin.id, &action.id)))
                .collect(),
        )),
    }
}

fn arg<'a>(args: &'a ResolvedArgs, name: &str) -> Result<&'a ArgValue, InvokeError> {
    args.get(name)
        .ok_or_else(|| InvokeError::Failed(format!("missing argument '{}'", name)))
}

fn as_int(value: &ArgValue) -> Result<i64, InvokeError> {
    value
        .as_int()
        .ok_or_else(|| InvokeError::Failed(format!("expected an integer, got {}", value)))
}

fn as_artifact(value: &ArgValue) -> Result<&Artifact, InvokeError> {
    value
        .as_artifact()
        .ok_or_else(|| InvokeError::Failed(format!("expected an artifact, got {}", value)))
}

fn int_param(args: &ResolvedArgs, name: &str) -> Result<i64, InvokeError> {
    as_int(arg(args, name)?)
}

fn ints_of(args: &ResolvedArgs, name: &str) -> Result<Vec<i64>, InvokeError> {
    artifact_ints(as_artifact(arg(args, name)?)?)
}

fn artifact_ints(artifact: &Artifact) -> Result<Vec<i64>, InvokeError> {
    serde_json::from_value(artifact.data.clone())
        .map_err(|e| InvokeError::Failed(format!("artifact {} is not a sequence: {}", artifact.uuid, e)))
}

fn seq(values: Vec<i64>) -> QResult {
    QResult::Artifact(Artifact::new(SemanticType::new("IntSequence1"), json!(values)))
}

fn single_int(value: i64) -> Artifact {
    Artifact::new(SemanticType::new("SingleInt"), json!(value))
}

fn counts_viz(values: &[i64]) -> QResult {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(*v).or_default() += 1;
    }
    let rows: String = counts
        .iter()
        .map(|(v, c)| format!("<tr><td>{}</td><td>{}</td></tr>", v, c))
        .collect();
    QResult::Visualization(Artifact::visualization(json!({
        "index.html": format!("<table><tr><th>Value</th><th>Count</th></tr>{}</table>", rows),
    })))
}

/// Step id: step name plus a digest of what the step consumes.
fn step_id(name: &str, consumed: &Value) -> String {
    let digest = Sha256::digest(consumed.to_string().as_bytes());
    format!("{}:{}", name, hex::encode(&digest[..8]))
}

fn run_step(
    pool: Option<&Pool>,
    log: &mut dyn Write,
    id: &str,
    produce: impl FnOnce() -> Artifact,
) -> Result<Artifact, InvokeError> {
    if let Some(pool) = pool {
        if let Some(found) = pool.lookup(id)? {
            writeln!(log, "reusing {} from pool {}", id, pool.name())?;
            return Ok(found);
        }
    }
    let artifact = produce();
    if let Some(pool) = pool {
        pool.record(id, &artifact)?;
    }
    Ok(artifact)
}

fn resumable_pipeline(
    plugin: &PluginRecord,
    action: &ActionRecord,
    args: &ResolvedArgs,
    ctx: &mut ExecContext<'_>,
) -> Result<Vec<(String, QResult)>, InvokeError> {
    if let Some(parallel) = ctx.parallel {
        writeln!(
            ctx.log,
            "Running with executor '{}' ({} workers)",
            parallel.default,
            parallel.workers()
        )?;
    }

    let ints1 = as_artifact(arg(args, "ints1")?)?;
    let ints2 = as_artifact(arg(args, "ints2")?)?;
    let fail = arg(args, "fail")?.as_bool().unwrap_or(false);

    let mut all = artifact_ints(ints1)?;
    all.extend(artifact_ints(ints2)?);
    let concat_id = step_id("concatenate", &json!([ints1.uuid, ints2.uuid]));
    let concatenated = run_step(ctx.pool, &mut *ctx.log, &concat_id, || {
        Artifact::new(SemanticType::new("IntSequence1"), json!(all))
    })?;

    let values = artifact_ints(&concatenated)?;
    let (l, r) = values.split_at(values.len() / 2);
    let left = run_step(ctx.pool, &mut *ctx.log, &step_id("left", &json!(concatenated.uuid)), || {
        Artifact::new(SemanticType::new("IntSequence1"), json!(l))
    })?;
    let right = run_step(ctx.pool, &mut *ctx.log, &step_id("right", &json!(concatenated.uuid)), || {
        Artifact::new(SemanticType::new("IntSequence1"), json!(r))
    })?;

    if fail {
        return Err(InvokeError::Failed(format!(
            "Pipeline failed after recording steps: {}, {}, {}",
            concatenated.uuid, left.uuid, right.uuid
        )));
    }

    let viz = match counts_viz(&values) {
        QResult::Visualization(v) => v,
        other => return Err(InvokeError::Failed(format!("unexpected {}", other.type_name()))),
    };

    Ok(vec![
        ("concatenated".to_string(), QResult::Artifact(concatenated)),
        ("left".to_string(), QResult::Artifact(left)),
        ("right".to_string(), QResult::Artifact(right)),
        (
            "viz".to_string(),
            QResult::Visualization(viz.with_provenance(&plugin.id, &action.id)),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::LogSink;
    use crate::store::ResultCache;
    use tempfile::TempDir;

    fn dummy_action(id: &str) -> (PluginRecord, ActionRecord) {
        let framework = DummyFramework::new();
        let plugin = framework
            .introspect()
            .unwrap()
            .into_iter()
            .find(|p| p.id == "dummy_plugin")
            .unwrap();
        let action = plugin.actions[id].clone();
        (plugin, action)
    }

    fn seq_arg(values: &[i64]) -> ArgValue {
        ArgValue::Artifact(Artifact::new(SemanticType::new("IntSequence1"), json!(values)))
    }

    #[test]
    fn every_signature_is_valid() {
        let framework = DummyFramework::new();
        for plugin in framework.introspect().unwrap() {
            for action in plugin.actions.values() {
                action.signature.validate().unwrap();
            }
        }
        assert_eq!(framework.introspection_count(), 1);
    }

    #[test]
    fn requirements_include_tool() {
        let reqs = DummyFramework::new().requirements().unwrap();
        assert!(reqs.contains(&Requirement::tool()));
    }

    #[test]
    fn concatenate_appends_int() {
        let (plugin, action) = dummy_action("concatenate_ints");
        let args = ResolvedArgs {
            values: vec![
                ("ints1".into(), seq_arg(&[0, 1])),
                ("ints2".into(), seq_arg(&[2])),
                ("int1".into(), ArgValue::Int(5)),
            ],
            outputs: Vec::new(),
        };
        let mut log = LogSink::Terminal;
        let mut ctx = ExecContext {
            log: &mut log,
            pool: None,
            parallel: None,
        };

        let outputs = DummyFramework::new()
            .invoke(&plugin, &action, &args, &mut ctx)
            .unwrap();

        let QResult::Artifact(result) = &outputs[0].1 else {
            panic!("expected artifact");
        };
        assert_eq!(result.data, json!([0, 1, 2, 5]));
        assert_eq!(result.provenance.as_ref().unwrap().action, "concatenate_ints");
    }

    #[test]
    fn pipeline_reuses_pool_after_failure() {
        let temp = TempDir::new().unwrap();
        let cache = ResultCache::create(&temp.path().join("cache")).unwrap();
        let pool = cache.create_pool("p").unwrap();
        let (plugin, action) = dummy_action("resumable_pipeline");

        let ints1 = seq_arg(&[1, 2]);
        let ints2 = seq_arg(&[3, 4]);
        let mut args = ResolvedArgs {
            values: vec![
                ("ints1".into(), ints1),
                ("ints2".into(), ints2),
                ("fail".into(), ArgValue::Bool(true)),
            ],
            outputs: Vec::new(),
        };

        let mut log = LogSink::Terminal;
        let framework = DummyFramework::new();
        let err = framework
            .invoke(
                &plugin,
                &action,
                &args,
                &mut ExecContext {
                    log: &mut log,
                    pool: Some(&pool),
                    parallel: None,
                },
            )
            .unwrap_err();
        assert!(err.to_string().contains("Pipeline failed"));
        assert_eq!(pool.len(), 3);

        args.values[2].1 = ArgValue::Bool(false);
        let outputs = framework
            .invoke(
                &plugin,
                &action,
                &args,
                &mut ExecContext {
                    log: &mut log,
                    pool: Some(&pool),
                    parallel: None,
                },
            )
            .unwrap();
        let QResult::Artifact(concatenated) = &outputs[0].1 else {
            panic!("expected artifact");
        };
        assert!(err.to_string().contains(&concatenated.uuid.to_string()));
    }

    #[test]
    fn failing_method_reports_message() {
        let (plugin, action) = dummy_action("failing_method");
        let args = ResolvedArgs {
            values: vec![("message".into(), ArgValue::Str("boom".into()))],
            outputs: Vec::new(),
        };
        let mut log = LogSink::Terminal;
        let err = DummyFramework::new()
            .invoke(
                &plugin,
                &action,
                &args,
                &mut ExecContext {
                    log: &mut log,
                    pool: None,
                    parallel: None,
                },
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
