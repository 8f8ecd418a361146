//! End-to-end runs against a scripted oracle.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use theoria_model::{
    DocumentFormat, IssueCode, LinkKind, ModelType, SchemaDefinition, SchemaDocument,
};
use theoria_oracle::{
    ClassificationWire, ExtractedTermWire, OracleClient, OracleClientConfig, ScriptedOracle,
};
use theoria_pipeline::emitter::render;
use theoria_pipeline::{Emitter, OutcomeKind, Paper, PaperResult, Pipeline, PipelineConfig, PipelineError};

struct Script<'a> {
    name: &'a str,
    context: &'a str,
    answer: ClassificationWire,
}

fn entry<'a>(name: &'a str, context: &'a str, answer: ClassificationWire) -> Script<'a> {
    Script {
        name,
        context,
        answer,
    }
}

fn scripted(entries: &[Script<'_>]) -> ScriptedOracle {
    let proposed: Vec<ExtractedTermWire> = entries
        .iter()
        .map(|e| ExtractedTermWire::new(e.name).with_context(e.context))
        .collect();
    entries
        .iter()
        .fold(ScriptedOracle::new().extract_terms(&proposed), |oracle, e| {
            oracle.classify_as(e.name, e.answer.clone())
        })
}

fn config() -> PipelineConfig {
    PipelineConfig {
        oracle: OracleClientConfig {
            jitter: false,
            ..OracleClientConfig::default()
        },
        ..PipelineConfig::default()
    }
}

fn pipeline(oracle: ScriptedOracle, out: &Path) -> Pipeline {
    let config = config();
    let client = OracleClient::new(Arc::new(oracle), &config.oracle);
    Pipeline::with_client(Arc::new(config), client).with_emitter(Emitter::new(out, DocumentFormat::Json))
}

fn schema_of(result: &PaperResult) -> &SchemaDefinition {
    match result.outcome.schema() {
        Some(schema) => schema,
        None => panic!("expected a schema, got {}", result.outcome.report()),
    }
}

fn root_names(schema: &SchemaDefinition, key: &str) -> Vec<String> {
    schema
        .root(key)
        .unwrap_or_else(|| panic!("missing root `{key}`"))
        .items
        .iter()
        .map(|i| i.term.clone())
        .collect()
}

fn entity() -> ClassificationWire {
    ClassificationWire::new("entity")
}

fn graph_script() -> Vec<Script<'static>> {
    vec![
        entry("A", "A is one party.", entity()),
        entry("B", "B is the other party.", entity()),
        entry(
            "R",
            "R relates A to B.",
            ClassificationWire::new("relationship").with_signature(["A"], ["B"]),
        ),
    ]
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn sparse_relations_become_a_property_graph() {
    let dir = tempfile::tempdir().unwrap();
    let result = pipeline(scripted(&graph_script()), dir.path())
        .run(Paper::new("Doe (2020)", "A is one party. B is the other party. R relates A to B."))
        .await;

    assert_eq!(result.outcome.kind(), OutcomeKind::Success);
    let schema = schema_of(&result);
    assert_eq!(schema.model_type.selected, ModelType::PropertyGraph);
    assert_eq!(root_names(schema, "nodes"), vec!["A", "B"]);
    assert_eq!(root_names(schema, "edges"), vec!["R"]);

    let receipt = result.outcome.receipt().unwrap();
    assert!(receipt.path.exists());
}

#[tokio::test]
async fn cross_tabulation_becomes_a_table() {
    let dir = tempfile::tempdir().unwrap();
    let script = vec![
        entry("Row Factor", "Each row lists one school.", entity()),
        entry("Column Factor", "Each column lists one grade.", entity()),
        entry(
            "Cell Count",
            "Each cell of the 2x2 table holds a count.",
            ClassificationWire::new("measure"),
        ),
        entry("Grade", "Grade labels a column.", ClassificationWire::new("property")),
    ];
    let result = pipeline(scripted(&script), dir.path())
        .run(Paper::new("Roe (2019)", "Rows and columns of a 2x2 table."))
        .await;

    let schema = schema_of(&result);
    assert_eq!(schema.model_type.selected, ModelType::TableMatrix);
    assert_eq!(root_names(schema, "rows"), vec!["Row Factor", "Column Factor"]);
    assert_eq!(root_names(schema, "columns"), vec!["Cell Count", "Grade"]);
    assert!(root_names(schema, "cells").is_empty());
}

#[tokio::test]
async fn causal_vocabulary_becomes_a_causal_model() {
    let dir = tempfile::tempdir().unwrap();
    let script = vec![
        entry(
            "Tutoring Intervention",
            "The tutoring intervention is assigned by lottery.",
            entity(),
        ),
        entry(
            "Achievement",
            "Achievement is the outcome of interest in the causal analysis.",
            entity(),
        ),
        entry(
            "Counterfactual Achievement",
            "Counterfactual achievement is the score without tutoring.",
            ClassificationWire::new("measure"),
        ),
        entry(
            "raises",
            "A tutoring intervention raises achievement as a causal effect.",
            ClassificationWire::new("relationship")
                .with_signature(["Tutoring Intervention"], ["Achievement"]),
        ),
    ];
    let result = pipeline(scripted(&script), dir.path())
        .run(Paper::new("Poe (2018)", "Tutoring raises achievement."))
        .await;

    let schema = schema_of(&result);
    assert_eq!(schema.model_type.selected, ModelType::Causal);
    assert_eq!(root_names(schema, "interventions"), vec!["Tutoring Intervention"]);
    assert_eq!(
        root_names(schema, "variables"),
        vec!["Achievement", "Counterfactual Achievement"]
    );

    let edges = &schema.root("causalEdges").unwrap().items;
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].from, vec!["Tutoring Intervention"]);
    assert_eq!(edges[0].metadata["intervenable"], "true");
    assert_eq!(edges[0].metadata["intervention"], "Tutoring Intervention");
}

#[tokio::test]
async fn staged_cyclic_vocabulary_becomes_a_hybrid() {
    let dir = tempfile::tempdir().unwrap();
    let script = vec![
        entry("Learner", "A Learner works with a Tutor.", entity()),
        entry("Tutor", "A Tutor supports the Learner.", entity()),
        entry("Novice Stage", "The Novice Stage is where practice begins.", entity()),
        entry("Expert Stage", "The Expert Stage closes the progression.", entity()),
        entry("Practice Phase", "Each Practice Phase repeats drills.", entity()),
        entry(
            "Motivation",
            "Motivation rises at each stage.",
            ClassificationWire::new("property"),
        ),
        entry(
            "mentors",
            "A Tutor mentors the Learner.",
            ClassificationWire::new("relationship").with_signature(["Tutor"], ["Learner"]),
        ),
        entry(
            "consults",
            "A Learner consults the Tutor.",
            ClassificationWire::new("action").with_signature(["Learner"], ["Tutor"]),
        ),
    ];
    let result = pipeline(scripted(&script), dir.path())
        .run(Paper::new("Lee (2017)", "Learners move through stages with tutors."))
        .await;

    assert_eq!(result.outcome.kind(), OutcomeKind::Success);
    let schema = schema_of(&result);
    assert_eq!(schema.model_type.selected, ModelType::Hybrid);

    let composition = schema.model_type.composition.as_ref().unwrap();
    assert_eq!(
        composition.paradigms,
        vec![ModelType::Sequence, ModelType::PropertyGraph]
    );
    assert_eq!(composition.assignments.len(), 8);
    assert!(composition
        .links
        .iter()
        .any(|l| l.kind == LinkKind::SharedEndpoint));

    assert!(!root_names(schema, "crossParadigmMapping").is_empty());
    assert_eq!(
        root_names(schema, "sequence:stages"),
        vec!["Novice Stage", "Expert Stage", "Practice Phase", "Motivation"]
    );
    assert_eq!(root_names(schema, "property_graph:nodes"), vec!["Learner", "Tutor"]);
    assert_eq!(schema.definitions.len(), 8);
}

// ============================================================================
// Failure and determinism
// ============================================================================

#[tokio::test(start_paused = true)]
async fn oracle_timeouts_hard_fail_without_emitting() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("schemas");
    let config = PipelineConfig {
        oracle: OracleClientConfig {
            jitter: false,
            call_timeout_ms: 1_000,
            ..OracleClientConfig::default()
        },
        ..PipelineConfig::default()
    };
    let oracle = scripted(&graph_script()).with_latency(Duration::from_secs(30));
    let client = OracleClient::new(Arc::new(oracle), &config.oracle);
    let pipeline = Pipeline::with_client(Arc::new(config), client)
        .with_emitter(Emitter::new(&out, DocumentFormat::Json));

    let result = pipeline.run(Paper::new("Doe (2020)", "A relates to B.")).await;

    assert_eq!(result.outcome.kind(), OutcomeKind::HardFail);
    assert!(result.outcome.report().has_code(IssueCode::OracleUnavailable));
    assert!(matches!(
        result.outcome.error(),
        Some(PipelineError::OracleUnavailable(_))
    ));
    assert_eq!(pipeline.oracle().calls_made(), 3);
    assert!(!out.exists());
}

#[tokio::test]
async fn identical_input_gives_identical_bytes() {
    let text = "A is one party. B is the other party. R relates A to B.";
    let first_dir = tempfile::tempdir().unwrap();
    let second_dir = tempfile::tempdir().unwrap();

    let first = pipeline(scripted(&graph_script()), first_dir.path())
        .run(Paper::new("Doe (2020)", text))
        .await;
    let second = pipeline(scripted(&graph_script()), second_dir.path())
        .run(Paper::new("Doe (2020)", text))
        .await;

    let a = std::fs::read(&first.outcome.receipt().unwrap().path).unwrap();
    let b = std::fs::read(&second.outcome.receipt().unwrap().path).unwrap();
    assert_eq!(a, b);
    assert_eq!(
        first.outcome.receipt().unwrap().sha256,
        second.outcome.receipt().unwrap().sha256
    );

    let yaml_a = render(schema_of(&first), DocumentFormat::Yaml).unwrap();
    let yaml_b = render(schema_of(&second), DocumentFormat::Yaml).unwrap();
    assert_eq!(yaml_a, yaml_b);
}

#[tokio::test]
async fn emitted_documents_parse_back_to_the_same_schema() {
    let dir = tempfile::tempdir().unwrap();
    let result = pipeline(scripted(&graph_script()), dir.path())
        .run(Paper::new("Doe (2020)", "R relates A to B."))
        .await;

    let written = std::fs::read_to_string(&result.outcome.receipt().unwrap().path).unwrap();
    let parsed = SchemaDocument::parse(&written, DocumentFormat::Json)
        .unwrap()
        .into_definition()
        .unwrap();
    assert_eq!(&parsed, schema_of(&result));
    assert!(theoria_pipeline::validate_standalone(&parsed).ok);
}
