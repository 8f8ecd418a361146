//! Property-based tests for the classification and synthesis invariants
//!
//! 1. The subtype relation stays a DAG under arbitrary edge insertion
//! 2. Relational terms carry a signature iff they are relational, whatever the oracle says
//! 3. Synthesized schemas validate and survive a render/parse round-trip

use proptest::prelude::*;
use std::collections::BTreeMap;
use theoria_model::{
    AmbiguityFlag, Category, CategoryRef, DocumentFormat, ModelType, ModelTypeDecision,
    SchemaDocument, Term, TermId,
};
use theoria_oracle::ClassificationWire;
use theoria_pipeline::classifier::{assemble, CategoryAnswer};
use theoria_pipeline::emitter::render;
use theoria_pipeline::synthesizer::synthesize;
use theoria_pipeline::{validate, SubtypeGraph};

// ============================================================================
// Strategies
// ============================================================================

fn category_strategy() -> impl Strategy<Value = Category> {
    prop::sample::select(Category::ALL.to_vec())
}

/// Up to 8 terms named `T0..Tn`; every term proposes an arbitrary parent
/// (possibly itself, possibly unknown) and an arbitrary signature.
fn answers_strategy() -> impl Strategy<Value = (Vec<Term>, Vec<CategoryAnswer>)> {
    (1usize..8).prop_flat_map(|n| {
        let reference = prop_oneof![
            (0..n).prop_map(|i| format!("T{i}")),
            Just("Entity".to_string()),
            Just("Measure".to_string()),
            Just("Nowhere".to_string()),
        ];
        let answer = (
            category_strategy(),
            prop::collection::vec(reference.clone(), 0..3),
            prop::collection::vec(reference, 0..3),
            prop::option::of(0..n + 1),
        );
        prop::collection::vec(answer, n).prop_map(move |answers| {
            let terms: Vec<Term> = (0..n).map(|i| Term::new(format!("T{i}"), "")).collect();
            let answers = answers
                .into_iter()
                .map(|(category, domain, range, parent)| {
                    let mut wire = ClassificationWire::new(category.as_str())
                        .with_signature(domain, range);
                    // n is out of range and names an unknown parent
                    if let Some(p) = parent {
                        wire = wire.with_parent(format!("T{p}"));
                    }
                    CategoryAnswer::accepted(category, wire)
                })
                .collect();
            (terms, answers)
        })
    })
}

fn decision(selected: ModelType) -> ModelTypeDecision {
    ModelTypeDecision {
        selected,
        scores: BTreeMap::from([(selected, 0.5)]),
        rationale: format!("selected {selected}"),
        composition: None,
    }
}

// ============================================================================
// Subtype DAG
// ============================================================================

proptest! {
    #[test]
    fn subtype_graph_never_admits_a_cycle(
        edges in prop::collection::vec((0u32..10, 0u32..10), 0..40)
    ) {
        let mut graph = SubtypeGraph::new(10);
        for (child, parent) in edges {
            let before = graph.edge_count();
            match graph.try_add_edge(TermId(child), TermId(parent)) {
                Ok(()) => prop_assert_eq!(graph.edge_count(), before + 1),
                Err(_) => prop_assert_eq!(graph.edge_count(), before),
            }
            prop_assert!(graph.is_acyclic());
        }
    }

    #[test]
    fn assembled_hierarchy_is_a_dag((terms, answers) in answers_strategy()) {
        let proposed: Vec<Option<String>> =
            answers.iter().map(|a| a.wire.sub_type_of.clone()).collect();
        let classified = assemble(&terms, answers);

        prop_assert_eq!(classified.len(), terms.len());
        prop_assert!(SubtypeGraph::from_terms(&classified).is_acyclic());

        for (term, parent) in classified.iter().zip(proposed) {
            // every proposed parent is either applied or flagged
            if parent.is_some() && term.sub_type_of.is_none() {
                let flagged = term.flags.iter().any(|f| matches!(
                    f,
                    AmbiguityFlag::HierarchyCycle { .. } | AmbiguityFlag::UnresolvedParent { .. }
                ));
                prop_assert!(flagged, "{} dropped its parent silently", term.name());
            }
        }
    }
}

// ============================================================================
// Domain / range
// ============================================================================

proptest! {
    #[test]
    fn signature_iff_relational((terms, answers) in answers_strategy()) {
        let classified = assemble(&terms, answers);
        let names: Vec<&str> = terms.iter().map(|t| t.name.as_str()).collect();

        for term in &classified {
            prop_assert!(term.signature_invariant_holds(), "{:?}", term);
            for reference in term.domain.iter().chain(term.range.iter()) {
                if let CategoryRef::Term(name) = reference {
                    prop_assert!(names.contains(&name.as_str()));
                }
            }
        }
    }
}

// ============================================================================
// Synthesis
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn synthesized_schemas_validate_and_round_trip(
        (terms, answers) in answers_strategy(),
        paradigm in prop::sample::select(ModelType::SINGLE.to_vec()),
    ) {
        let classified = assemble(&terms, answers);
        let schema = synthesize("Doe (2020)", "note", &classified, decision(paradigm));

        let report = validate(&schema, &classified);
        prop_assert!(report.ok, "{}", report);
        prop_assert_eq!(&schema.definitions, &classified);

        for format in [DocumentFormat::Json, DocumentFormat::Yaml] {
            let text = render(&schema, format).unwrap();
            let back = SchemaDocument::parse(&text, format)
                .unwrap()
                .into_definition()
                .unwrap();
            prop_assert_eq!(&back, &schema);
        }
    }
}
