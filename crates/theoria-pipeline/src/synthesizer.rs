//! Phase 3: Schema Synthesizer
//!
//! Lays the classified terms out under the root roles of the selected
//! paradigm. Root properties only *reference* terms by name; the catalogue in
//! `definitions` is the classified list itself, in order, so no term can be
//! dropped or duplicated here.
//!
//! For a hybrid, each sub-paradigm lays out only the terms assigned to it and
//! its keys are tagged with the paradigm (`sequence:stages`). The joins from
//! the composition become `crossParadigmMapping`.

use crate::signals::TermMarkers;
use std::collections::BTreeMap;
use theoria_model::{
    Category, ClassifiedTerm, HybridComposition, LinkKind, ModelType, ModelTypeDecision,
    RootEntry, RootPropertySpec, RootRole, SchemaDefinition,
};
use tracing::debug;

pub fn synthesize(
    citation: &str,
    annotation: &str,
    classified: &[ClassifiedTerm],
    decision: ModelTypeDecision,
) -> SchemaDefinition {
    let selected = decision.selected;
    let mut root_properties = BTreeMap::new();

    match (selected, &decision.composition) {
        (ModelType::Hybrid, Some(composition)) => {
            for paradigm in &composition.paradigms {
                let members: Vec<&ClassifiedTerm> = classified
                    .iter()
                    .filter(|t| composition.assignments.get(&t.term.name) == Some(paradigm))
                    .collect();
                lay_out(&mut root_properties, selected, *paradigm, &members, classified);
            }
            root_properties.insert(
                RootRole::CrossParadigmMapping.key().to_string(),
                cross_paradigm_mapping(composition),
            );
        }
        (ModelType::Hybrid, None) => {
            // nothing to compose; the validator reports the missing composition
            root_properties.insert(
                RootRole::CrossParadigmMapping.key().to_string(),
                RootPropertySpec::new(RootRole::CrossParadigmMapping, ModelType::Hybrid),
            );
        }
        (paradigm, _) => {
            let members: Vec<&ClassifiedTerm> = classified.iter().collect();
            lay_out(&mut root_properties, selected, paradigm, &members, classified);
        }
    }

    debug!(
        model_type = %selected,
        roots = root_properties.len(),
        definitions = classified.len(),
        "schema synthesized"
    );

    SchemaDefinition {
        citation: citation.to_string(),
        annotation: annotation.to_string(),
        model_type: decision,
        root_properties,
        definitions: classified.to_vec(),
    }
}

fn lay_out(
    roots: &mut BTreeMap<String, RootPropertySpec>,
    selected: ModelType,
    paradigm: ModelType,
    members: &[&ClassifiedTerm],
    all: &[ClassifiedTerm],
) {
    for (role, items) in role_items(paradigm, members, all) {
        let mut spec = RootPropertySpec::new(role, paradigm);
        spec.items = items;
        roots.insert(role.root_key(selected, paradigm), spec);
    }
}

/// Items for each of `paradigm`'s roles, in role order.
pub fn role_items(
    paradigm: ModelType,
    members: &[&ClassifiedTerm],
    all: &[ClassifiedTerm],
) -> Vec<(RootRole, Vec<RootEntry>)> {
    let pick = |pred: &dyn Fn(&ClassifiedTerm) -> bool| -> Vec<RootEntry> {
        members.iter().filter(|t| pred(t)).map(|t| entry(t)).collect()
    };
    let marked = |pred: fn(&TermMarkers) -> bool| {
        move |t: &ClassifiedTerm| pred(&TermMarkers::of(t))
    };

    match paradigm {
        ModelType::PropertyGraph => vec![
            (RootRole::Nodes, pick(&|t| !t.is_relational())),
            (RootRole::Edges, pick(&|t| t.is_relational())),
        ],
        ModelType::TableMatrix => {
            let is_column = |t: &ClassifiedTerm| {
                matches!(
                    t.category,
                    Category::Property | Category::Measure | Category::Modifier
                )
            };
            vec![
                (RootRole::Rows, pick(&|t| t.category == Category::Entity)),
                (RootRole::Columns, pick(&is_column)),
                (
                    RootRole::Cells,
                    pick(&|t| t.category != Category::Entity && !is_column(t)),
                ),
            ]
        }
        ModelType::Sequence => vec![
            (RootRole::Stages, pick(&|t| !t.is_relational())),
            (RootRole::Transitions, pick(&|t| t.is_relational())),
        ],
        ModelType::Tree => vec![
            (RootRole::Nodes, pick(&|t| !t.is_relational())),
            (RootRole::ParentOf, parent_of(members, all)),
        ],
        ModelType::Timeline => vec![
            (
                RootRole::Events,
                pick(&|t| !t.is_relational() || t.category == Category::Action),
            ),
            (
                RootRole::Ordering,
                pick(&|t| t.category == Category::Relationship),
            ),
        ],
        ModelType::Statistical => {
            let parameter = marked(|m| m.parameter);
            let distribution = marked(|m| m.distribution);
            let is_parameter =
                |t: &ClassifiedTerm| parameter(t) || t.category == Category::Modifier;
            let is_distribution = |t: &ClassifiedTerm| !is_parameter(t) && distribution(t);
            vec![
                (
                    RootRole::Variables,
                    pick(&|t| !t.is_relational() && !is_parameter(t) && !is_distribution(t)),
                ),
                (
                    RootRole::Distributions,
                    pick(&|t| !t.is_relational() && is_distribution(t)),
                ),
                (
                    RootRole::Parameters,
                    pick(&|t| !t.is_relational() && is_parameter(t)),
                ),
            ]
        }
        ModelType::Logical => vec![
            (
                RootRole::Propositions,
                pick(&|t| !t.is_relational() && t.category != Category::Operator),
            ),
            (
                RootRole::InferenceRules,
                pick(&|t| t.is_relational() || t.category == Category::Operator),
            ),
        ],
        ModelType::Causal => {
            let intervention = marked(|m| m.intervention);
            let interventions: Vec<&ClassifiedTerm> = members
                .iter()
                .copied()
                .filter(|t| !t.is_relational() && intervention(t))
                .collect();
            let edges = members
                .iter()
                .filter(|t| t.is_relational())
                .map(|t| causal_edge(t, &interventions, intervention(t)))
                .collect();
            vec![
                (
                    RootRole::Variables,
                    pick(&|t| !t.is_relational() && !intervention(t)),
                ),
                (RootRole::CausalEdges, edges),
                (
                    RootRole::Interventions,
                    interventions.iter().map(|t| entry(t)).collect(),
                ),
            ]
        }
        ModelType::Hybrid => Vec::new(),
    }
}

/// A root item for a term; relational terms carry their endpoints.
fn entry(term: &ClassifiedTerm) -> RootEntry {
    if term.is_relational() {
        RootEntry::edge(
            term.term.name.clone(),
            term.domain.iter().map(ToString::to_string).collect(),
            term.range.iter().map(ToString::to_string).collect(),
        )
    } else {
        RootEntry::term(term.term.name.clone())
    }
}

/// One entry per parent among `members`, listing its direct children.
fn parent_of(members: &[&ClassifiedTerm], all: &[ClassifiedTerm]) -> Vec<RootEntry> {
    members
        .iter()
        .filter_map(|parent| {
            let children: Vec<String> = all
                .iter()
                .filter(|c| c.sub_type_of == Some(parent.id))
                .map(|c| c.term.name.clone())
                .collect();
            (!children.is_empty())
                .then(|| RootEntry::edge(parent.term.name.clone(), Vec::new(), children))
        })
        .collect()
}

/// A causal edge is intervenable when its cause is an intervention term, or
/// when the edge itself is described as one.
fn causal_edge(
    term: &ClassifiedTerm,
    interventions: &[&ClassifiedTerm],
    self_marked: bool,
) -> RootEntry {
    let causes: Vec<&str> = term
        .domain
        .iter()
        .filter_map(|r| r.as_term())
        .filter(|name| interventions.iter().any(|i| i.term.name == *name))
        .collect();

    let mut edge = entry(term).with_meta(
        "intervenable",
        (self_marked || !causes.is_empty()).to_string(),
    );
    if !causes.is_empty() {
        edge = edge.with_meta("intervention", causes.join(", "));
    }
    edge
}

pub fn link_kind_name(kind: LinkKind) -> &'static str {
    match kind {
        LinkKind::SharedEndpoint => "shared_endpoint",
        LinkKind::SharedReference => "shared_reference",
        LinkKind::Anchor => "anchor",
    }
}

fn cross_paradigm_mapping(composition: &HybridComposition) -> RootPropertySpec {
    let mut spec = RootPropertySpec::new(RootRole::CrossParadigmMapping, ModelType::Hybrid);
    spec.items = composition
        .links
        .iter()
        .map(|link| {
            let paradigms: Vec<&str> = link.paradigms.iter().map(ModelType::as_str).collect();
            RootEntry::term(link.key.clone())
                .with_meta("kind", link_kind_name(link.kind))
                .with_meta("paradigms", paradigms.join(","))
        })
        .collect();
    spec
}
