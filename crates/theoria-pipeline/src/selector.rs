//! Model Type Selector
//!
//! ```text
//! ClassifiedTerm[] ──► StructuralSignals ──► score per paradigm ──► select
//!                                                                     │
//!                          ┌──────────────────────────────────────────┤
//!                          ▼                   ▼                      ▼
//!                  max < floor          one topology ties      ≥2 topologies tie
//!                  property_graph       argmax (enum order)    hybrid + composition
//! ```
//!
//! Every scoring function is a fixed linear form over the signals, so the same
//! classified terms always produce the same decision and rationale.
//!
//! Hybrid composition takes one representative per tied topology (the best
//! scoring one). Each term is assigned to the sub-paradigm it has the highest
//! affinity for; ties go to the earlier sub-paradigm. Sub-paradigms are always
//! joined through at least one shared term: relational terms whose endpoints
//! live elsewhere, subtype parents shared across sub-paradigms, or, failing
//! both, a designated anchor term present in every sub-paradigm.

use crate::config::SelectorConfig;
use crate::error::PipelineError;
use crate::signals::{StructuralSignals, TermMarkers};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use theoria_model::{
    normalize_term_key, Category, ClassifiedTerm, CrossParadigmLink, HybridComposition, LinkKind,
    ModelType, ModelTypeDecision, Topology,
};
use tracing::{debug, info};

// ============================================================================
// Scoring
// ============================================================================

/// `min(1, 2x)`: half the vocabulary showing a trait saturates it.
fn sat2(x: f64) -> f64 {
    (2.0 * x).min(1.0)
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Score of one single paradigm. `hybrid` is not scored directly.
pub fn paradigm_score(model: ModelType, s: &StructuralSignals) -> f64 {
    let density = sat2(s.relational_density);
    match model {
        ModelType::PropertyGraph => {
            0.20 + 0.45 * density + 0.15 * flag(s.relational_cyclic) + 0.10 * s.entity_ratio
        }
        ModelType::TableMatrix => s.tabular * (0.6 + 0.3 * (1.0 - density)),
        ModelType::Sequence => {
            0.6 * s.temporal
                + 0.2 * sat2(s.action_ratio)
                + 0.1 * s.temporal * flag(s.relational_acyclic())
        }
        ModelType::Timeline => 0.3 * s.temporal + 0.55 * s.chronology,
        ModelType::Tree => {
            let height = (s.max_subtype_depth as f64 / 3.0).min(1.0);
            height * (0.65 + 0.25 * (1.0 - density))
        }
        ModelType::Statistical => 0.6 * s.statistical + 0.25 * sat2(s.measure_ratio),
        ModelType::Logical => 0.6 * s.logical + 0.25 * sat2(s.logic_ratio),
        ModelType::Causal => {
            s.causal * (0.55 + 0.3 * flag(s.relational_acyclic()) + 0.1 * density)
        }
        ModelType::Hybrid => 0.0,
    }
}

/// Score vector over the eight single paradigms, plus `hybrid` at zero.
pub fn score_all(signals: &StructuralSignals) -> BTreeMap<ModelType, f64> {
    let mut scores: BTreeMap<ModelType, f64> = ModelType::SINGLE
        .into_iter()
        .map(|m| (m, paradigm_score(m, signals)))
        .collect();
    scores.insert(ModelType::Hybrid, 0.0);
    scores
}

// ============================================================================
// Selection
// ============================================================================

pub fn select(
    terms: &[ClassifiedTerm],
    config: &SelectorConfig,
) -> Result<ModelTypeDecision, PipelineError> {
    if terms.is_empty() {
        return Err(PipelineError::ModelTypeUnresolved(
            "no classified terms to score".to_string(),
        ));
    }

    let signals = StructuralSignals::compute(terms);
    let mut scores = score_all(&signals);
    if let Some((model, score)) = scores.iter().find(|(_, s)| !s.is_finite()) {
        return Err(PipelineError::ModelTypeUnresolved(format!(
            "score for {model} is not finite ({score})"
        )));
    }

    let best = ModelType::SINGLE
        .into_iter()
        .map(|m| scores[&m])
        .fold(f64::NEG_INFINITY, f64::max);

    let (selected, composition, reason) = if best < config.dominance_floor {
        (
            ModelType::PropertyGraph,
            None,
            "no paradigm reached the dominance floor; defaulting to property_graph".to_string(),
        )
    } else {
        let tied = representatives(&scores, best, config.tolerance);
        if tied.len() >= 2 {
            let composition = compose(terms, tied);
            let hybrid_score = composition
                .paradigms
                .iter()
                .map(|p| scores[p])
                .fold(f64::INFINITY, f64::min);
            scores.insert(ModelType::Hybrid, hybrid_score);
            let names: Vec<&str> = composition.paradigms.iter().map(ModelType::as_str).collect();
            let reason = format!(
                "{} tie within tolerance with incompatible structure; composed as hybrid",
                names.join(" and ")
            );
            (ModelType::Hybrid, Some(composition), reason)
        } else {
            let winner = tied.first().copied().unwrap_or(ModelType::PropertyGraph);
            (winner, None, format!("{winner} has the highest score"))
        }
    };

    let rationale = rationale(selected, &reason, &scores, &signals, config, composition.as_ref());
    info!(
        model_type = %selected,
        score = scores[&selected],
        terms = terms.len(),
        "model type selected"
    );

    Ok(ModelTypeDecision {
        selected,
        scores,
        rationale,
        composition,
    })
}

/// Paradigms within `tolerance` of `best`, one per topology (the highest
/// scoring member, earlier in enum order on equal scores). Ordered by score
/// descending, then enum order.
fn representatives(scores: &BTreeMap<ModelType, f64>, best: f64, tolerance: f64) -> Vec<ModelType> {
    let mut by_topology: BTreeMap<Topology, ModelType> = BTreeMap::new();
    for model in ModelType::SINGLE {
        let score = scores[&model];
        if best - score > tolerance {
            continue;
        }
        by_topology
            .entry(model.topology())
            .and_modify(|held| {
                if score > scores[&*held] {
                    *held = model;
                }
            })
            .or_insert(model);
    }

    let mut chosen: Vec<ModelType> = by_topology.into_values().collect();
    chosen.sort_by(|a, b| scores[b].total_cmp(&scores[a]).then(a.cmp(b)));
    chosen
}

// ============================================================================
// Hybrid composition
// ============================================================================

/// How strongly a term belongs in a sub-paradigm.
fn affinity(model: ModelType, term: &ClassifiedTerm, markers: &TermMarkers) -> f64 {
    let category = term.category;
    match model {
        ModelType::PropertyGraph => {
            if category == Category::Entity || term.is_relational() {
                1.0
            } else {
                0.5
            }
        }
        ModelType::TableMatrix => {
            if markers.tabular {
                2.0
            } else if matches!(category, Category::Property | Category::Measure) {
                1.0
            } else {
                0.0
            }
        }
        ModelType::Sequence => {
            if markers.temporal {
                2.0
            } else if category == Category::Action {
                1.0
            } else {
                0.0
            }
        }
        ModelType::Timeline => {
            if markers.chronology {
                2.0
            } else if markers.temporal {
                1.0
            } else {
                0.0
            }
        }
        ModelType::Tree => {
            if term.sub_type_of.is_some() {
                2.0
            } else {
                0.0
            }
        }
        ModelType::Statistical => {
            if markers.statistical {
                2.0
            } else if matches!(category, Category::Measure | Category::Modifier) {
                1.0
            } else {
                0.0
            }
        }
        ModelType::Logical => {
            if markers.logical {
                2.0
            } else if matches!(category, Category::TruthValue | Category::Operator) {
                1.5
            } else {
                0.0
            }
        }
        ModelType::Causal => {
            if markers.causal {
                2.0
            } else if term.is_relational() {
                0.5
            } else {
                0.0
            }
        }
        ModelType::Hybrid => 0.0,
    }
}

/// Assign every term to one sub-paradigm and record the joins between them.
pub fn compose(terms: &[ClassifiedTerm], paradigms: Vec<ModelType>) -> HybridComposition {
    let mut assignments = BTreeMap::new();
    let mut owner: HashMap<String, ModelType> = HashMap::new();

    for term in terms {
        let markers = TermMarkers::of(term);
        let mut best: Option<(ModelType, f64)> = None;
        for paradigm in &paradigms {
            let a = affinity(*paradigm, term, &markers);
            if best.map_or(true, |(_, held)| a > held) {
                best = Some((*paradigm, a));
            }
        }
        if let Some((paradigm, _)) = best {
            debug!(term = %term.term.name, %paradigm, "hybrid assignment");
            assignments.insert(term.term.name.clone(), paradigm);
            owner.insert(normalize_term_key(&term.term.name), paradigm);
        }
    }

    let links = join_links(terms, &paradigms, &owner);
    HybridComposition {
        paradigms,
        assignments,
        links,
    }
}

fn join_links(
    terms: &[ClassifiedTerm],
    paradigms: &[ModelType],
    owner: &HashMap<String, ModelType>,
) -> Vec<CrossParadigmLink> {
    let owner_of = |name: &str| owner.get(&normalize_term_key(name)).copied();
    let mut links: Vec<CrossParadigmLink> = Vec::new();

    for term in terms {
        let Some(home) = owner_of(&term.term.name) else {
            continue;
        };

        if term.is_relational() {
            let mut members = vec![home];
            members.extend(
                term.domain
                    .iter()
                    .chain(term.range.iter())
                    .filter_map(|r| r.as_term())
                    .filter_map(owner_of),
            );
            add_link(&mut links, paradigms, &term.term.name, LinkKind::SharedEndpoint, members);
        }

        if let Some(parent) = term.sub_type_of.and_then(|id| terms.iter().find(|t| t.id == id)) {
            if let Some(parent_home) = owner_of(&parent.term.name) {
                add_link(
                    &mut links,
                    paradigms,
                    &parent.term.name,
                    LinkKind::SharedReference,
                    vec![parent_home, home],
                );
            }
        }
    }

    if links.is_empty() {
        let anchor = terms
            .iter()
            .find(|t| t.category == Category::Entity)
            .or_else(|| terms.first());
        if let Some(anchor) = anchor {
            add_link(&mut links, paradigms, &anchor.term.name, LinkKind::Anchor, paradigms.to_vec());
        }
    }

    links
}

/// Record a join spanning at least two sub-paradigms, once per key and kind.
fn add_link(
    links: &mut Vec<CrossParadigmLink>,
    paradigms: &[ModelType],
    key: &str,
    kind: LinkKind,
    mut members: Vec<ModelType>,
) {
    members.sort_by_key(|p| paradigms.iter().position(|q| q == p).unwrap_or(usize::MAX));
    members.dedup();
    if members.len() >= 2 && !links.iter().any(|l| l.key == key && l.kind == kind) {
        links.push(CrossParadigmLink {
            key: key.to_string(),
            kind,
            paradigms: members,
        });
    }
}

// ============================================================================
// Rationale
// ============================================================================

fn rationale(
    selected: ModelType,
    reason: &str,
    scores: &BTreeMap<ModelType, f64>,
    signals: &StructuralSignals,
    config: &SelectorConfig,
    composition: Option<&HybridComposition>,
) -> String {
    let mut out = format!(
        "selected {selected}: {reason} (tolerance {:.4}, floor {:.4}).",
        config.tolerance, config.dominance_floor
    );

    let rendered: Vec<String> = ModelType::ALL
        .iter()
        .map(|m| format!("{m}={:.4}", scores.get(m).copied().unwrap_or(0.0)))
        .collect();
    let _ = write!(out, " scores: {}.", rendered.join(", "));

    let _ = write!(
        out,
        " signals: terms={}, relational_density={:.4}, max_subtype_depth={}, temporal={:.4}, \
         tabular={:.4}, statistical={:.4}, causal={:.4}, logical={:.4}, chronology={:.4}, \
         relational_edges={}, relational_cyclic={}.",
        signals.term_count,
        signals.relational_density,
        signals.max_subtype_depth,
        signals.temporal,
        signals.tabular,
        signals.statistical,
        signals.causal,
        signals.logical,
        signals.chronology,
        signals.relational_edges,
        signals.relational_cyclic,
    );

    if let Some(composition) = composition {
        let joins: Vec<String> = composition
            .links
            .iter()
            .map(|l| format!("{} ({:?})", l.key, l.kind))
            .collect();
        let _ = write!(out, " joined on: {}.", joins.join(", "));
    }
    out
}
