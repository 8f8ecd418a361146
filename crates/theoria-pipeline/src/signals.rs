//! Structural signals the selector scores paradigms on.
//!
//! Marker families are matched on word prefixes over each term's name and
//! context (`interven` matches "intervention" and "intervene"). A family's
//! signal is `min(1, 2 · terms_with_marker / terms)`: half the vocabulary
//! carrying a family saturates it.

use crate::extractor::fold_words;
use crate::subtype::SubtypeGraph;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use theoria_model::{normalize_term_key, Category, ClassifiedTerm, TermId};

const TEMPORAL: &[&str] = &[
    "stage",
    "phase",
    "sequence",
    "sequential",
    "step",
    "transition",
    "precede",
    "follow",
    "progress",
    "next",
    "subsequent",
];
const TABULAR: &[&str] = &[
    "row",
    "column",
    "cell",
    "matrix",
    "table",
    "tabulat",
    "cross tab",
    "crosstab",
    "axis",
    "axes",
    "grid",
    "quadrant",
];
const STATISTICAL: &[&str] = &[
    "parameter",
    "distribution",
    "coefficient",
    "probabilit",
    "variance",
    "regression",
    "estimat",
    "likelihood",
    "stochastic",
    "random variable",
    "correlat",
];
const CAUSAL: &[&str] = &[
    "interven",
    "counterfactual",
    "causal",
    "confound",
    "treatment",
    "manipulat",
];
const LOGICAL: &[&str] = &[
    "axiom",
    "inference",
    "rule",
    "premise",
    "conclusion",
    "theorem",
    "proposition",
    "entail",
    "deduc",
    "predicate",
    "lemma",
];
const CHRONOLOGY: &[&str] = &[
    "year",
    "decade",
    "century",
    "era",
    "epoch",
    "period",
    "date",
    "chronolog",
    "historical",
    "timeline",
];
const INTERVENTION: &[&str] = &["interven", "treatment", "manipulat"];
const PARAMETER: &[&str] = &["parameter", "coefficient", "weight"];
const DISTRIBUTION: &[&str] = &["distribution", "probabilit", "likelihood"];

fn dimensions_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\b\d+\s*[x×]\s*\d+\b").ok())
        .as_ref()
}

fn year_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\b(?:1[5-9]|20)\d{2}s?\b").ok())
        .as_ref()
}

/// Marker families one term carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TermMarkers {
    pub temporal: bool,
    pub tabular: bool,
    pub statistical: bool,
    pub causal: bool,
    pub logical: bool,
    pub chronology: bool,
    pub intervention: bool,
    pub parameter: bool,
    pub distribution: bool,
}

impl TermMarkers {
    pub fn of(term: &ClassifiedTerm) -> Self {
        let raw = format!("{} {}", term.term.name, term.term.raw_context);
        let padded = format!(" {} ", fold_words(&raw));
        let has = |stems: &[&str]| stems.iter().any(|s| padded.contains(&format!(" {s}")));
        let matches = |pattern: Option<&Regex>| pattern.is_some_and(|re| re.is_match(&raw));

        Self {
            temporal: has(TEMPORAL),
            tabular: has(TABULAR) || matches(dimensions_pattern()),
            statistical: has(STATISTICAL),
            causal: has(CAUSAL),
            logical: has(LOGICAL),
            chronology: has(CHRONOLOGY) || matches(year_pattern()),
            intervention: has(INTERVENTION),
            parameter: has(PARAMETER),
            distribution: has(DISTRIBUTION),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralSignals {
    pub term_count: usize,
    /// (relationships + actions) / terms
    pub relational_density: f64,
    pub max_subtype_depth: usize,
    pub temporal: f64,
    pub tabular: f64,
    pub statistical: f64,
    pub causal: f64,
    pub logical: f64,
    pub chronology: f64,
    /// Term-to-term edges induced by relational signatures (domain → range).
    pub relational_edges: usize,
    pub relational_cyclic: bool,
    pub entity_ratio: f64,
    pub action_ratio: f64,
    pub measure_ratio: f64,
    /// (truth-values + operators) / terms
    pub logic_ratio: f64,
}

impl StructuralSignals {
    pub fn compute(terms: &[ClassifiedTerm]) -> Self {
        let n = terms.len();
        let ratio = |count: usize| if n == 0 { 0.0 } else { count as f64 / n as f64 };
        let count = |pred: fn(&ClassifiedTerm) -> bool| terms.iter().filter(|t| pred(t)).count();
        let family = |hits: usize| (2.0 * ratio(hits)).min(1.0);

        let markers: Vec<TermMarkers> = terms.iter().map(TermMarkers::of).collect();
        let marker_count = |pick: fn(&TermMarkers) -> bool| markers.iter().filter(|m| pick(m)).count();

        let (relational_edges, relational_cyclic) = relational_structure(terms);

        Self {
            term_count: n,
            relational_density: ratio(count(|t| t.is_relational())),
            max_subtype_depth: SubtypeGraph::from_terms(terms).max_depth(),
            temporal: family(marker_count(|m| m.temporal)),
            tabular: family(marker_count(|m| m.tabular)),
            statistical: family(marker_count(|m| m.statistical)),
            causal: family(marker_count(|m| m.causal)),
            logical: family(marker_count(|m| m.logical)),
            chronology: family(marker_count(|m| m.chronology)),
            relational_edges,
            relational_cyclic,
            entity_ratio: ratio(count(|t| t.category == Category::Entity)),
            action_ratio: ratio(count(|t| t.category == Category::Action)),
            measure_ratio: ratio(count(|t| t.category == Category::Measure)),
            logic_ratio: ratio(count(|t| {
                matches!(t.category, Category::TruthValue | Category::Operator)
            })),
        }
    }

    /// Relational structure exists and is a DAG.
    pub fn relational_acyclic(&self) -> bool {
        self.relational_edges > 0 && !self.relational_cyclic
    }
}

/// Edges from every term-valued domain member to every term-valued range
/// member of each relational term.
fn relational_structure(terms: &[ClassifiedTerm]) -> (usize, bool) {
    let position: HashMap<String, usize> = terms
        .iter()
        .enumerate()
        .map(|(i, t)| (normalize_term_key(&t.term.name), i))
        .collect();
    let lookup = |name: &str| position.get(&normalize_term_key(name)).copied();

    let mut graph = SubtypeGraph::new(terms.len());
    let mut edges = 0;
    for term in terms.iter().filter(|t| t.is_relational()) {
        for from in term.domain.iter().filter_map(|r| r.as_term()).filter_map(lookup) {
            for to in term.range.iter().filter_map(|r| r.as_term()).filter_map(lookup) {
                graph.add_edge_unchecked(TermId(from as u32), TermId(to as u32));
                edges += 1;
            }
        }
    }
    (edges, !graph.is_acyclic())
}
