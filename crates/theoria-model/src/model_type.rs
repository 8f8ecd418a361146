//! Representation paradigms and the selector's decision record.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One of the nine representation shapes a theory can be cast into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    PropertyGraph,
    TableMatrix,
    Sequence,
    Tree,
    Timeline,
    Statistical,
    Logical,
    Causal,
    Hybrid,
}

/// The structural commitment a paradigm makes about how its elements relate.
/// Two paradigms are compatible when they share a topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Topology {
    /// Arbitrary directed graph, cycles allowed.
    General,
    Grid,
    LinearOrder,
    Hierarchy,
    Distributional,
    Deductive,
    /// Directed and strictly acyclic.
    Acyclic,
    Composite,
}

impl ModelType {
    pub const ALL: [ModelType; 9] = [
        ModelType::PropertyGraph,
        ModelType::TableMatrix,
        ModelType::Sequence,
        ModelType::Tree,
        ModelType::Timeline,
        ModelType::Statistical,
        ModelType::Logical,
        ModelType::Causal,
        ModelType::Hybrid,
    ];

    /// The eight single paradigms, in tie-break priority order.
    pub const SINGLE: [ModelType; 8] = [
        ModelType::PropertyGraph,
        ModelType::TableMatrix,
        ModelType::Sequence,
        ModelType::Tree,
        ModelType::Timeline,
        ModelType::Statistical,
        ModelType::Logical,
        ModelType::Causal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::PropertyGraph => "property_graph",
            ModelType::TableMatrix => "table_matrix",
            ModelType::Sequence => "sequence",
            ModelType::Tree => "tree",
            ModelType::Timeline => "timeline",
            ModelType::Statistical => "statistical",
            ModelType::Logical => "logical",
            ModelType::Causal => "causal",
            ModelType::Hybrid => "hybrid",
        }
    }

    pub fn parse(raw: &str) -> Option<ModelType> {
        let raw = raw.trim().to_ascii_lowercase().replace('-', "_");
        ModelType::ALL.into_iter().find(|m| m.as_str() == raw)
    }

    pub fn topology(&self) -> Topology {
        match self {
            ModelType::PropertyGraph => Topology::General,
            ModelType::TableMatrix => Topology::Grid,
            ModelType::Sequence | ModelType::Timeline => Topology::LinearOrder,
            ModelType::Tree => Topology::Hierarchy,
            ModelType::Statistical => Topology::Distributional,
            ModelType::Logical => Topology::Deductive,
            ModelType::Causal => Topology::Acyclic,
            ModelType::Hybrid => Topology::Composite,
        }
    }

    pub fn compatible_with(&self, other: &ModelType) -> bool {
        self.topology() == other.topology()
    }

    /// Root roles a schema of this paradigm must carry. Empty for `hybrid`,
    /// whose roles are derived from its composition.
    pub fn roles(&self) -> &'static [RootRole] {
        match self {
            ModelType::PropertyGraph => &[RootRole::Nodes, RootRole::Edges],
            ModelType::TableMatrix => &[RootRole::Rows, RootRole::Columns, RootRole::Cells],
            ModelType::Sequence => &[RootRole::Stages, RootRole::Transitions],
            ModelType::Tree => &[RootRole::Nodes, RootRole::ParentOf],
            ModelType::Timeline => &[RootRole::Events, RootRole::Ordering],
            ModelType::Statistical => &[
                RootRole::Variables,
                RootRole::Distributions,
                RootRole::Parameters,
            ],
            ModelType::Logical => &[RootRole::Propositions, RootRole::InferenceRules],
            ModelType::Causal => &[
                RootRole::Variables,
                RootRole::CausalEdges,
                RootRole::Interventions,
            ],
            ModelType::Hybrid => &[],
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed enumeration of root-property role names across all paradigms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RootRole {
    Nodes,
    Edges,
    Rows,
    Columns,
    Cells,
    Stages,
    Transitions,
    ParentOf,
    Events,
    Ordering,
    Variables,
    Distributions,
    Parameters,
    Propositions,
    InferenceRules,
    CausalEdges,
    Interventions,
    CrossParadigmMapping,
}

impl RootRole {
    pub fn key(&self) -> &'static str {
        match self {
            RootRole::Nodes => "nodes",
            RootRole::Edges => "edges",
            RootRole::Rows => "rows",
            RootRole::Columns => "columns",
            RootRole::Cells => "cells",
            RootRole::Stages => "stages",
            RootRole::Transitions => "transitions",
            RootRole::ParentOf => "parentOf",
            RootRole::Events => "events",
            RootRole::Ordering => "ordering",
            RootRole::Variables => "variables",
            RootRole::Distributions => "distributions",
            RootRole::Parameters => "parameters",
            RootRole::Propositions => "propositions",
            RootRole::InferenceRules => "inferenceRules",
            RootRole::CausalEdges => "causalEdges",
            RootRole::Interventions => "interventions",
            RootRole::CrossParadigmMapping => "crossParadigmMapping",
        }
    }

    /// Root key for this role. Roles of a hybrid sub-paradigm are tagged with
    /// the originating paradigm (`sequence:stages`).
    pub fn root_key(&self, selected: ModelType, origin: ModelType) -> String {
        if selected == ModelType::Hybrid && *self != RootRole::CrossParadigmMapping {
            format!("{}:{}", origin.as_str(), self.key())
        } else {
            self.key().to_string()
        }
    }
}

/// How two sub-paradigms of a hybrid are joined on a shared term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// A relational term whose endpoints live in different sub-paradigms.
    SharedEndpoint,
    /// A term referenced from more than one sub-paradigm.
    SharedReference,
    /// No natural join existed; the term was designated as the common anchor.
    Anchor,
}

/// One explicit cross-paradigm correspondence in a hybrid schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossParadigmLink {
    /// Name of the term used as the join key.
    pub key: String,
    pub kind: LinkKind,
    pub paradigms: Vec<ModelType>,
}

/// Sub-paradigms of a hybrid plus the explicit membership and join mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridComposition {
    pub paradigms: Vec<ModelType>,
    /// Term name → owning sub-paradigm.
    pub assignments: BTreeMap<String, ModelType>,
    pub links: Vec<CrossParadigmLink>,
}

impl HybridComposition {
    pub fn members_of(&self, paradigm: ModelType) -> impl Iterator<Item = &str> + '_ {
        self.assignments
            .iter()
            .filter(move |(_, p)| **p == paradigm)
            .map(|(name, _)| name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTypeDecision {
    pub selected: ModelType,
    pub scores: BTreeMap<ModelType, f64>,
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composition: Option<HybridComposition>,
}

impl ModelTypeDecision {
    pub fn score(&self, model: ModelType) -> f64 {
        self.scores.get(&model).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hybrid_keys_are_tagged_with_origin() {
        assert_eq!(
            RootRole::Stages.root_key(ModelType::Hybrid, ModelType::Sequence),
            "sequence:stages"
        );
        assert_eq!(
            RootRole::Stages.root_key(ModelType::Sequence, ModelType::Sequence),
            "stages"
        );
        assert_eq!(
            RootRole::CrossParadigmMapping.root_key(ModelType::Hybrid, ModelType::Hybrid),
            "crossParadigmMapping"
        );
    }

    #[test]
    fn linear_paradigms_are_mutually_compatible() {
        assert!(ModelType::Sequence.compatible_with(&ModelType::Timeline));
        assert!(!ModelType::Sequence.compatible_with(&ModelType::PropertyGraph));
        assert!(!ModelType::Tree.compatible_with(&ModelType::PropertyGraph));
        assert!(!ModelType::Causal.compatible_with(&ModelType::PropertyGraph));
    }

    #[test]
    fn role_serde_names_match_root_keys() {
        for role in [RootRole::ParentOf, RootRole::InferenceRules, RootRole::CausalEdges] {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.key()));
        }
    }

    #[test]
    fn parse_model_type_names() {
        assert_eq!(ModelType::parse("property-graph"), Some(ModelType::PropertyGraph));
        assert_eq!(ModelType::parse("Causal"), Some(ModelType::Causal));
        assert_eq!(ModelType::parse("graph"), None);
    }
}
