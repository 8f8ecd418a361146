//! The synthesized schema: paradigm-specific root properties plus the full
//! term catalogue.

use crate::{ClassifiedTerm, ModelType, ModelTypeDecision, RootRole, TermId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A reference from a root property to a defined term.
///
/// `from`/`to` carry the endpoints of edge-like roles (edges, transitions,
/// causal edges, ...). `metadata` holds role-specific annotations such as the
/// intervention marker on causal edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootEntry {
    pub term: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub from: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl RootEntry {
    pub fn term(name: impl Into<String>) -> Self {
        Self {
            term: name.into(),
            from: Vec::new(),
            to: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn edge(name: impl Into<String>, from: Vec<String>, to: Vec<String>) -> Self {
        Self {
            term: name.into(),
            from,
            to,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootPropertySpec {
    pub role: RootRole,
    /// Paradigm the role belongs to; for hybrid sub-structures this is the
    /// originating sub-paradigm.
    pub paradigm: ModelType,
    pub items: Vec<RootEntry>,
}

impl RootPropertySpec {
    pub fn new(role: RootRole, paradigm: ModelType) -> Self {
        Self {
            role,
            paradigm,
            items: Vec::new(),
        }
    }

    pub fn term_names(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.term.as_str()).collect()
    }
}

/// Assembled schema. Owned by the synthesizer until validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub citation: String,
    pub annotation: String,
    pub model_type: ModelTypeDecision,
    pub root_properties: BTreeMap<String, RootPropertySpec>,
    pub definitions: Vec<ClassifiedTerm>,
}

impl SchemaDefinition {
    pub fn definition(&self, id: TermId) -> Option<&ClassifiedTerm> {
        self.definitions.iter().find(|d| d.id == id)
    }

    pub fn definition_by_name(&self, name: &str) -> Option<&ClassifiedTerm> {
        self.definitions.iter().find(|d| d.term.name == name)
    }

    pub fn root(&self, key: &str) -> Option<&RootPropertySpec> {
        self.root_properties.get(key)
    }

    pub fn ambiguous_terms(&self) -> impl Iterator<Item = &ClassifiedTerm> {
        self.definitions.iter().filter(|d| !d.flags.is_empty())
    }
}

/// Root keys prescribed for a decision: the paradigm's own roles, or for a
/// hybrid every sub-paradigm's tagged roles plus the cross-paradigm mapping.
pub fn expected_root_keys(decision: &ModelTypeDecision) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    match (&decision.selected, &decision.composition) {
        (ModelType::Hybrid, Some(composition)) => {
            for paradigm in &composition.paradigms {
                for role in paradigm.roles() {
                    keys.insert(role.root_key(ModelType::Hybrid, *paradigm));
                }
            }
            keys.insert(RootRole::CrossParadigmMapping.key().to_string());
        }
        (ModelType::Hybrid, None) => {
            keys.insert(RootRole::CrossParadigmMapping.key().to_string());
        }
        (selected, _) => {
            for role in selected.roles() {
                keys.insert(role.root_key(*selected, *selected));
            }
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HybridComposition;

    fn decision(selected: ModelType, composition: Option<HybridComposition>) -> ModelTypeDecision {
        ModelTypeDecision {
            selected,
            scores: BTreeMap::new(),
            rationale: String::new(),
            composition,
        }
    }

    #[test]
    fn expected_keys_for_single_paradigms() {
        let keys = expected_root_keys(&decision(ModelType::Causal, None));
        let keys: Vec<_> = keys.into_iter().collect();
        assert_eq!(keys, vec!["causalEdges", "interventions", "variables"]);
    }

    #[test]
    fn expected_keys_for_hybrid_are_tagged() {
        let composition = HybridComposition {
            paradigms: vec![ModelType::Sequence, ModelType::PropertyGraph],
            assignments: BTreeMap::new(),
            links: vec![],
        };
        let keys = expected_root_keys(&decision(ModelType::Hybrid, Some(composition)));
        assert!(keys.contains("sequence:stages"));
        assert!(keys.contains("sequence:transitions"));
        assert!(keys.contains("property_graph:nodes"));
        assert!(keys.contains("property_graph:edges"));
        assert!(keys.contains("crossParadigmMapping"));
        assert_eq!(keys.len(), 5);
    }
}
