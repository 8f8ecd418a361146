//! Persisted schema document.
//!
//! Wire shape:
//!
//! ```text
//! citation: string
//! annotation: string
//! model_type: { name, rationale, scores, composition? }
//! schema_blueprint:
//!   root_properties: { <key>: { role, paradigm, items[] } }
//!   definitions: [ { id, name, category, description, domain?, range?, subTypeOf?, ... } ]
//!   enumerations: { category[], model_type[], role[] }
//! ```
//!
//! `SchemaDefinition → SchemaDocument → text → SchemaDocument → SchemaDefinition`
//! is lossless and preserves definition order.

use crate::{
    expected_root_keys, AmbiguityFlag, Category, CategoryRef, ClassifiedTerm, HybridComposition,
    ModelError, ModelType, ModelTypeDecision, ResolutionStatus, RootPropertySpec, RootRole,
    SchemaDefinition, Term, TermId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    #[default]
    Json,
    Yaml,
}

impl DocumentFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Json => "json",
            DocumentFormat::Yaml => "yaml",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Some(DocumentFormat::Json),
            "yaml" | "yml" => Some(DocumentFormat::Yaml),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(DocumentFormat::parse)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub citation: String,
    pub annotation: String,
    pub model_type: ModelTypeRecord,
    pub schema_blueprint: SchemaBlueprint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTypeRecord {
    pub name: ModelType,
    pub rationale: String,
    pub scores: BTreeMap<ModelType, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composition: Option<HybridComposition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaBlueprint {
    pub root_properties: BTreeMap<String, RootPropertySpec>,
    pub definitions: Vec<DefinitionRecord>,
    #[serde(default)]
    pub enumerations: Enumerations,
}

/// Closed value sets a consumer can validate against without re-deriving the
/// taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Enumerations {
    pub category: Vec<Category>,
    pub model_type: Vec<ModelType>,
    pub role: Vec<RootRole>,
}

impl Enumerations {
    fn for_schema(schema: &SchemaDefinition) -> Self {
        let roles: BTreeSet<RootRole> = schema.root_properties.values().map(|r| r.role).collect();
        Self {
            category: Category::ALL.to_vec(),
            model_type: ModelType::ALL.to_vec(),
            role: roles.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionRecord {
    pub id: TermId,
    pub name: String,
    pub category: Category,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain: Vec<CategoryRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub range: Vec<CategoryRef>,
    #[serde(rename = "subTypeOf", default, skip_serializing_if = "Option::is_none")]
    pub sub_type_of: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tentative_category: Option<Category>,
    pub status: ResolutionStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<AmbiguityFlag>,
}

impl SchemaDocument {
    pub fn from_definition(schema: &SchemaDefinition) -> Self {
        let names: HashMap<TermId, &str> = schema
            .definitions
            .iter()
            .map(|d| (d.id, d.term.name.as_str()))
            .collect();

        let definitions = schema
            .definitions
            .iter()
            .map(|d| DefinitionRecord {
                id: d.id,
                name: d.term.name.clone(),
                category: d.category,
                description: d.term.raw_context.clone(),
                domain: d.domain.iter().cloned().collect(),
                range: d.range.iter().cloned().collect(),
                sub_type_of: d
                    .sub_type_of
                    .map(|p| names.get(&p).map(|n| n.to_string()).unwrap_or_else(|| p.to_string())),
                tentative_category: d.term.tentative_category,
                status: d.status(),
                flags: d.flags.clone(),
            })
            .collect();

        Self {
            citation: schema.citation.clone(),
            annotation: schema.annotation.clone(),
            model_type: ModelTypeRecord {
                name: schema.model_type.selected,
                rationale: schema.model_type.rationale.clone(),
                scores: schema.model_type.scores.clone(),
                composition: schema.model_type.composition.clone(),
            },
            schema_blueprint: SchemaBlueprint {
                root_properties: schema.root_properties.clone(),
                definitions,
                enumerations: Enumerations::for_schema(schema),
            },
        }
    }

    /// Rebuild the in-memory schema. `subTypeOf` names must resolve to a
    /// definition in the same document.
    pub fn into_definition(self) -> Result<SchemaDefinition, ModelError> {
        let mut ids: HashMap<String, TermId> = HashMap::new();
        for record in &self.schema_blueprint.definitions {
            if ids.insert(record.name.clone(), record.id).is_some() {
                return Err(ModelError::DuplicateDefinition(record.name.clone()));
            }
        }

        let mut definitions = Vec::with_capacity(self.schema_blueprint.definitions.len());
        for record in self.schema_blueprint.definitions {
            let sub_type_of = match record.sub_type_of {
                Some(parent) => Some(*ids.get(&parent).ok_or_else(|| ModelError::UnknownParent {
                    term: record.name.clone(),
                    parent: parent.clone(),
                })?),
                None => None,
            };
            definitions.push(ClassifiedTerm {
                id: record.id,
                term: Term {
                    name: record.name,
                    raw_context: record.description,
                    tentative_category: record.tentative_category,
                },
                category: record.category,
                domain: record.domain.into_iter().collect(),
                range: record.range.into_iter().collect(),
                sub_type_of,
                flags: record.flags,
            });
        }

        Ok(SchemaDefinition {
            citation: self.citation,
            annotation: self.annotation,
            model_type: ModelTypeDecision {
                selected: self.model_type.name,
                scores: self.model_type.scores,
                rationale: self.model_type.rationale,
                composition: self.model_type.composition,
            },
            root_properties: self.schema_blueprint.root_properties,
            definitions,
        })
    }

    /// Keys this document's model type prescribes.
    pub fn prescribed_root_keys(&self) -> BTreeSet<String> {
        expected_root_keys(&ModelTypeDecision {
            selected: self.model_type.name,
            scores: BTreeMap::new(),
            rationale: String::new(),
            composition: self.model_type.composition.clone(),
        })
    }

    pub fn render(&self, format: DocumentFormat) -> Result<String, ModelError> {
        match format {
            DocumentFormat::Json => {
                let mut out = serde_json::to_string_pretty(self)?;
                out.push('\n');
                Ok(out)
            }
            DocumentFormat::Yaml => Ok(serde_yaml::to_string(self)?),
        }
    }

    pub fn parse(text: &str, format: DocumentFormat) -> Result<Self, ModelError> {
        match format {
            DocumentFormat::Json => Ok(serde_json::from_str(text)?),
            DocumentFormat::Yaml => Ok(serde_yaml::from_str(text)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RootEntry;

    fn sample_schema() -> SchemaDefinition {
        let a = ClassifiedTerm::new(TermId(0), Term::new("Learner", "A learner studies."), Category::Entity);
        let mut b = ClassifiedTerm::new(TermId(1), Term::new("Novice", "A novice learner."), Category::Entity);
        b.sub_type_of = Some(TermId(0));
        let r = ClassifiedTerm::new(
            TermId(2),
            Term::new("teaches", "Tutors teach learners.").with_tentative_category(Category::Action),
            Category::Relationship,
        )
        .with_signature(
            [CategoryRef::Term("Learner".into())],
            [CategoryRef::Category(Category::Entity)],
        );

        let mut nodes = RootPropertySpec::new(RootRole::Nodes, ModelType::PropertyGraph);
        nodes.items = vec![RootEntry::term("Learner"), RootEntry::term("Novice")];
        let mut edges = RootPropertySpec::new(RootRole::Edges, ModelType::PropertyGraph);
        edges.items = vec![RootEntry::edge(
            "teaches",
            vec!["Learner".into()],
            vec!["Entity".into()],
        )];

        let mut scores = BTreeMap::new();
        scores.insert(ModelType::PropertyGraph, 0.5671);
        scores.insert(ModelType::Tree, 0.1 + 0.2);

        SchemaDefinition {
            citation: "Doe (2020)".into(),
            annotation: "test".into(),
            model_type: ModelTypeDecision {
                selected: ModelType::PropertyGraph,
                scores,
                rationale: "because".into(),
                composition: None,
            },
            root_properties: BTreeMap::from([
                ("nodes".to_string(), nodes),
                ("edges".to_string(), edges),
            ]),
            definitions: vec![a, b, r],
        }
    }

    #[test]
    fn json_round_trip_is_lossless() {
        let schema = sample_schema();
        let text = SchemaDocument::from_definition(&schema)
            .render(DocumentFormat::Json)
            .unwrap();
        assert!(text.contains("\"subTypeOf\": \"Learner\""));
        let back = SchemaDocument::parse(&text, DocumentFormat::Json)
            .unwrap()
            .into_definition()
            .unwrap();
        assert_eq!(back, schema);
    }

    #[test]
    fn yaml_round_trip_is_lossless() {
        let schema = sample_schema();
        let text = SchemaDocument::from_definition(&schema)
            .render(DocumentFormat::Yaml)
            .unwrap();
        let back = SchemaDocument::parse(&text, DocumentFormat::Yaml)
            .unwrap()
            .into_definition()
            .unwrap();
        assert_eq!(back, schema);
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let mut doc = SchemaDocument::from_definition(&sample_schema());
        doc.schema_blueprint.definitions[1].sub_type_of = Some("Ghost".into());
        let err = doc.into_definition().unwrap_err();
        assert!(matches!(err, ModelError::UnknownParent { .. }));
    }

    #[test]
    fn enumerations_list_closed_value_sets() {
        let doc = SchemaDocument::from_definition(&sample_schema());
        let e = &doc.schema_blueprint.enumerations;
        assert_eq!(e.category.len(), 8);
        assert_eq!(e.model_type.len(), 9);
        assert_eq!(e.role, vec![RootRole::Nodes, RootRole::Edges]);
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(DocumentFormat::from_path(Path::new("a/b.yml")), Some(DocumentFormat::Yaml));
        assert_eq!(DocumentFormat::from_path(Path::new("a/b.json")), Some(DocumentFormat::Json));
        assert_eq!(DocumentFormat::from_path(Path::new("a/b")), None);
    }
}
