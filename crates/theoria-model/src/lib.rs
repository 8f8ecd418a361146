//! Theoria schema model
//!
//! Closed, serializable types shared by every phase of the
//! text → terms → classified terms → schema pipeline:
//!
//! - [`Term`] / [`ClassifiedTerm`] with the closed [`Category`] enumeration,
//! - [`ModelType`] paradigms and the selector's [`ModelTypeDecision`],
//! - the synthesized [`SchemaDefinition`] and its persisted [`SchemaDocument`],
//! - the [`ValidationReport`] that gates emission.
//!
//! Nothing here performs I/O or talks to the oracle.

pub mod category;
pub mod document;
pub mod model_type;
pub mod report;
pub mod schema;
pub mod term;

pub use category::Category;
pub use document::{
    DefinitionRecord, DocumentFormat, Enumerations, ModelTypeRecord, SchemaBlueprint,
    SchemaDocument,
};
pub use model_type::{
    CrossParadigmLink, HybridComposition, LinkKind, ModelType, ModelTypeDecision, RootRole,
    Topology,
};
pub use report::{IssueCode, ValidationIssue, ValidationReport};
pub use schema::{expected_root_keys, RootEntry, RootPropertySpec, SchemaDefinition};
pub use term::{
    normalize_term_key, AmbiguityFlag, AmbiguityKind, CategoryRef, ClassifiedTerm,
    ResolutionStatus, SignatureSide, Term, TermId,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("definition `{0}` appears more than once")]
    DuplicateDefinition(String),
    #[error("definition `{term}` has subTypeOf `{parent}`, which is not defined")]
    UnknownParent { term: String, parent: String },
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
