//! Terms as they move through the pipeline.
//!
//! ```text
//! Term (phase 1) ──classify──► ClassifiedTerm (phase 2) ──synthesize──► definitions[]
//! ```
//!
//! A `Term` is immutable once the extractor emits it. A `ClassifiedTerm` wraps
//! it verbatim and adds the category, relational signature and hierarchy edge.
//! Ambiguous terms are flagged, never dropped.

use crate::Category;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Stable arena index of a term within one paper run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TermId(pub u32);

impl TermId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// A candidate vocabulary item extracted from paper text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub name: String,
    pub raw_context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tentative_category: Option<Category>,
}

impl Term {
    pub fn new(name: impl Into<String>, raw_context: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_context: raw_context.into(),
            tentative_category: None,
        }
    }

    pub fn with_tentative_category(mut self, category: Category) -> Self {
        self.tentative_category = Some(category);
        self
    }

    /// Deduplication key (see [`normalize_term_key`]).
    pub fn key(&self) -> String {
        normalize_term_key(&self.name)
    }
}

/// Case-insensitive key with hyphen, underscore and whitespace runs folded to a
/// single space. Surrounding quotes and punctuation are ignored.
pub fn normalize_term_key(raw: &str) -> String {
    let trimmed = raw.trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, '"' | '\'' | '`' | '.' | ',' | ';' | ':' | '(' | ')')
    });

    let mut key = String::with_capacity(trimmed.len());
    let mut pending_space = false;
    for c in trimmed.chars() {
        if c == '-' || c == '_' || c.is_whitespace() {
            pending_space = !key.is_empty();
            continue;
        }
        if pending_space {
            key.push(' ');
            pending_space = false;
        }
        key.extend(c.to_lowercase());
    }
    key
}

/// A domain/range member: either a category of the closed enumeration or a
/// term defined in the same schema (by name).
///
/// Serialized as a plain string. Category references use the capitalized
/// label (`Entity`, `TruthValue`, ...); anything else is a term reference.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CategoryRef {
    Category(Category),
    Term(String),
}

impl CategoryRef {
    pub fn entity() -> Self {
        CategoryRef::Category(Category::Entity)
    }

    pub fn as_term(&self) -> Option<&str> {
        match self {
            CategoryRef::Term(name) => Some(name),
            CategoryRef::Category(_) => None,
        }
    }
}

impl From<String> for CategoryRef {
    fn from(value: String) -> Self {
        match Category::ALL.into_iter().find(|c| c.label() == value) {
            Some(category) => CategoryRef::Category(category),
            None => CategoryRef::Term(value),
        }
    }
}

impl From<CategoryRef> for String {
    fn from(value: CategoryRef) -> Self {
        value.to_string()
    }
}

impl fmt::Display for CategoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryRef::Category(c) => f.write_str(c.label()),
            CategoryRef::Term(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Resolved,
    Ambiguous,
}

/// Which side(s) of a relational signature the oracle failed to supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureSide {
    Domain,
    Range,
    Both,
}

/// Recoverable classification problems, recorded on the term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AmbiguityFlag {
    /// No valid category after the bounded re-query budget.
    UnrecognizedCategory { attempts: u32, last_answer: String },
    /// Relational term without domain and/or range; the missing side fell back to `Entity`.
    MissingSignature { side: SignatureSide },
    /// A domain/range reference that matched neither a category nor a term.
    UnresolvedReference { reference: String },
    /// A `subTypeOf` target that is not a term of this paper.
    UnresolvedParent { reference: String },
    /// The `subTypeOf` edge would have closed a cycle and was rejected.
    HierarchyCycle { rejected_parent: String },
}

/// Error-taxonomy bucket for an ambiguity flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmbiguityKind {
    ClassificationAmbiguity,
    AmbiguousHierarchy,
}

impl AmbiguityFlag {
    pub fn kind(&self) -> AmbiguityKind {
        match self {
            AmbiguityFlag::HierarchyCycle { .. } | AmbiguityFlag::UnresolvedParent { .. } => {
                AmbiguityKind::AmbiguousHierarchy
            }
            _ => AmbiguityKind::ClassificationAmbiguity,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            AmbiguityFlag::UnrecognizedCategory {
                attempts,
                last_answer,
            } => format!("no valid category after {attempts} attempt(s) (last answer `{last_answer}`)"),
            AmbiguityFlag::MissingSignature { side } => {
                let side = match side {
                    SignatureSide::Domain => "domain",
                    SignatureSide::Range => "range",
                    SignatureSide::Both => "domain and range",
                };
                format!("oracle supplied no {side}; fell back to Entity")
            }
            AmbiguityFlag::UnresolvedReference { reference } => {
                format!("dropped unresolvable domain/range reference `{reference}`")
            }
            AmbiguityFlag::UnresolvedParent { reference } => {
                format!("dropped unknown subTypeOf target `{reference}`")
            }
            AmbiguityFlag::HierarchyCycle { rejected_parent } => {
                format!("rejected subTypeOf `{rejected_parent}`: edge would create a cycle")
            }
        }
    }
}

/// A term with its ontological category and, for relational categories, its
/// domain and range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedTerm {
    pub id: TermId,
    pub term: Term,
    pub category: Category,
    #[serde(default)]
    pub domain: BTreeSet<CategoryRef>,
    #[serde(default)]
    pub range: BTreeSet<CategoryRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type_of: Option<TermId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<AmbiguityFlag>,
}

impl ClassifiedTerm {
    pub fn new(id: TermId, term: Term, category: Category) -> Self {
        Self {
            id,
            term,
            category,
            domain: BTreeSet::new(),
            range: BTreeSet::new(),
            sub_type_of: None,
            flags: Vec::new(),
        }
    }

    pub fn with_signature(
        mut self,
        domain: impl IntoIterator<Item = CategoryRef>,
        range: impl IntoIterator<Item = CategoryRef>,
    ) -> Self {
        self.domain = domain.into_iter().collect();
        self.range = range.into_iter().collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.term.name
    }

    pub fn status(&self) -> ResolutionStatus {
        if self.flags.is_empty() {
            ResolutionStatus::Resolved
        } else {
            ResolutionStatus::Ambiguous
        }
    }

    pub fn is_relational(&self) -> bool {
        self.category.is_relational()
    }

    /// `category ∈ {relationship, action} ⇔ domain ≠ ∅ ∧ range ≠ ∅`
    pub fn signature_invariant_holds(&self) -> bool {
        if self.is_relational() {
            !self.domain.is_empty() && !self.range.is_empty()
        } else {
            self.domain.is_empty() && self.range.is_empty()
        }
    }

    pub fn flag(&mut self, flag: AmbiguityFlag) {
        self.flags.push(flag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_case_and_separators() {
        assert_eq!(normalize_term_key("Cognitive-Load"), "cognitive load");
        assert_eq!(normalize_term_key("cognitive_load"), "cognitive load");
        assert_eq!(normalize_term_key("  Cognitive   load. "), "cognitive load");
        assert_eq!(normalize_term_key("\"Working memory\""), "working memory");
        assert_eq!(normalize_term_key("--"), "");
    }

    #[test]
    fn category_refs_round_trip_through_strings() {
        let entity: CategoryRef = String::from("Entity").into();
        assert_eq!(entity, CategoryRef::Category(Category::Entity));
        let term: CategoryRef = String::from("Learner").into();
        assert_eq!(term, CategoryRef::Term("Learner".to_string()));
        assert_eq!(String::from(term), "Learner");
    }

    #[test]
    fn signature_invariant_is_an_equivalence() {
        let entity = ClassifiedTerm::new(TermId(0), Term::new("A", ""), Category::Entity);
        assert!(entity.signature_invariant_holds());

        let bad_entity = entity.clone().with_signature([CategoryRef::entity()], []);
        assert!(!bad_entity.signature_invariant_holds());

        let rel = ClassifiedTerm::new(TermId(1), Term::new("R", ""), Category::Relationship);
        assert!(!rel.signature_invariant_holds());
        let rel = rel.with_signature([CategoryRef::entity()], [CategoryRef::entity()]);
        assert!(rel.signature_invariant_holds());
    }

    #[test]
    fn status_follows_flags() {
        let mut t = ClassifiedTerm::new(TermId(0), Term::new("A", ""), Category::Entity);
        assert_eq!(t.status(), ResolutionStatus::Resolved);
        t.flag(AmbiguityFlag::HierarchyCycle {
            rejected_parent: "B".into(),
        });
        assert_eq!(t.status(), ResolutionStatus::Ambiguous);
        assert_eq!(t.flags[0].kind(), AmbiguityKind::AmbiguousHierarchy);
    }
}
