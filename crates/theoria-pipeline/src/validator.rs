//! Validator
//!
//! Five passes over an assembled schema, in order. Every pass runs even when
//! an earlier one failed; the report collects all errors.
//!
//! ```text
//! 1. meta-schema      ids, names, categories, domain/range presence
//! 2. references       domain/range term refs and subTypeOf targets
//! 3. acyclicity       subTypeOf over the final definitions
//! 4. paradigm fit     root keys, roles, root items, hybrid composition
//! 5. completeness     definitions == terms handed to the synthesizer
//! ```
//!
//! Ambiguity flags on definitions become warnings; they never fail a report.

use crate::subtype::SubtypeGraph;
use std::collections::{BTreeSet, HashMap, HashSet};
use theoria_model::{
    expected_root_keys, normalize_term_key, Category, ClassifiedTerm, IssueCode, ModelType,
    RootRole, SchemaDefinition, TermId, ValidationIssue, ValidationReport,
};
use tracing::{debug, warn};

/// Validate `schema` against the classified terms it was synthesized from.
pub fn validate(schema: &SchemaDefinition, expected: &[ClassifiedTerm]) -> ValidationReport {
    let mut errors = Vec::new();
    let names = NameIndex::new(&schema.definitions);

    check_meta(schema, &mut errors);
    check_references(schema, &names, &mut errors);
    check_acyclic(schema, &mut errors);
    check_paradigm_fit(schema, &names, &mut errors);
    check_completeness(schema, expected, &mut errors);

    let warnings = schema
        .ambiguous_terms()
        .map(|d| {
            let detail: Vec<String> = d.flags.iter().map(|f| f.describe()).collect();
            ValidationIssue::for_term(IssueCode::AmbiguousTerm, d.name(), detail.join("; "))
        })
        .collect();

    let report = ValidationReport::from_issues(errors, warnings);
    if report.ok {
        debug!(warnings = report.warnings.len(), "schema validated");
    } else {
        warn!(errors = report.errors.len(), "schema failed validation");
    }
    report
}

/// Validate a schema on its own, e.g. one re-read from disk. Its definitions
/// are the expected term set.
pub fn validate_standalone(schema: &SchemaDefinition) -> ValidationReport {
    validate(schema, &schema.definitions)
}

struct NameIndex {
    keys: HashSet<String>,
}

impl NameIndex {
    fn new(definitions: &[ClassifiedTerm]) -> Self {
        Self {
            keys: definitions.iter().map(|d| normalize_term_key(d.name())).collect(),
        }
    }

    fn defines(&self, name: &str) -> bool {
        self.keys.contains(&normalize_term_key(name))
    }

    /// A defined term or a category label.
    fn resolves(&self, name: &str) -> bool {
        self.defines(name) || Category::ALL.iter().any(|c| c.label() == name)
    }
}

// ============================================================================
// 1. Meta-schema
// ============================================================================

fn check_meta(schema: &SchemaDefinition, errors: &mut Vec<ValidationIssue>) {
    if schema.citation.trim().is_empty() {
        errors.push(ValidationIssue::new(IssueCode::MissingField, "citation is empty"));
    }
    if schema.model_type.rationale.trim().is_empty() {
        errors.push(ValidationIssue::new(
            IssueCode::MissingField,
            "model_type.rationale is empty",
        ));
    }
    if schema.model_type.scores.is_empty() {
        errors.push(ValidationIssue::new(
            IssueCode::MissingField,
            "model_type.scores is empty",
        ));
    }

    let mut ids = HashSet::new();
    let mut keys = HashSet::new();
    for def in &schema.definitions {
        let name = def.name();
        if name.trim().is_empty() {
            errors.push(ValidationIssue::for_term(
                IssueCode::MissingField,
                def.id.to_string(),
                "definition has no name",
            ));
        }
        if !ids.insert(def.id) {
            errors.push(ValidationIssue::for_term(
                IssueCode::DuplicateId,
                name,
                format!("id {} is used more than once", def.id),
            ));
        }
        if !keys.insert(normalize_term_key(name)) {
            errors.push(ValidationIssue::for_term(
                IssueCode::DuplicateName,
                name,
                "name is defined more than once",
            ));
        }

        if def.is_relational() && (def.domain.is_empty() || def.range.is_empty()) {
            errors.push(ValidationIssue::for_term(
                IssueCode::RelationalMissingSignature,
                name,
                format!("{} requires a non-empty domain and range", def.category),
            ));
        }
        if !def.is_relational() && (!def.domain.is_empty() || !def.range.is_empty()) {
            errors.push(ValidationIssue::for_term(
                IssueCode::NonRelationalSignature,
                name,
                format!("{} must not carry a domain or range", def.category),
            ));
        }
    }
}

// ============================================================================
// 2. Referential integrity
// ============================================================================

fn check_references(schema: &SchemaDefinition, names: &NameIndex, errors: &mut Vec<ValidationIssue>) {
    let ids: HashSet<TermId> = schema.definitions.iter().map(|d| d.id).collect();

    for def in &schema.definitions {
        for reference in def.domain.iter().chain(def.range.iter()) {
            if let Some(target) = reference.as_term() {
                if !names.defines(target) {
                    errors.push(ValidationIssue::for_term(
                        IssueCode::UnresolvedReference,
                        def.name(),
                        format!("`{target}` is neither a category nor a defined term"),
                    ));
                }
            }
        }
        if let Some(parent) = def.sub_type_of {
            if !ids.contains(&parent) {
                errors.push(ValidationIssue::for_term(
                    IssueCode::UnresolvedReference,
                    def.name(),
                    format!("subTypeOf {parent} is not defined"),
                ));
            }
        }
    }
}

// ============================================================================
// 3. Acyclicity
// ============================================================================

fn check_acyclic(schema: &SchemaDefinition, errors: &mut Vec<ValidationIssue>) {
    if let Some(cycle) = SubtypeGraph::from_terms(&schema.definitions).find_cycle() {
        let members: Vec<&str> = cycle
            .iter()
            .filter_map(|pos| schema.definitions.get(pos.index()))
            .map(ClassifiedTerm::name)
            .collect();
        errors.push(ValidationIssue::for_term(
            IssueCode::SubtypeCycle,
            members.first().copied().unwrap_or_default(),
            format!("subTypeOf cycle: {}", members.join(" → ")),
        ));
    }
}

// ============================================================================
// 4. Paradigm-structural fit
// ============================================================================

fn check_paradigm_fit(
    schema: &SchemaDefinition,
    names: &NameIndex,
    errors: &mut Vec<ValidationIssue>,
) {
    let decision = &schema.model_type;
    let selected = decision.selected;

    let expected = expected_root_keys(decision);
    let actual: BTreeSet<String> = schema.root_properties.keys().cloned().collect();
    for missing in expected.difference(&actual) {
        errors.push(ValidationIssue::new(
            IssueCode::RootKeyMismatch,
            format!("{selected} requires root property `{missing}`"),
        ));
    }
    for extra in actual.difference(&expected) {
        errors.push(ValidationIssue::new(
            IssueCode::RootKeyMismatch,
            format!("root property `{extra}` is not prescribed for {selected}"),
        ));
    }

    for (key, spec) in &schema.root_properties {
        let role_fits = if spec.role == RootRole::CrossParadigmMapping {
            selected == ModelType::Hybrid
        } else {
            spec.paradigm.roles().contains(&spec.role)
        };
        if !role_fits || spec.role.root_key(selected, spec.paradigm) != *key {
            errors.push(ValidationIssue::new(
                IssueCode::RootRoleMismatch,
                format!(
                    "root `{key}` declares role `{}` of {}",
                    spec.role.key(),
                    spec.paradigm
                ),
            ));
        }

        for item in &spec.items {
            if !names.defines(&item.term) {
                errors.push(ValidationIssue::for_term(
                    IssueCode::UnresolvedRootItem,
                    item.term.clone(),
                    format!("`{key}` references an undefined term"),
                ));
            }
            for endpoint in item.from.iter().chain(item.to.iter()) {
                if !names.resolves(endpoint) {
                    errors.push(ValidationIssue::for_term(
                        IssueCode::UnresolvedRootItem,
                        item.term.clone(),
                        format!("`{key}` endpoint `{endpoint}` does not resolve"),
                    ));
                }
            }
        }
    }

    check_composition(schema, names, errors);
}

fn check_composition(
    schema: &SchemaDefinition,
    names: &NameIndex,
    errors: &mut Vec<ValidationIssue>,
) {
    let decision = &schema.model_type;
    let invalid = |message: String| ValidationIssue::new(IssueCode::InvalidComposition, message);

    let composition = match (decision.selected, &decision.composition) {
        (ModelType::Hybrid, Some(composition)) => composition,
        (ModelType::Hybrid, None) => {
            errors.push(invalid("hybrid selected without a composition".into()));
            return;
        }
        (selected, Some(_)) => {
            errors.push(invalid(format!("{selected} must not carry a composition")));
            return;
        }
        (_, None) => return,
    };

    let paradigms = &composition.paradigms;
    let distinct: BTreeSet<ModelType> = paradigms.iter().copied().collect();
    if distinct.len() < 2 || distinct.len() != paradigms.len() {
        errors.push(invalid(
            "a hybrid needs at least two distinct sub-paradigms".into(),
        ));
    }
    if distinct.contains(&ModelType::Hybrid) {
        errors.push(invalid("a hybrid cannot contain another hybrid".into()));
    }
    let topologies: BTreeSet<_> = distinct.iter().map(ModelType::topology).collect();
    if topologies.len() < 2 {
        errors.push(invalid(
            "sub-paradigms share one topology and need no hybrid".into(),
        ));
    }

    let assigned: HashMap<String, ModelType> = composition
        .assignments
        .iter()
        .map(|(name, p)| (normalize_term_key(name), *p))
        .collect();
    for def in &schema.definitions {
        match assigned.get(&normalize_term_key(def.name())) {
            None => errors.push(ValidationIssue::for_term(
                IssueCode::InvalidComposition,
                def.name(),
                "definition is not assigned to a sub-paradigm",
            )),
            Some(p) if !distinct.contains(p) => errors.push(ValidationIssue::for_term(
                IssueCode::InvalidComposition,
                def.name(),
                format!("assigned to {p}, which is not part of the composition"),
            )),
            Some(_) => {}
        }
    }
    for name in composition.assignments.keys() {
        if !names.defines(name) {
            errors.push(ValidationIssue::for_term(
                IssueCode::InvalidComposition,
                name.clone(),
                "assignment names an undefined term",
            ));
        }
    }

    for (key, spec) in &schema.root_properties {
        if spec.role == RootRole::CrossParadigmMapping {
            continue;
        }
        for item in &spec.items {
            let owner = assigned.get(&normalize_term_key(&item.term));
            if owner.is_some_and(|p| *p != spec.paradigm) {
                errors.push(ValidationIssue::for_term(
                    IssueCode::InvalidComposition,
                    item.term.clone(),
                    format!("listed under `{key}` but assigned to another sub-paradigm"),
                ));
            }
        }
    }

    for link in &composition.links {
        let joined: BTreeSet<ModelType> = link.paradigms.iter().copied().collect();
        if !names.defines(&link.key) || joined.len() < 2 || !joined.is_subset(&distinct) {
            errors.push(ValidationIssue::for_term(
                IssueCode::InvalidComposition,
                link.key.clone(),
                "cross-paradigm link must join two or more sub-paradigms on a defined term",
            ));
        }
    }

    let mapped = schema
        .root(RootRole::CrossParadigmMapping.key())
        .is_some_and(|spec| !spec.items.is_empty());
    if composition.links.is_empty() || !mapped {
        errors.push(ValidationIssue::new(
            IssueCode::EmptyCrossParadigmMapping,
            "hybrid schema has no cross-paradigm mapping",
        ));
    }
}

// ============================================================================
// 5. Completeness
// ============================================================================

fn check_completeness(
    schema: &SchemaDefinition,
    expected: &[ClassifiedTerm],
    errors: &mut Vec<ValidationIssue>,
) {
    let identity = |d: &ClassifiedTerm| (d.id, d.name().to_string());
    let want: Vec<(TermId, String)> = expected.iter().map(identity).collect();
    let have: Vec<(TermId, String)> = schema.definitions.iter().map(identity).collect();
    let want_set: HashSet<&(TermId, String)> = want.iter().collect();
    let have_set: HashSet<&(TermId, String)> = have.iter().collect();

    for (id, name) in want.iter().filter(|w| !have_set.contains(w)) {
        errors.push(ValidationIssue::for_term(
            IssueCode::MissingDefinition,
            name.clone(),
            format!("classified term {id} is missing from definitions"),
        ));
    }
    for (id, name) in have.iter().filter(|h| !want_set.contains(h)) {
        errors.push(ValidationIssue::for_term(
            IssueCode::UnexpectedDefinition,
            name.clone(),
            format!("definition {id} was not among the classified terms"),
        ));
    }
    if want.len() == have.len() && want_set == have_set && want != have {
        errors.push(ValidationIssue::new(
            IssueCode::DefinitionOrder,
            "definitions are not in classification order",
        ));
    }
}
