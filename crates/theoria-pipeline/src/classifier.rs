//! Phase 2: Ontological Classifier
//!
//! ```text
//!   Term ──oracle──► ClassificationWire (untrusted strings)
//!        ──closed enum check, bounded re-query──► CategoryAnswer
//!        ──signature + hierarchy resolution──► ClassifiedTerm
//! ```
//!
//! Oracle calls happen one term at a time. Everything after the oracle answer
//! is synchronous ([`assemble`]), so it can be exercised without an oracle.

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::subtype::SubtypeGraph;
use std::collections::{BTreeSet, HashMap};
use theoria_model::{
    normalize_term_key, AmbiguityFlag, Category, CategoryRef, ClassifiedTerm, SignatureSide, Term,
    TermId,
};
use theoria_oracle::protocol::{parse_classification, ClassificationWire, ClassifyPayload};
use tracing::{debug, info, warn};

/// The oracle's answer for one term after category validation.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryAnswer {
    pub category: Category,
    /// Oracle calls spent on this term.
    pub attempts: u32,
    /// Set when no valid category arrived within the budget; holds the last
    /// rejected answer. `category` is then a fallback.
    pub unrecognized: Option<String>,
    pub wire: ClassificationWire,
}

impl CategoryAnswer {
    pub fn accepted(category: Category, wire: ClassificationWire) -> Self {
        Self {
            category,
            attempts: 1,
            unrecognized: None,
            wire,
        }
    }
}

pub async fn classify(
    ctx: &PipelineContext,
    terms: &[Term],
) -> Result<Vec<ClassifiedTerm>, PipelineError> {
    let known: Vec<String> = terms.iter().map(|t| t.name.clone()).collect();
    let categories: Vec<String> = Category::ALL.iter().map(|c| c.as_str().to_string()).collect();
    let retries = ctx.config.classifier.max_category_retries;

    let mut answers = Vec::with_capacity(terms.len());
    for term in terms {
        let payload = ClassifyPayload::new(
            term.name.clone(),
            term.raw_context.clone(),
            known.clone(),
            categories.clone(),
        );
        answers.push(query_category(ctx, term, payload, retries).await?);
    }

    let classified = assemble(terms, answers);
    let ambiguous = classified.iter().filter(|t| !t.flags.is_empty()).count();
    info!(terms = classified.len(), ambiguous, "classification complete");
    Ok(classified)
}

async fn query_category(
    ctx: &PipelineContext,
    term: &Term,
    mut payload: ClassifyPayload,
    retries: u32,
) -> Result<CategoryAnswer, PipelineError> {
    let budget = retries + 1;
    let mut last_answer = String::new();

    for attempt in 1..=budget {
        let answer = match ctx.oracle.classify(&payload).await {
            Ok(response) => parse_classification(&response.content),
            Err(err) => Err(PipelineError::from_oracle(err)?),
        };

        match answer {
            Ok(wire) => match Category::parse(&wire.category) {
                Some(category) => {
                    return Ok(CategoryAnswer {
                        category,
                        attempts: attempt,
                        unrecognized: None,
                        wire,
                    })
                }
                None => {
                    debug!(term = %term.name, attempt, answer = %wire.category, "category outside the enumeration");
                    last_answer = wire.category;
                }
            },
            Err(err) => {
                debug!(term = %term.name, attempt, error = %err, "unusable classification answer");
                last_answer = "<malformed>".to_string();
            }
        }
        payload.previous_answer = Some(last_answer.clone());
    }

    let fallback = term.tentative_category.unwrap_or(Category::Entity);
    warn!(
        term = %term.name,
        attempts = budget,
        last_answer = %last_answer,
        fallback = %fallback,
        "no valid category, falling back"
    );
    Ok(CategoryAnswer {
        category: fallback,
        attempts: budget,
        unrecognized: Some(last_answer),
        wire: ClassificationWire::default(),
    })
}

/// Turn validated answers into classified terms. `answers[i]` belongs to
/// `terms[i]`, and `TermId(i)` is its arena id.
///
/// - relational terms get a non-empty domain and range (falling back to `Entity`),
/// - non-relational terms never carry a signature,
/// - `subTypeOf` edges are inserted in term order and rejected if they close a cycle.
pub fn assemble(terms: &[Term], answers: Vec<CategoryAnswer>) -> Vec<ClassifiedTerm> {
    let index: HashMap<String, TermId> = terms
        .iter()
        .enumerate()
        .map(|(i, t)| (t.key(), TermId(i as u32)))
        .rev()
        .collect();

    let mut classified = Vec::with_capacity(terms.len());
    let mut parents = Vec::with_capacity(terms.len());

    for (i, (term, answer)) in terms.iter().zip(answers).enumerate() {
        let mut ct = ClassifiedTerm::new(TermId(i as u32), term.clone(), answer.category);
        if let Some(last_answer) = answer.unrecognized {
            ct.flag(AmbiguityFlag::UnrecognizedCategory {
                attempts: answer.attempts,
                last_answer,
            });
        }

        if ct.is_relational() {
            let domain = resolve_refs(&answer.wire.domain, &index, terms, &mut ct);
            let range = resolve_refs(&answer.wire.range, &index, terms, &mut ct);
            apply_signature(&mut ct, domain, range);
        } else if !answer.wire.domain.is_empty() || !answer.wire.range.is_empty() {
            debug!(term = %term.name, category = %ct.category, "dropping signature on non-relational term");
        }

        parents.push(answer.wire.sub_type_of);
        classified.push(ct);
    }

    let mut graph = SubtypeGraph::new(classified.len());
    for (i, parent) in parents.into_iter().enumerate() {
        let Some(parent) = parent.filter(|p| !p.trim().is_empty()) else {
            continue;
        };
        let child = TermId(i as u32);
        let Some(&parent_id) = index.get(&normalize_term_key(&parent)) else {
            classified[i].flag(AmbiguityFlag::UnresolvedParent { reference: parent });
            continue;
        };
        match graph.try_add_edge(child, parent_id) {
            Ok(()) => classified[i].sub_type_of = Some(parent_id),
            Err(err) => {
                warn!(term = %classified[i].term.name, parent = %parent, error = %err, "rejected subtype edge");
                classified[i].flag(AmbiguityFlag::HierarchyCycle {
                    rejected_parent: terms[parent_id.index()].name.clone(),
                });
            }
        }
    }

    classified
}

/// Category labels first, then term names. Unresolvable strings are dropped
/// and flagged on the term.
fn resolve_refs(
    raw: &[String],
    index: &HashMap<String, TermId>,
    terms: &[Term],
    ct: &mut ClassifiedTerm,
) -> BTreeSet<CategoryRef> {
    let mut refs = BTreeSet::new();
    for reference in raw.iter().map(|r| r.trim()).filter(|r| !r.is_empty()) {
        if let Some(category) = Category::parse(reference) {
            refs.insert(CategoryRef::Category(category));
        } else if let Some(id) = index.get(&normalize_term_key(reference)) {
            refs.insert(CategoryRef::Term(terms[id.index()].name.clone()));
        } else {
            ct.flag(AmbiguityFlag::UnresolvedReference {
                reference: reference.to_string(),
            });
        }
    }
    refs
}

fn apply_signature(
    ct: &mut ClassifiedTerm,
    mut domain: BTreeSet<CategoryRef>,
    mut range: BTreeSet<CategoryRef>,
) {
    let side = match (domain.is_empty(), range.is_empty()) {
        (true, true) => Some(SignatureSide::Both),
        (true, false) => Some(SignatureSide::Domain),
        (false, true) => Some(SignatureSide::Range),
        (false, false) => None,
    };
    if let Some(side) = side {
        warn!(term = %ct.term.name, ?side, "relational term without signature, falling back to Entity");
        if domain.is_empty() {
            domain.insert(CategoryRef::entity());
        }
        if range.is_empty() {
            range.insert(CategoryRef::entity());
        }
        ct.flag(AmbiguityFlag::MissingSignature { side });
    }
    ct.domain = domain;
    ct.range = range;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::context::Paper;
    use std::sync::Arc;
    use theoria_oracle::{OracleClient, OracleClientConfig, OracleError, ScriptedOracle};

    fn terms(names: &[&str]) -> Vec<Term> {
        names.iter().map(|n| Term::new(*n, format!("{n} ctx"))).collect()
    }

    fn answer(category: Category, wire: ClassificationWire) -> CategoryAnswer {
        CategoryAnswer::accepted(category, wire)
    }

    fn ctx(oracle: ScriptedOracle) -> PipelineContext {
        let config = OracleClientConfig {
            jitter: false,
            ..OracleClientConfig::default()
        };
        PipelineContext::new(
            Paper::new("t", "text"),
            Arc::new(PipelineConfig::default()),
            OracleClient::new(Arc::new(oracle), &config),
        )
    }

    #[test]
    fn relational_terms_resolve_signatures() {
        let ts = terms(&["A", "B", "R"]);
        let answers = vec![
            answer(Category::Entity, ClassificationWire::new("entity")),
            answer(Category::Entity, ClassificationWire::new("entity")),
            answer(
                Category::Relationship,
                ClassificationWire::new("relationship").with_signature(["a"], ["Entity", "B"]),
            ),
        ];
        let out = assemble(&ts, answers);
        assert_eq!(out[2].domain, BTreeSet::from([CategoryRef::Term("A".into())]));
        assert_eq!(
            out[2].range,
            BTreeSet::from([CategoryRef::entity(), CategoryRef::Term("B".into())])
        );
        assert!(out.iter().all(|t| t.flags.is_empty()));
        assert!(out.iter().all(ClassifiedTerm::signature_invariant_holds));
    }

    #[test]
    fn missing_signature_falls_back_to_entity_and_flags() {
        let ts = terms(&["R"]);
        let out = assemble(
            &ts,
            vec![answer(
                Category::Action,
                ClassificationWire::new("action").with_signature(["Ghost"], Vec::<String>::new()),
            )],
        );
        assert_eq!(out[0].domain, BTreeSet::from([CategoryRef::entity()]));
        assert_eq!(out[0].range, BTreeSet::from([CategoryRef::entity()]));
        assert!(out[0].flags.contains(&AmbiguityFlag::UnresolvedReference {
            reference: "Ghost".into()
        }));
        assert!(out[0].flags.contains(&AmbiguityFlag::MissingSignature {
            side: SignatureSide::Both
        }));
    }

    #[test]
    fn non_relational_terms_never_keep_signatures() {
        let ts = terms(&["A"]);
        let out = assemble(
            &ts,
            vec![answer(
                Category::Property,
                ClassificationWire::new("property").with_signature(["A"], ["A"]),
            )],
        );
        assert!(out[0].domain.is_empty() && out[0].range.is_empty());
    }

    #[test]
    fn cycle_closing_parent_is_rejected_and_flagged() {
        let ts = terms(&["A", "B"]);
        let out = assemble(
            &ts,
            vec![
                answer(Category::Entity, ClassificationWire::new("entity").with_parent("B")),
                answer(Category::Entity, ClassificationWire::new("entity").with_parent("A")),
            ],
        );
        assert_eq!(out[0].sub_type_of, Some(TermId(1)));
        assert_eq!(out[1].sub_type_of, None);
        assert_eq!(
            out[1].flags,
            vec![AmbiguityFlag::HierarchyCycle {
                rejected_parent: "A".into()
            }]
        );
    }

    #[test]
    fn unknown_parent_is_flagged() {
        let ts = terms(&["A"]);
        let out = assemble(
            &ts,
            vec![answer(Category::Entity, ClassificationWire::new("entity").with_parent("Z"))],
        );
        assert_eq!(out[0].sub_type_of, None);
        assert!(matches!(out[0].flags[0], AmbiguityFlag::UnresolvedParent { .. }));
    }

    #[tokio::test]
    async fn invalid_categories_are_requeried_then_fall_back() {
        let oracle = ScriptedOracle::new()
            .classify_as("A", ClassificationWire::new("gadget"))
            .classify_as("B", ClassificationWire::new("widget"))
            .classify_as("B", ClassificationWire::new("measure"));
        let ctx = ctx(oracle);
        let ts = vec![
            Term::new("A", "A ctx").with_tentative_category(Category::Property),
            Term::new("B", "B ctx"),
        ];
        let out = classify(&ctx, &ts).await.unwrap();

        assert_eq!(out[0].category, Category::Property);
        assert_eq!(
            out[0].flags,
            vec![AmbiguityFlag::UnrecognizedCategory {
                attempts: 3,
                last_answer: "gadget".into()
            }]
        );
        assert_eq!(out[1].category, Category::Measure);
        assert!(out[1].flags.is_empty());
        assert_eq!(ctx.oracle.calls_made(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_oracle_is_fatal() {
        let oracle = ScriptedOracle::new()
            .classify_default_error(OracleError::Timeout(std::time::Duration::from_secs(1)));
        let ctx = ctx(oracle);
        let err = classify(&ctx, &terms(&["A"])).await.unwrap_err();
        assert!(matches!(err, PipelineError::OracleUnavailable(_)));
    }
}
