//! Phase 1: Vocabulary Extractor
//!
//! Raw paper text → ordered, deduplicated `Term`s.
//!
//! Deduplication uses [`normalize_term_key`]: case-insensitive with hyphen,
//! underscore and whitespace runs folded together. The first occurrence wins,
//! including its context.

use crate::config::ExtractorConfig;
use crate::context::PipelineContext;
use crate::error::{ExtractionFailureKind, PipelineError};
use std::collections::HashSet;
use theoria_model::{normalize_term_key, Category, Term};
use theoria_oracle::heuristic::split_sentences;
use theoria_oracle::protocol::{parse_extracted_terms, ExtractedTermWire};
use tracing::{debug, info, warn};

pub async fn extract(ctx: &PipelineContext) -> Result<Vec<Term>, PipelineError> {
    let text = ctx.paper.text.as_str();
    if text.trim().is_empty() {
        return Err(PipelineError::ExtractionFailure(ExtractionFailureKind::EmptyText));
    }

    let config = &ctx.config.extractor;
    let attempts = if config.retry_empty_once { 2 } else { 1 };
    let mut failure = ExtractionFailureKind::NoVocabularyFound;

    for attempt in 1..=attempts {
        let proposed = match ctx.oracle.extract(text).await {
            Ok(response) => parse_extracted_terms(&response.content),
            Err(err) => Err(PipelineError::from_oracle(err)?),
        };

        match proposed {
            Ok(proposed) => {
                let terms = collect_terms(proposed, text, config);
                if !terms.is_empty() {
                    info!(terms = terms.len(), "vocabulary extracted");
                    return Ok(terms);
                }
                failure = ExtractionFailureKind::NoVocabularyFound;
            }
            Err(err) => {
                failure = ExtractionFailureKind::MalformedResponse(err.to_string());
            }
        }

        if attempt < attempts {
            warn!(attempt, reason = %failure, "extraction yielded no usable terms, asking once more");
        }
    }

    Err(PipelineError::ExtractionFailure(failure))
}

/// Normalize, deduplicate and complete the oracle's proposals. Order of first
/// appearance in `proposed` is preserved.
pub fn collect_terms(
    proposed: Vec<ExtractedTermWire>,
    text: &str,
    config: &ExtractorConfig,
) -> Vec<Term> {
    let mut seen = HashSet::new();
    let mut terms = Vec::new();

    for wire in proposed {
        let name = wire.name.trim();
        let key = normalize_term_key(name);
        if key.is_empty() || !seen.insert(key.clone()) {
            continue;
        }

        let context = match wire.context.as_deref().map(str::trim) {
            Some(context) if !context.is_empty() => context.to_string(),
            _ => recover_context(text, &key).unwrap_or_default(),
        };

        let mut term = Term::new(name, truncate_chars(&context, config.max_context_chars));
        match wire.tentative_category.as_deref().map(Category::parse) {
            Some(Some(category)) => term = term.with_tentative_category(category),
            Some(None) => debug!(term = name, "ignoring tentative category outside the enumeration"),
            None => {}
        }
        terms.push(term);
    }

    terms
}

/// First sentence of the paper that mentions `key` as whole words.
pub fn recover_context(text: &str, key: &str) -> Option<String> {
    let needle = format!(" {} ", fold_words(key));
    split_sentences(text)
        .into_iter()
        .find(|sentence| format!(" {} ", fold_words(sentence)).contains(&needle))
        .map(str::to_string)
}

/// Lowercase alphanumeric words separated by single spaces.
pub(crate) fn fold_words(raw: &str) -> String {
    raw.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate_chars(raw: &str, max: usize) -> String {
    match raw.char_indices().nth(max) {
        Some((idx, _)) => raw[..idx].trim_end().to_string(),
        None => raw.to_string(),
    }
}
