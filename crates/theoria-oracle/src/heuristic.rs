//! Offline, pattern-based oracle.
//!
//! Answers the same two prompts as a hosted model using regex patterns and
//! small lexicons. It is deterministic, needs no network access, and backs
//! `--oracle heuristic` runs and fixtures.

use crate::protocol::{render_extraction, ClassificationWire, ClassifyPayload, ExtractedTermWire};
use crate::{OracleError, OracleRequest, OracleResponse, PromptRole, TextOracle};
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;

const RELATION_VERBS: &[&str] = &[
    "causes",
    "influences",
    "predicts",
    "precedes",
    "follows",
    "leads to",
    "determines",
    "mediates",
    "moderates",
    "affects",
    "requires",
    "supports",
    "contains",
    "inhibits",
    "enables",
    "reduces",
    "increases",
    "implies",
];

const ACTION_VERBS: &[&str] = &["produces", "performs", "acquires", "teaches", "transforms"];

const MEASURE_SUFFIXES: &[&str] = &[
    "rate",
    "score",
    "index",
    "level",
    "frequency",
    "ratio",
    "coefficient",
    "count",
    "variance",
];

const PROPERTY_SUFFIXES: &[&str] = &["ness", "ity", "ance", "ence"];
const PROPERTY_WORDS: &[&str] = &["capacity", "quality", "attribute", "trait", "property"];
const TRUTH_WORDS: &[&str] = &["true", "false", "valid", "invalid", "truth", "falsity"];
const OPERATOR_WORDS: &[&str] = &[
    "and",
    "or",
    "not",
    "negation",
    "conjunction",
    "disjunction",
    "implication",
];
const MODIFIER_WORDS: &[&str] = &["high", "low", "strong", "weak", "partial", "very"];

/// Sentence-initial words that are capitalized for grammar, not because they
/// name a construct.
const STOPWORDS: &[&str] = &[
    "A", "An", "The", "This", "That", "These", "Those", "We", "Our", "In", "It", "Its", "If",
    "When", "Each", "Every", "However", "Thus", "Therefore", "Then", "First", "Finally", "Such",
    "For", "Both", "Their", "There", "Here", "As", "On", "At", "By", "To", "Of", "And", "Or",
];

pub struct HeuristicOracle {
    capitalized: Regex,
    quoted: Regex,
    relation: Regex,
    measure: Regex,
}

struct Found {
    offset: usize,
    term: ExtractedTermWire,
}

impl HeuristicOracle {
    pub fn new() -> Result<Self, regex::Error> {
        let verbs = RELATION_VERBS
            .iter()
            .chain(ACTION_VERBS)
            .map(|v| regex::escape(v))
            .collect::<Vec<_>>()
            .join("|");
        Ok(Self {
            capitalized: Regex::new(r"\b([A-Z][a-z]+(?:[ -][A-Z][a-z]+)*)\b")?,
            quoted: Regex::new(r#"["“]([A-Za-z][A-Za-z -]{1,58}[A-Za-z])["”]"#)?,
            relation: Regex::new(&format!(
                r"\b([A-Z][\w-]*(?: [A-Z][\w-]*)*)\s+({verbs})\s+([A-Z][\w-]*(?: [A-Z][\w-]*)*)"
            ))?,
            measure: Regex::new(&format!(
                r"(?i)\b([a-z]+ (?:{}))\b",
                MEASURE_SUFFIXES.join("|")
            ))?,
        })
    }

    /// Candidate terms in order of first appearance.
    pub fn extract_terms(&self, text: &str) -> Vec<ExtractedTermWire> {
        let mut found: Vec<Found> = Vec::new();
        let mut sentence_start = 0;
        for sentence in split_sentences(text) {
            let base = text[sentence_start..]
                .find(sentence)
                .map(|i| sentence_start + i)
                .unwrap_or(sentence_start);
            sentence_start = base + sentence.len();
            self.scan_sentence(sentence, base, &mut found);
        }

        found.sort_by_key(|f| f.offset);
        let mut seen = HashSet::new();
        found
            .into_iter()
            .filter(|f| seen.insert(f.term.name.to_lowercase()))
            .map(|f| f.term)
            .collect()
    }

    fn scan_sentence(&self, sentence: &str, base: usize, found: &mut Vec<Found>) {
        let context = sentence.trim().to_string();

        for cap in self.relation.captures_iter(sentence) {
            if let Some(verb) = cap.get(2) {
                let category = if ACTION_VERBS.contains(&verb.as_str()) {
                    "action"
                } else {
                    "relationship"
                };
                found.push(Found {
                    offset: base + verb.start(),
                    term: ExtractedTermWire::new(verb.as_str())
                        .with_context(context.clone())
                        .with_category(category),
                });
            }
        }

        for cap in self.capitalized.captures_iter(sentence) {
            let Some(m) = cap.get(1) else { continue };
            let name = strip_stopwords(m.as_str());
            if name.is_empty() {
                continue;
            }
            found.push(Found {
                offset: base + m.start(),
                term: ExtractedTermWire::new(name).with_context(context.clone()),
            });
        }

        for cap in self.quoted.captures_iter(sentence) {
            if let Some(m) = cap.get(1) {
                found.push(Found {
                    offset: base + m.start(),
                    term: ExtractedTermWire::new(m.as_str()).with_context(context.clone()),
                });
            }
        }

        for cap in self.measure.captures_iter(sentence) {
            let Some(m) = cap.get(1) else { continue };
            let head = m.as_str().split(' ').next().unwrap_or_default();
            if STOPWORDS.iter().any(|s| s.eq_ignore_ascii_case(head)) {
                continue;
            }
            found.push(Found {
                offset: base + m.start(),
                term: ExtractedTermWire::new(m.as_str())
                    .with_context(context.clone())
                    .with_category("measure"),
            });
        }
    }

    pub fn classify_term(&self, payload: &ClassifyPayload) -> ClassificationWire {
        let lower = payload.term.trim().to_lowercase();

        if let Some(verb) = RELATION_VERBS.iter().chain(ACTION_VERBS).find(|v| **v == lower) {
            let category = if ACTION_VERBS.contains(verb) {
                "action"
            } else {
                "relationship"
            };
            let (domain, range) = signature_from_context(verb, &payload.context, &payload.known_terms);
            return ClassificationWire::new(category).with_signature(domain, range);
        }

        let category = category_for_name(&lower);
        let mut answer = ClassificationWire::new(category);
        if let Some(parent) = parent_from_context(&payload.term, &payload.context, &payload.known_terms) {
            answer = answer.with_parent(parent);
        }
        answer
    }
}

fn category_for_name(lower: &str) -> &'static str {
    let last = lower.rsplit(' ').next().unwrap_or(lower);
    if TRUTH_WORDS.contains(&lower) {
        "truth-value"
    } else if OPERATOR_WORDS.contains(&lower) {
        "operator"
    } else if MODIFIER_WORDS.contains(&lower) || (lower.ends_with("ly") && !lower.contains(' ')) {
        "modifier"
    } else if MEASURE_SUFFIXES.contains(&last) {
        "measure"
    } else if PROPERTY_WORDS.contains(&last) || PROPERTY_SUFFIXES.iter().any(|s| last.ends_with(s)) {
        "property"
    } else {
        "entity"
    }
}

fn strip_stopwords(phrase: &str) -> &str {
    let mut rest = phrase;
    loop {
        let (head, tail) = match rest.split_once([' ', '-']) {
            Some((h, t)) => (h, t),
            None => (rest, ""),
        };
        if STOPWORDS.contains(&head) {
            rest = tail;
            if rest.is_empty() {
                return rest;
            }
        } else {
            return rest;
        }
    }
}

/// Split on `.`, `!` or `?` followed by whitespace or end of text.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = chars.peek().map(|(_, n)| n.is_whitespace()).unwrap_or(true);
            if at_boundary {
                let end = i + c.len_utf8();
                let sentence = text[start..end].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = end;
            }
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Longest known term matching at the end (`suffix = true`) or start of `text`.
fn match_known(text: &str, known: &[String], suffix: bool) -> Option<String> {
    let text = text.trim().trim_matches(|c: char| c.is_ascii_punctuation()).to_lowercase();
    known
        .iter()
        .filter(|k| {
            let k = k.to_lowercase();
            if suffix {
                text.ends_with(&k)
            } else {
                text.starts_with(&k)
            }
        })
        .max_by_key(|k| k.len())
        .cloned()
}

fn signature_from_context(verb: &str, context: &str, known: &[String]) -> (Vec<String>, Vec<String>) {
    let lower = context.to_ascii_lowercase();
    let Some(at) = lower.find(&format!(" {verb} ")) else {
        return (Vec::new(), Vec::new());
    };
    let left = &context[..at];
    let right = &context[at + verb.len() + 2..];
    let domain = match_known(left, known, true).into_iter().collect();
    let range = match_known(right, known, false).into_iter().collect();
    (domain, range)
}

fn parent_from_context(term: &str, context: &str, known: &[String]) -> Option<String> {
    let pattern = format!(
        r"(?i)\b{}s?\s+(?:is|are)\s+(?:an?\s+|the\s+)?(?:kind|type|form|subtype|special case|class)\s+of\s+(?:the\s+)?(.+)",
        regex::escape(term.trim())
    );
    let re = Regex::new(&pattern).ok()?;
    let cap = re.captures(context)?;
    let rest = cap.get(1)?.as_str();
    match_known(rest, known, false).filter(|p| !p.eq_ignore_ascii_case(term.trim()))
}

#[async_trait]
impl TextOracle for HeuristicOracle {
    async fn call(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        match request.role {
            PromptRole::Extract => Ok(OracleResponse::new(render_extraction(
                &self.extract_terms(&request.payload),
            ))),
            PromptRole::Classify => {
                let payload = ClassifyPayload::from_json(&request.payload)?;
                Ok(OracleResponse::new(self.classify_term(&payload).to_json()))
            }
        }
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}
