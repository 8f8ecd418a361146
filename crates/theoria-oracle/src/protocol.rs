//! Oracle protocol: prompt templates, request payloads and the JSON shapes the
//! oracle is asked to answer with.
//!
//! Everything decoded here is still untrusted text. Category names, domains
//! and parents are plain strings; the classifier decides what they mean.

use crate::OracleError;
use serde::{Deserialize, Serialize};

/// Protocol version sent with every classify payload.
pub const PROTOCOL_VERSION: &str = "0.2.0";

/// One term proposed by the oracle during extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedTermWire {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(
        default,
        alias = "category",
        alias = "tentativeCategory",
        skip_serializing_if = "Option::is_none"
    )]
    pub tentative_category: Option<String>,
}

impl ExtractedTermWire {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            context: None,
            tentative_category: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.tentative_category = Some(category.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ExtractEnvelope {
    terms: Vec<ExtractedTermWire>,
}

/// The oracle's answer for a single term.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClassificationWire {
    pub category: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub range: Vec<String>,
    #[serde(
        default,
        rename = "subTypeOf",
        alias = "sub_type_of",
        alias = "parent",
        skip_serializing_if = "Option::is_none"
    )]
    pub sub_type_of: Option<String>,
}

impl ClassificationWire {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            ..Self::default()
        }
    }

    pub fn with_signature<D, R>(mut self, domain: D, range: R) -> Self
    where
        D: IntoIterator,
        D::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        self.domain = domain.into_iter().map(Into::into).collect();
        self.range = range.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.sub_type_of = Some(parent.into());
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Request body for a classify call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyPayload {
    pub version: String,
    pub term: String,
    pub context: String,
    /// Names of every term extracted from the same paper, for domain/range
    /// and `subTypeOf` references.
    pub known_terms: Vec<String>,
    /// The closed category vocabulary the answer must come from.
    pub categories: Vec<String>,
    /// Set on re-queries after an invalid answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_answer: Option<String>,
}

impl ClassifyPayload {
    pub fn new(
        term: impl Into<String>,
        context: impl Into<String>,
        known_terms: Vec<String>,
        categories: Vec<String>,
    ) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            term: term.into(),
            context: context.into(),
            known_terms,
            categories,
            previous_answer: None,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(raw: &str) -> Result<Self, OracleError> {
        serde_json::from_str(raw)
            .map_err(|e| OracleError::Malformed(format!("classify payload: {e}")))
    }
}

/// Strip a Markdown code fence and any prose around the outermost JSON value.
pub fn extract_json_block(content: &str) -> &str {
    let trimmed = content.trim();
    let start = trimmed.find(['{', '[']);
    let end = trimmed.rfind(['}', ']']);
    match (start, end) {
        (Some(s), Some(e)) if e >= s => &trimmed[s..=e],
        _ => trimmed,
    }
}

/// Decode an extraction answer. Accepts `{"terms": [...]}` or a bare array.
pub fn parse_extracted_terms(content: &str) -> Result<Vec<ExtractedTermWire>, OracleError> {
    let block = extract_json_block(content);
    if block.starts_with('[') {
        return serde_json::from_str(block)
            .map_err(|e| OracleError::Malformed(format!("extraction array: {e}")));
    }
    serde_json::from_str::<ExtractEnvelope>(block)
        .map(|env| env.terms)
        .map_err(|e| OracleError::Malformed(format!("extraction: {e}")))
}

pub fn parse_classification(content: &str) -> Result<ClassificationWire, OracleError> {
    serde_json::from_str(extract_json_block(content))
        .map_err(|e| OracleError::Malformed(format!("classification: {e}")))
}

pub fn render_extraction(terms: &[ExtractedTermWire]) -> String {
    serde_json::json!({ "terms": terms }).to_string()
}

/// Prompt templates for oracle interaction
pub struct PromptTemplates;

impl PromptTemplates {
    /// System prompt for term extraction
    pub fn term_extraction() -> &'static str {
        r#"You are reading a scientific paper that proposes a theory.
List the vocabulary the theory is built from: the constructs, relations,
attributes, processes and measures it names.

Output format (JSON):
{
  "terms": [
    {
      "name": "term as written",
      "context": "the sentence that introduces or defines it",
      "category": "optional guess from the category list"
    }
  ]
}

Use each term once. Keep names exactly as the paper writes them."#
    }

    /// System prompt for term classification
    pub fn term_classification() -> &'static str {
        r#"Classify one term of a theory into exactly one category from the
provided list: entity, relationship, property, action, measure, modifier,
truth-value, operator.

Output format (JSON):
{
  "category": "one of the listed categories",
  "domain": ["for relationship/action only: terms or categories it connects from"],
  "range": ["for relationship/action only: terms or categories it connects to"],
  "subTypeOf": "optional: a known term this term specializes"
}

Only reference names from `known_terms` or the category list."#
    }

    pub fn system_prompt(role: crate::PromptRole) -> &'static str {
        match role {
            crate::PromptRole::Extract => Self::term_extraction(),
            crate::PromptRole::Classify => Self::term_classification(),
        }
    }
}
