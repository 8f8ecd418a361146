//! Validation report: produced once per run, never partially applied.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    // meta-schema conformance
    MissingField,
    DuplicateId,
    DuplicateName,
    RelationalMissingSignature,
    NonRelationalSignature,
    // referential integrity
    UnresolvedReference,
    // acyclicity
    SubtypeCycle,
    // paradigm fit
    RootKeyMismatch,
    RootRoleMismatch,
    UnresolvedRootItem,
    InvalidComposition,
    EmptyCrossParadigmMapping,
    // completeness
    MissingDefinition,
    UnexpectedDefinition,
    DefinitionOrder,
    // run-level failures outside the validator
    OracleUnavailable,
    ExtractionFailure,
    ModelTypeUnresolved,
    EmitFailure,
    Cancelled,
    // warnings
    AmbiguousTerm,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::MissingField => "missing_field",
            IssueCode::DuplicateId => "duplicate_id",
            IssueCode::DuplicateName => "duplicate_name",
            IssueCode::RelationalMissingSignature => "relational_missing_signature",
            IssueCode::NonRelationalSignature => "non_relational_signature",
            IssueCode::UnresolvedReference => "unresolved_reference",
            IssueCode::SubtypeCycle => "subtype_cycle",
            IssueCode::RootKeyMismatch => "root_key_mismatch",
            IssueCode::RootRoleMismatch => "root_role_mismatch",
            IssueCode::UnresolvedRootItem => "unresolved_root_item",
            IssueCode::InvalidComposition => "invalid_composition",
            IssueCode::EmptyCrossParadigmMapping => "empty_cross_paradigm_mapping",
            IssueCode::MissingDefinition => "missing_definition",
            IssueCode::UnexpectedDefinition => "unexpected_definition",
            IssueCode::DefinitionOrder => "definition_order",
            IssueCode::OracleUnavailable => "oracle_unavailable",
            IssueCode::ExtractionFailure => "extraction_failure",
            IssueCode::ModelTypeUnresolved => "model_type_unresolved",
            IssueCode::EmitFailure => "emit_failure",
            IssueCode::Cancelled => "cancelled",
            IssueCode::AmbiguousTerm => "ambiguous_term",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: IssueCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_ref: Option<String>,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            term_ref: None,
            message: message.into(),
        }
    }

    pub fn for_term(code: IssueCode, term: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            term_ref: Some(term.into()),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub errors: Vec<ValidationIssue>,
    /// Non-blocking findings (ambiguous terms). Never affects `ok`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn from_issues(errors: Vec<ValidationIssue>, warnings: Vec<ValidationIssue>) -> Self {
        Self {
            ok: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// A report for a run that failed before (or outside) validation.
    pub fn failure(code: IssueCode, message: impl Into<String>) -> Self {
        Self::from_issues(vec![ValidationIssue::new(code, message)], Vec::new())
    }

    pub fn has_code(&self, code: IssueCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    pub fn error_codes(&self) -> Vec<IssueCode> {
        self.errors.iter().map(|e| e.code).collect()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ok {
            write!(f, "ok ({} warning(s))", self.warnings.len())?;
        } else {
            write!(f, "{} error(s)", self.errors.len())?;
        }
        for issue in &self.errors {
            match &issue.term_ref {
                Some(term) => write!(f, "\n  [{}] {}: {}", issue.code, term, issue.message)?,
                None => write!(f, "\n  [{}] {}", issue.code, issue.message)?,
            }
        }
        Ok(())
    }
}
