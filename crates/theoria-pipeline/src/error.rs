//! Fatal pipeline errors.
//!
//! Ambiguity is not an error: unresolved categories and rejected subtype edges
//! are recorded as [`theoria_model::AmbiguityFlag`]s on the term and the run
//! continues. Everything here aborts the current paper only.

use crate::emitter::EmitError;
use std::fmt;
use theoria_model::{IssueCode, ValidationReport};
use theoria_oracle::OracleError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionFailureKind {
    EmptyText,
    NoVocabularyFound,
    MalformedResponse(String),
}

impl fmt::Display for ExtractionFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionFailureKind::EmptyText => f.write_str("paper text is empty"),
            ExtractionFailureKind::NoVocabularyFound => {
                f.write_str("no vocabulary found after normalization")
            }
            ExtractionFailureKind::MalformedResponse(detail) => {
                write!(f, "oracle extraction answer was unusable: {detail}")
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("extraction failure: {0}")]
    ExtractionFailure(ExtractionFailureKind),
    #[error("model type unresolved: {0}")]
    ModelTypeUnresolved(String),
    #[error("validation failed: {0}")]
    ValidationFailure(ValidationReport),
    #[error("oracle unavailable: {0}")]
    OracleUnavailable(#[source] OracleError),
    #[error("emit failed: {0}")]
    Emit(#[from] EmitError),
    #[error("run cancelled")]
    Cancelled,
}

impl PipelineError {
    /// The report a hard-failed caller receives.
    pub fn report(&self) -> ValidationReport {
        match self {
            PipelineError::ValidationFailure(report) => report.clone(),
            PipelineError::ExtractionFailure(kind) => {
                ValidationReport::failure(IssueCode::ExtractionFailure, kind.to_string())
            }
            PipelineError::ModelTypeUnresolved(reason) => {
                ValidationReport::failure(IssueCode::ModelTypeUnresolved, reason.clone())
            }
            PipelineError::OracleUnavailable(err) => {
                ValidationReport::failure(IssueCode::OracleUnavailable, err.to_string())
            }
            PipelineError::Emit(err) => {
                ValidationReport::failure(IssueCode::EmitFailure, err.to_string())
            }
            PipelineError::Cancelled => {
                ValidationReport::failure(IssueCode::Cancelled, "run cancelled before completion")
            }
        }
    }

    /// Map an oracle error seen during a phase. Unreachable oracles are fatal;
    /// anything else is handed back for the phase to handle.
    pub(crate) fn from_oracle(err: OracleError) -> Result<OracleError, PipelineError> {
        if err.is_unavailability() {
            Err(PipelineError::OracleUnavailable(err))
        } else {
            Ok(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn every_fatal_error_maps_to_a_failed_report() {
        let errors = vec![
            PipelineError::ExtractionFailure(ExtractionFailureKind::NoVocabularyFound),
            PipelineError::ModelTypeUnresolved("no terms".into()),
            PipelineError::OracleUnavailable(OracleError::Timeout(Duration::from_secs(1))),
            PipelineError::Cancelled,
        ];
        let codes = [
            IssueCode::ExtractionFailure,
            IssueCode::ModelTypeUnresolved,
            IssueCode::OracleUnavailable,
            IssueCode::Cancelled,
        ];
        for (err, code) in errors.iter().zip(codes) {
            let report = err.report();
            assert!(!report.ok);
            assert!(report.has_code(code), "{err} should carry {code}");
        }
    }

    #[test]
    fn malformed_oracle_errors_are_left_to_the_phase() {
        let err = PipelineError::from_oracle(OracleError::Malformed("x".into()));
        assert!(matches!(err, Ok(OracleError::Malformed(_))));
        let err = PipelineError::from_oracle(OracleError::CircuitOpen { name: "o".into() });
        assert!(matches!(err, Err(PipelineError::OracleUnavailable(_))));
    }
}
