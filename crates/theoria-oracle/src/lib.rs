//! Theoria Text Oracle Client
//!
//! The oracle is the external text-understanding service that proposes terms
//! and categories. It is treated as a black box with a narrow contract:
//!
//! ```text
//!   request  = { role ∈ {extract, classify}, payload }
//!   response = structured text (JSON) parseable into terms or a classification
//!   failure  = Timeout | RateLimited | Malformed | ...
//! ```
//!
//! ```text
//! ┌──────────────┐   ┌───────────┐   ┌─────────┐   ┌───────────┐   ┌──────────────┐
//! │ OracleClient │──►│ retry loop│──►│ rate gate │──►│ breaker │──►│ dyn TextOracle│
//! └──────────────┘   └───────────┘   └─────────┘   └───────────┘   └──────────────┘
//! ```
//!
//! The client, breaker and gate are shared by every in-flight paper pipeline.
//! Nothing here validates categories; oracle output stays untrusted until the
//! classifier checks it.

pub mod breaker;
pub mod client;
pub mod gate;
pub mod heuristic;
pub mod protocol;
pub mod providers;
pub mod retry;
pub mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub use breaker::{Admission, BreakerConfig, BreakerState, CircuitBreaker};
pub use client::{OracleClient, OracleClientConfig, MAX_ORACLE_ATTEMPTS};
pub use gate::RateGate;
pub use heuristic::HeuristicOracle;
pub use protocol::{ClassificationWire, ClassifyPayload, ExtractedTermWire, PromptTemplates};
pub use providers::{ProviderConfig, ProviderConfigError, ProviderKind};
pub use retry::RetryPolicy;
pub use scripted::ScriptedOracle;

#[cfg(feature = "http")]
pub use providers::HttpOracle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptRole {
    Extract,
    Classify,
}

impl fmt::Display for PromptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptRole::Extract => f.write_str("extract"),
            PromptRole::Classify => f.write_str("classify"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequest {
    pub role: PromptRole,
    pub payload: String,
}

impl OracleRequest {
    pub fn extract(text: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Extract,
            payload: text.into(),
        }
    }

    pub fn classify(payload: &ClassifyPayload) -> Self {
        Self {
            role: PromptRole::Classify,
            payload: payload.to_json(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleResponse {
    pub content: String,
}

impl OracleResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum OracleError {
    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("circuit breaker `{name}` is open")]
    CircuitOpen { name: String },
    #[error("oracle unavailable after {attempts} attempt(s): {last}")]
    Exhausted {
        attempts: u32,
        last: Box<OracleError>,
    },
}

impl OracleError {
    /// Transient failures the retry loop may try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OracleError::Timeout(_) | OracleError::RateLimited { .. } | OracleError::Network(_)
        )
    }

    /// Failures that mean the oracle could not be reached (as opposed to a
    /// reachable oracle giving a bad answer).
    pub fn is_unavailability(&self) -> bool {
        matches!(
            self,
            OracleError::Timeout(_)
                | OracleError::RateLimited { .. }
                | OracleError::Network(_)
                | OracleError::Api(_)
                | OracleError::CircuitOpen { .. }
                | OracleError::Exhausted { .. }
        )
    }
}

/// The external text-understanding service.
#[async_trait]
pub trait TextOracle: Send + Sync {
    async fn call(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError>;

    /// Short identifier used in logs.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors_are_transient_only() {
        assert!(OracleError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(OracleError::RateLimited { retry_after_ms: 10 }.is_retryable());
        assert!(OracleError::Network("reset".into()).is_retryable());
        assert!(!OracleError::Malformed("x".into()).is_retryable());
        assert!(!OracleError::Api("401".into()).is_retryable());
        assert!(!OracleError::CircuitOpen { name: "o".into() }.is_retryable());
    }

    #[test]
    fn malformed_is_not_unavailability() {
        assert!(!OracleError::Malformed("x".into()).is_unavailability());
        let exhausted = OracleError::Exhausted {
            attempts: 3,
            last: Box::new(OracleError::Timeout(Duration::from_secs(1))),
        };
        assert!(exhausted.is_unavailability());
        assert!(exhausted.to_string().contains("3 attempt(s)"));
    }
}
