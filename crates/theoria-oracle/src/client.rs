//! The oracle client every phase goes through.
//!
//! One call = gate permit → breaker admission → timed oracle call. Transient
//! failures are retried with backoff up to the attempt budget; when the budget
//! is spent the caller sees [`OracleError::Exhausted`].

use crate::breaker::{BreakerConfig, BreakerState, CircuitBreaker};
use crate::gate::RateGate;
use crate::retry::RetryPolicy;
use crate::{OracleError, OracleRequest, OracleResponse, TextOracle};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Hard ceiling on attempts per oracle request, whatever the config says.
pub const MAX_ORACLE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleClientConfig {
    /// Clamped to `1..=MAX_ORACLE_ATTEMPTS`.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
    pub call_timeout_ms: u64,
    pub max_in_flight: usize,
    pub min_interval_ms: u64,
    pub breaker_failure_threshold: u32,
    pub breaker_success_threshold: u32,
    pub breaker_cool_down_ms: u64,
    pub breaker_failure_window_ms: u64,
}

impl Default for OracleClientConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 8_000,
            backoff_multiplier: 2.0,
            jitter: true,
            call_timeout_ms: 60_000,
            max_in_flight: 4,
            min_interval_ms: 0,
            breaker_failure_threshold: 5,
            breaker_success_threshold: 1,
            breaker_cool_down_ms: 30_000,
            breaker_failure_window_ms: 120_000,
        }
    }
}

impl OracleClientConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.clamp(1, MAX_ORACLE_ATTEMPTS),
            initial_delay: Duration::from_millis(self.initial_backoff_ms),
            max_delay: Duration::from_millis(self.max_backoff_ms),
            backoff_multiplier: self.backoff_multiplier,
            jitter: self.jitter,
        }
    }

    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.breaker_failure_threshold.max(1),
            success_threshold: self.breaker_success_threshold.max(1),
            cool_down: Duration::from_millis(self.breaker_cool_down_ms),
            failure_window: Duration::from_millis(self.breaker_failure_window_ms),
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

struct ClientInner {
    oracle: Arc<dyn TextOracle>,
    gate: RateGate,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    call_timeout: Duration,
    calls: AtomicU64,
}

/// Cheap to clone; clones share the gate, breaker and counters.
#[derive(Clone)]
pub struct OracleClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for OracleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleClient")
            .field("oracle", &self.inner.oracle.name())
            .field("breaker", &self.inner.breaker.state())
            .finish()
    }
}

impl OracleClient {
    pub fn new(oracle: Arc<dyn TextOracle>, config: &OracleClientConfig) -> Self {
        let breaker = CircuitBreaker::new(oracle.name().to_string(), config.breaker_config());
        Self {
            inner: Arc::new(ClientInner {
                gate: RateGate::new(
                    config.max_in_flight,
                    Duration::from_millis(config.min_interval_ms),
                ),
                breaker,
                retry: config.retry_policy(),
                call_timeout: config.call_timeout(),
                calls: AtomicU64::new(0),
                oracle,
            }),
        }
    }

    pub fn oracle_name(&self) -> &str {
        self.inner.oracle.name()
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.inner.breaker.state()
    }

    /// Oracle invocations actually made (retries included, breaker rejections excluded).
    pub fn calls_made(&self) -> u64 {
        self.inner.calls.load(Ordering::Relaxed)
    }

    pub async fn request(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        let retry = &self.inner.retry;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(request).await {
                Ok(response) => {
                    if attempt > 1 {
                        debug!(role = %request.role, attempt, "oracle call succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(err) if retry.should_retry(attempt, &err) => {
                    let delay = retry.delay(attempt, &err);
                    warn!(
                        role = %request.role,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying oracle call after delay"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) if err.is_retryable() => {
                    warn!(role = %request.role, attempts = attempt, error = %err, "oracle retry budget exhausted");
                    return Err(OracleError::Exhausted {
                        attempts: attempt,
                        last: Box::new(err),
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub async fn extract(&self, text: &str) -> Result<OracleResponse, OracleError> {
        self.request(&OracleRequest::extract(text)).await
    }

    pub async fn classify(
        &self,
        payload: &crate::ClassifyPayload,
    ) -> Result<OracleResponse, OracleError> {
        self.request(&OracleRequest::classify(payload)).await
    }

    async fn attempt(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        let _permit = self.inner.gate.acquire().await?;
        let admission = self.inner.breaker.admit()?;

        self.inner.calls.fetch_add(1, Ordering::Relaxed);
        let timeout = self.inner.call_timeout;
        let outcome = match tokio::time::timeout(timeout, self.inner.oracle.call(request)).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout(timeout)),
        };
        admission.record(&outcome);

        if let Err(err) = &outcome {
            debug!(
                oracle = self.inner.oracle.name(),
                role = %request.role,
                error = %err,
                "oracle call failed"
            );
        }
        outcome
    }
}
