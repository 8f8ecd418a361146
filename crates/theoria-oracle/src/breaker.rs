//! Circuit breaker shared by every pipeline that talks to the same oracle.
//!
//! ```text
//!            failures ≥ threshold (within window)
//!   Closed ─────────────────────────────────────► Open
//!     ▲                                             │ cool-down elapsed
//!     │ successes ≥ success_threshold               ▼
//!     └──────────────────────────────────────── HalfOpen ──failure──► Open
//! ```
//!
//! Only unavailability counts as a failure. A reachable oracle that answers
//! with garbage does not trip the breaker.
//!
//! While half-open, one trial call is in flight at a time; everyone else
//! keeps failing fast until that trial reports back.

use crate::OracleError;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    /// Time spent open before a trial is allowed through.
    pub cool_down: Duration,
    pub failure_window: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 1,
            cool_down: Duration::from_secs(30),
            failure_window: Duration::from_secs(120),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    success_count: u32,
    state_changed_at: Instant,
    failures: Vec<Instant>,
    trial_in_flight: bool,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                success_count: 0,
                state_changed_at: Instant::now(),
                failures: Vec::new(),
                trial_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// Admit a call, or fail fast with [`OracleError::CircuitOpen`].
    ///
    /// The outcome goes back through [`Admission::record`]. Dropping an
    /// admission unrecorded (the caller was cancelled) frees its trial slot.
    pub fn admit(&self) -> Result<Admission<'_>, OracleError> {
        let mut inner = self.inner.lock();
        if inner.state == BreakerState::Open {
            if inner.state_changed_at.elapsed() < self.config.cool_down {
                return Err(self.open_error());
            }
            debug!(breaker = %self.name, "transitioning from Open to HalfOpen");
            inner.state = BreakerState::HalfOpen;
            inner.success_count = 0;
            inner.trial_in_flight = false;
            inner.state_changed_at = Instant::now();
        }

        let trial = inner.state == BreakerState::HalfOpen;
        if trial {
            if inner.trial_in_flight {
                return Err(self.open_error());
            }
            inner.trial_in_flight = true;
        }
        Ok(Admission {
            breaker: self,
            trial,
            recorded: false,
        })
    }

    /// Record an outcome that did not go through [`CircuitBreaker::admit`].
    pub fn record<T>(&self, outcome: &Result<T, OracleError>) {
        match outcome {
            Ok(_) => self.on_success(),
            Err(e) if e.is_unavailability() => self.on_failure(),
            Err(_) => self.on_success(),
        }
    }

    fn open_error(&self) -> OracleError {
        OracleError::CircuitOpen {
            name: self.name.clone(),
        }
    }

    fn release_trial(&self) {
        self.inner.lock().trial_in_flight = false;
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    debug!(breaker = %self.name, "transitioning from HalfOpen to Closed");
                    inner.state = BreakerState::Closed;
                    inner.success_count = 0;
                    inner.failures.clear();
                    inner.state_changed_at = Instant::now();
                }
            }
            BreakerState::Closed => {
                let now = Instant::now();
                let window = self.config.failure_window;
                inner.failures.retain(|t| now.duration_since(*t) < window);
            }
            BreakerState::Open => {}
        }
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        match inner.state {
            BreakerState::HalfOpen => {
                warn!(breaker = %self.name, "trial failed, reopening circuit");
                inner.state = BreakerState::Open;
                inner.success_count = 0;
                inner.state_changed_at = now;
            }
            BreakerState::Closed => {
                let window = self.config.failure_window;
                inner.failures.push(now);
                inner.failures.retain(|t| now.duration_since(*t) < window);
                let failures = inner.failures.len() as u32;
                if failures >= self.config.failure_threshold {
                    error!(
                        breaker = %self.name,
                        failures,
                        threshold = self.config.failure_threshold,
                        "threshold exceeded, opening circuit"
                    );
                    inner.state = BreakerState::Open;
                    inner.state_changed_at = now;
                }
            }
            BreakerState::Open => {
                inner.state_changed_at = now;
            }
        }
    }
}

/// One admitted call.
#[derive(Debug)]
#[must_use = "record the call's outcome"]
pub struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    recorded: bool,
}

impl Admission<'_> {
    /// Whether this call is the half-open trial.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn record<T>(mut self, outcome: &Result<T, OracleError>) {
        self.recorded = true;
        if self.trial {
            self.breaker.release_trial();
        }
        self.breaker.record(outcome);
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if self.trial && !self.recorded {
            self.breaker.release_trial();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            BreakerConfig {
                failure_threshold: threshold,
                success_threshold: 1,
                cool_down: Duration::from_secs(10),
                failure_window: Duration::from_secs(60),
            },
        )
    }

    fn timeout() -> Result<(), OracleError> {
        Err(OracleError::Timeout(Duration::from_secs(1)))
    }

    #[tokio::test(start_paused = true)]
    async fn opens_after_threshold_and_fails_fast() {
        let b = breaker(2);
        b.record(&timeout());
        assert_eq!(b.state(), BreakerState::Closed);
        b.record(&timeout());
        assert_eq!(b.state(), BreakerState::Open);
        assert!(matches!(b.admit(), Err(OracleError::CircuitOpen { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_trial_closes_on_success() {
        let b = breaker(1);
        b.record(&timeout());
        assert_eq!(b.state(), BreakerState::Open);

        tokio::time::advance(Duration::from_secs(11)).await;
        let trial = b.admit().unwrap();
        assert!(trial.is_trial());
        assert_eq!(b.state(), BreakerState::HalfOpen);
        trial.record(&Ok::<(), OracleError>(()));
        assert_eq!(b.state(), BreakerState::Closed);
        assert!(!b.admit().unwrap().is_trial());
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_trial_failure_reopens() {
        let b = breaker(1);
        b.record(&timeout());
        tokio::time::advance(Duration::from_secs(11)).await;
        b.admit().unwrap().record(&timeout());
        assert_eq!(b.state(), BreakerState::Open);
        assert!(matches!(b.admit(), Err(OracleError::CircuitOpen { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_admits_one_trial_at_a_time() {
        let b = breaker(1);
        b.record(&timeout());
        tokio::time::advance(Duration::from_secs(11)).await;

        let trial = b.admit().unwrap();
        assert!(trial.is_trial());
        for _ in 0..3 {
            assert!(matches!(b.admit(), Err(OracleError::CircuitOpen { .. })));
        }
        assert_eq!(b.state(), BreakerState::HalfOpen);

        trial.record(&Ok::<(), OracleError>(()));
        assert_eq!(b.state(), BreakerState::Closed);
        assert!(b.admit().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_trial_frees_the_slot() {
        let b = breaker(1);
        b.record(&timeout());
        tokio::time::advance(Duration::from_secs(11)).await;

        drop(b.admit().unwrap());
        assert_eq!(b.state(), BreakerState::HalfOpen);
        let next = b.admit().unwrap();
        assert!(next.is_trial());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_answers_do_not_trip() {
        let b = breaker(1);
        b.record(&Err::<(), _>(OracleError::Malformed("nope".into())));
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn old_failures_leave_the_window() {
        let b = breaker(2);
        b.record(&timeout());
        tokio::time::advance(Duration::from_secs(61)).await;
        b.record(&timeout());
        assert_eq!(b.state(), BreakerState::Closed);
    }
}
