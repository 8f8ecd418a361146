//! Global admission control for oracle calls.
//!
//! Bounds in-flight calls across all concurrently running papers and, when
//! configured, spaces call starts by a minimum interval.

use crate::OracleError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

#[derive(Debug)]
pub struct RateGate {
    permits: Arc<Semaphore>,
    max_in_flight: usize,
    min_interval: Duration,
    next_slot: Mutex<Instant>,
}

/// Held for the duration of a single oracle call.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl RateGate {
    pub fn new(max_in_flight: usize, min_interval: Duration) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            min_interval,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.permits.available_permits()
    }

    pub async fn acquire(&self) -> Result<GatePermit, OracleError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| OracleError::Network("rate gate closed".to_string()))?;

        if !self.min_interval.is_zero() {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            if *next > now {
                tokio::time::sleep_until(*next).await;
            }
            *next = Instant::now() + self.min_interval;
        }

        Ok(GatePermit { _permit: permit })
    }
}
