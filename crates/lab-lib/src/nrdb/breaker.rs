//! Circuit breaker for the NRDB client
//!
//! Consecutive failures beyond the threshold open the circuit; calls then
//! fail fast until the cooldown elapses, after which the next call is let
//! through as a trial. A successful trial closes the circuit, a failed one
//! reopens it for another full cooldown.

use std::time::{Duration, Instant};

use crate::error::NrdbError;

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD, DEFAULT_COOLDOWN)
    }
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            consecutive_failures: 0,
            opened_at: None,
        }
    }

    /// Gate a call: `Err(CircuitOpen)` while the cooldown is running
    pub fn check(&self) -> Result<(), NrdbError> {
        if let Some(opened_at) = self.opened_at {
            let elapsed = opened_at.elapsed();
            if elapsed < self.cooldown {
                return Err(NrdbError::CircuitOpen {
                    retry_in: self.cooldown - elapsed,
                });
            }
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.check().is_err()
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.threshold {
            self.opened_at = Some(Instant::now());
        }
    }

    /// Manually close the circuit; idempotent
    pub fn reset(&mut self) {
        self.record_success();
    }
}
