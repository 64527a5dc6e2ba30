//! Pre-request pacing policies.
//!
//! Pacing is a fixed delay applied before every individual network
//! attempt - a naive rate limiter, not adaptive backoff. It is modeled
//! as an injectable policy so tests run with zero delay.

use std::time::Duration;

use async_trait::async_trait;

/// Pauses a worker before a network attempt.
#[async_trait]
pub trait PacePolicy: Send + Sync {
    /// Waits out the policy's delay.
    async fn pause(&self);
}

/// Fixed pre-request delay. A zero delay returns immediately.
#[derive(Debug, Clone, Copy)]
pub struct FixedPace {
    delay: Duration,
}

impl FixedPace {
    /// Creates a fixed pacing policy.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Returns the configured delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[async_trait]
impl PacePolicy for FixedPace {
    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}
