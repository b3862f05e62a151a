//! Exponential reconnect backoff with full jitter

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Backoff policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Give up after this many consecutive failures; None retries forever
    pub max_attempts: Option<u32>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            max_attempts: None,
        }
    }
}

/// Reconnect delay generator
///
/// The n-th consecutive failure waits a uniformly random duration in
/// `[0, min(max_delay, base_delay * 2^n)]`.
#[derive(Debug)]
pub struct Backoff {
    config: BackoffConfig,
    attempts: u32,
    rng: StdRng,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            attempts: 0,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic jitter for tests
    pub fn with_seed(config: BackoffConfig, seed: u64) -> Self {
        Self {
            config,
            attempts: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Upper bound of the delay for a given attempt number
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.min(32)).unwrap_or(u64::MAX);
        let ms = self
            .config
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.config.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// Record a failure and return how long to wait before the next try
    pub fn next_delay(&mut self) -> Duration {
        let ceiling = self.ceiling(self.attempts);
        self.attempts = self.attempts.saturating_add(1);
        let ms = self.rng.random_range(0..=ceiling.as_millis() as u64);
        Duration::from_millis(ms)
    }

    /// Consecutive failures since the last success
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// True once `max_attempts` consecutive failures have been recorded
    pub fn exhausted(&self) -> bool {
        self.config
            .max_attempts
            .is_some_and(|max| self.attempts >= max)
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}
