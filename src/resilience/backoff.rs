//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

use crate::config::schema::HttpConfig;

/// Delay schedule between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base_ms: u64,
    pub max_ms: u64,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self { base_ms, max_ms }
    }

    /// No waiting at all; used by tests that exercise retry counts.
    pub fn none() -> Self {
        Self::new(0, 0)
    }

    /// Delay before retry number `attempt` (1-based): the base doubled per
    /// earlier retry, capped at `max_ms`, plus up to a tenth more as jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with(&mut rand::thread_rng(), attempt)
    }

    /// `delay` with an explicit random source.
    pub fn delay_with<R: Rng + ?Sized>(&self, rng: &mut R, attempt: u32) -> Duration {
        let Some(doublings) = attempt.checked_sub(1) else {
            return Duration::ZERO;
        };
        let factor = 1u64.checked_shl(doublings).unwrap_or(u64::MAX);
        let ceiling = self.base_ms.saturating_mul(factor).min(self.max_ms);
        let spread = ceiling / 10;
        let jitter = if spread == 0 { 0 } else { rng.gen_range(0..spread) };
        Duration::from_millis(ceiling + jitter)
    }
}

impl From<&HttpConfig> for Backoff {
    fn from(config: &HttpConfig) -> Self {
        Self::new(config.base_delay_ms, config.max_delay_ms)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from(&HttpConfig::default())
    }
}
