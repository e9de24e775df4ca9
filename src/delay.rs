// src/delay.rs
use crate::config::WorkloadCfg;
use rand::Rng;
use std::time::Duration;

/// Delay range plus the fixed penalty given to every `penalty_every`-th request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DelaySpec {
    pub min_ms: u64,
    pub max_ms: u64,
    pub penalty_ms: u64,
    pub penalty_every: u64,
}

impl Default for DelaySpec {
    fn default() -> Self {
        Self {
            min_ms: 50,
            max_ms: 200,
            penalty_ms: 10,
            penalty_every: 10,
        }
    }
}

impl From<&WorkloadCfg> for DelaySpec {
    fn from(cfg: &WorkloadCfg) -> Self {
        Self {
            min_ms: cfg.min_delay_ms,
            max_ms: cfg.max_delay_ms,
            penalty_ms: cfg.penalty_ms,
            penalty_every: cfg.penalty_every,
        }
    }
}

impl DelaySpec {
    /// Draw a base delay from `[min_ms, max_ms]` and apply the penalty for `sequence`.
    ///
    /// Uses the thread-local generator, so concurrent callers never share RNG state.
    pub fn sample(&self, sequence: u64) -> Duration {
        let base = rand::rng().random_range(self.min_ms..=self.max_ms);
        self.adjust(sequence, base)
    }

    pub fn adjust(&self, sequence: u64, base_ms: u64) -> Duration {
        let ms = if self.is_penalized(sequence) {
            base_ms.saturating_add(self.penalty_ms)
        } else {
            base_ms
        };
        Duration::from_millis(ms)
    }

    pub fn is_penalized(&self, sequence: u64) -> bool {
        self.penalty_every != 0 && sequence % self.penalty_every == 0
    }

    /// Largest delay `sample` can return.
    pub fn upper_bound(&self) -> Duration {
        Duration::from_millis(self.max_ms.saturating_add(self.penalty_ms))
    }
}
