// src/sleeper.rs
use crate::shutdown::Interrupt;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("sleep interrupted")]
pub struct SleepInterrupted;

/// The one suspension point of a simulated workload.
///
/// Implementations must yield to the scheduler instead of parking the
/// thread, so the same caller works inline, on a spawned task, or under
/// `Handle::block_on` on a dedicated OS thread.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration) -> Result<(), SleepInterrupted>;
}

/// Tokio timer that gives up as soon as the interrupt fires.
#[derive(Clone, Default)]
pub struct TokioSleeper {
    interrupt: Interrupt,
}

impl TokioSleeper {
    pub fn new(interrupt: Interrupt) -> Self {
        Self { interrupt }
    }
}

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) -> Result<(), SleepInterrupted> {
        if self.interrupt.is_fired() {
            return Err(SleepInterrupted);
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.interrupt.fired() => Err(SleepInterrupted),
        }
    }
}
