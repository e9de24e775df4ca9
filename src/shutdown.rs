// src/shutdown.rs
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// One-shot, process-wide interrupt signal.
///
/// Waiters use [`Interrupt::fired`]. Once fired it stays fired.
#[derive(Clone, Default)]
pub struct Interrupt {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    fired: AtomicBool,
    notify: Notify,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self) {
        if self.inner.fired.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.notify.notify_waiters();
        tracing::debug!(target = "shutdown", "interrupt fired");
    }

    pub fn is_fired(&self) -> bool {
        self.inner.fired.load(Ordering::SeqCst)
    }

    /// Resolve once the interrupt has fired.
    pub async fn fired(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // register before checking the flag so a concurrent fire() is not missed
            notified.as_mut().enable();
            if self.is_fired() {
                return;
            }
            notified.await;
        }
    }
}

/// Wait for ctrl-c, then fire `interrupt` so in-flight work unwinds.
pub async fn graceful_shutdown(interrupt: Interrupt) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received, exiting...");
    interrupt.fire();
}
