// src/simulator.rs
use crate::counter::RequestCounter;
use crate::delay::DelaySpec;
use crate::error::WorkloadError;
use crate::sleeper::Sleeper;
use crate::types::{WorkloadResult, current_thread_name};
use std::sync::Arc;
use tracing::{debug, warn};

/// Simulated variable-latency work, safe under any number of concurrent callers.
///
/// The counter is the only shared mutable state; it is injected so several
/// simulators (or tests) can own isolated counters.
pub struct WorkloadSimulator {
    name: String,
    counter: Arc<RequestCounter>,
    delays: DelaySpec,
    sleeper: Arc<dyn Sleeper>,
}

impl WorkloadSimulator {
    pub fn new(
        name: impl Into<String>,
        counter: Arc<RequestCounter>,
        delays: DelaySpec,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            name: name.into(),
            counter,
            delays,
            sleeper,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take a sequence number, sleep for the sampled delay, describe the call.
    ///
    /// The increment happens before the only await point, so a cancelled or
    /// interrupted call consumes exactly one sequence number.
    pub async fn simulate(
        &self,
        input: &str,
        context: &str,
    ) -> Result<WorkloadResult, WorkloadError> {
        let sequence = self.counter.increment();
        let delay = self.delays.sample(sequence);
        debug!(
            target = "simulator",
            service = %self.name,
            sequence,
            delay_ms = delay.as_millis() as u64,
            "simulate: sleeping"
        );

        if self.sleeper.sleep(delay).await.is_err() {
            warn!(
                target = "simulator",
                service = %self.name,
                sequence,
                "simulate: interrupted during suspension"
            );
            return Err(WorkloadError::interrupted(sequence));
        }

        Ok(WorkloadResult {
            sequence,
            input: input.to_string(),
            delay,
            context: context.to_string(),
        })
    }

    pub fn requests_processed(&self) -> u64 {
        self.counter.current()
    }

    pub fn health(&self) -> String {
        format!(
            "{}: {} requests processed, running on {}",
            self.name,
            self.requests_processed(),
            current_thread_name()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::Interrupt;
    use crate::sleeper::{SleepInterrupted, TokioSleeper};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::time::Duration;

    fn simulator(sleeper: Arc<dyn Sleeper>) -> Arc<WorkloadSimulator> {
        Arc::new(WorkloadSimulator::new(
            "Test",
            Arc::new(RequestCounter::new()),
            DelaySpec::default(),
            sleeper,
        ))
    }

    /// Returns immediately, so stress runs do not wait on real timers.
    struct NoopSleeper;

    #[async_trait]
    impl Sleeper for NoopSleeper {
        async fn sleep(&self, _duration: Duration) -> Result<(), SleepInterrupted> {
            tokio::task::yield_now().await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn echoes_empty_input() {
        let sim = simulator(Arc::new(TokioSleeper::default()));
        let result = sim.simulate("", "worker-1").await.unwrap();
        assert_eq!(result.input, "");
        assert_eq!(result.sequence, 1);
        assert_eq!(result.context, "worker-1");
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_exactly_the_reported_delay() {
        let sim = simulator(Arc::new(TokioSleeper::default()));
        let start = tokio::time::Instant::now();
        let result = sim.simulate("x", "ctx").await.unwrap();
        assert_eq!(start.elapsed(), result.delay);
    }

    #[tokio::test(start_paused = true)]
    async fn thousand_concurrent_calls_get_one_to_n() {
        let sim = simulator(Arc::new(TokioSleeper::default()));
        let mut handles = Vec::new();
        for i in 0..1000 {
            let sim = Arc::clone(&sim);
            handles.push(tokio::spawn(async move {
                sim.simulate(&format!("req-{i}"), "ctx").await
            }));
        }

        let mut seen = HashSet::new();
        for h in handles {
            let result = h.await.unwrap().unwrap();
            let ms = result.delay_ms();
            if result.sequence % 10 == 0 {
                assert!((60..=210).contains(&ms), "seq={} ms={ms}", result.sequence);
            } else {
                assert!((50..=200).contains(&ms), "seq={} ms={ms}", result.sequence);
            }
            assert!(seen.insert(result.sequence));
        }
        assert_eq!(seen, (1..=1000).collect::<HashSet<u64>>());
        assert_eq!(sim.requests_processed(), 1000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn hundred_contexts_across_worker_threads() {
        let sim = simulator(Arc::new(NoopSleeper));
        let mut handles = Vec::new();
        for _ in 0..100 {
            let sim = Arc::clone(&sim);
            handles.push(tokio::spawn(async move {
                let mut ids = Vec::new();
                for _ in 0..50 {
                    ids.push(sim.simulate("load", "ctx").await.unwrap().sequence);
                }
                ids
            }));
        }

        let mut seen = HashSet::new();
        for h in handles {
            for id in h.await.unwrap() {
                assert!(seen.insert(id), "duplicate sequence {id}");
            }
        }
        assert_eq!(seen, (1..=5000).collect::<HashSet<u64>>());
    }

    #[tokio::test(start_paused = true)]
    async fn interrupted_call_consumes_one_sequence() {
        let interrupt = Interrupt::new();
        let sim = simulator(Arc::new(TokioSleeper::new(interrupt.clone())));

        let first = sim.simulate("a", "ctx").await.unwrap();
        assert_eq!(first.sequence, 1);

        let pending = {
            let sim = Arc::clone(&sim);
            tokio::spawn(async move { sim.simulate("b", "ctx").await })
        };
        tokio::time::sleep(Duration::from_millis(1)).await;
        interrupt.fire();
        assert_eq!(
            pending.await.unwrap(),
            Err(WorkloadError::interrupted(2))
        );
        assert_eq!(sim.requests_processed(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_call_leaves_counter_consistent() {
        let sim = simulator(Arc::new(TokioSleeper::default()));
        let last = sim.simulate("a", "ctx").await.unwrap().sequence;

        let cancelled = {
            let sim = Arc::clone(&sim);
            tokio::spawn(async move { sim.simulate("b", "ctx").await })
        };
        tokio::time::sleep(Duration::from_millis(1)).await;
        cancelled.abort();
        assert!(cancelled.await.unwrap_err().is_cancelled());

        // the cancelled call committed exactly one increment
        let observed = sim.requests_processed();
        assert_eq!(observed, last + 1);
        let next = sim.simulate("c", "ctx").await.unwrap().sequence;
        assert_eq!(next, observed + 1);
    }

    #[tokio::test]
    async fn health_reports_count() {
        let sim = simulator(Arc::new(NoopSleeper));
        sim.simulate("a", "ctx").await.unwrap();
        sim.simulate("b", "ctx").await.unwrap();
        assert!(sim.health().starts_with("Test: 2 requests processed, running on "));
    }
}
