// src/counter.rs
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic request counter owned by one simulator.
///
/// `increment` is the only mutation. Every call returns a value strictly greater
/// than all values handed out before it, whatever the number of callers.
#[derive(Debug, Default)]
pub struct RequestCounter {
    value: AtomicU64,
}

impl RequestCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the next sequence number. The first call returns 1.
    pub fn increment(&self) -> u64 {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Last value handed out (0 before the first call).
    pub fn current(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn starts_at_one() {
        let counter = RequestCounter::new();
        assert_eq!(counter.current(), 0);
        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.increment(), 2);
        assert_eq!(counter.current(), 2);
    }

    #[test]
    fn no_duplicates_across_os_threads() {
        let counter = Arc::new(RequestCounter::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || (0..500).map(|_| counter.increment()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 8000);
        assert_eq!(seen, (1..=8000).collect::<HashSet<u64>>());
        assert_eq!(counter.current(), 8000);
    }

    #[test]
    fn values_increase_within_a_thread() {
        let counter = RequestCounter::new();
        let mut last = 0;
        for _ in 0..100 {
            let n = counter.increment();
            assert!(n > last);
            last = n;
        }
    }
}
