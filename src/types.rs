// src/types.rs
use std::fmt;
use std::time::Duration;

/// Outcome of one simulated call. Built once, never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkloadResult {
    pub sequence: u64,
    pub input: String,
    pub delay: Duration,
    pub context: String,
}

impl WorkloadResult {
    pub fn delay_ms(&self) -> u64 {
        self.delay.as_millis() as u64
    }
}

/// How a request handler runs the simulated workload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExecutionModel {
    /// Occupies the request's OS thread for the whole call.
    Platform,
    /// Handed to the runtime's blocking pool.
    Pool,
    /// Awaited inline in the connection task.
    Coroutine,
    /// One freshly spawned lightweight task per call.
    Virtual,
}

impl ExecutionModel {
    /// Mode label used inside the result string.
    pub fn mode(&self) -> &'static str {
        match self {
            ExecutionModel::Platform => "Sync",
            ExecutionModel::Pool => "Async",
            ExecutionModel::Coroutine => "Coroutine",
            ExecutionModel::Virtual => "Virtual",
        }
    }

    /// `threadType` reported to clients.
    pub fn thread_type(&self) -> &'static str {
        match self {
            ExecutionModel::Platform => "Platform Thread",
            ExecutionModel::Pool => "Async with Blocking Pool",
            ExecutionModel::Coroutine => "Coroutine",
            ExecutionModel::Virtual => "Virtual Thread",
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, ExecutionModel::Virtual)
    }
}

impl fmt::Display for ExecutionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.thread_type())
    }
}

/// Name of the OS thread running the caller.
pub fn current_thread_name() -> String {
    let thread = std::thread::current();
    match thread.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", thread.id()),
    }
}
