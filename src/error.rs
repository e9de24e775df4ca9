// src/error.rs
use thiserror::Error;

/// Errors surfaced by a simulated workload call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkloadError {
    /// The suspension step was cut short. The sequence number stays consumed.
    ///
    /// `sequence` is `None` when the runtime cancelled the worker task before
    /// its number could be reported back.
    #[error("processing interrupted{}", for_request(.sequence))]
    Interrupted { sequence: Option<u64> },
}

impl WorkloadError {
    pub fn interrupted(sequence: u64) -> Self {
        WorkloadError::Interrupted {
            sequence: Some(sequence),
        }
    }
}

fn for_request(sequence: &Option<u64>) -> String {
    match sequence {
        Some(n) => format!(" for request {n}"),
        None => String::new(),
    }
}

/// Errors from component registry lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("no component named '{0}'")]
    NotFound(String),
}
