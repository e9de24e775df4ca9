// src/executor.rs
use crate::error::WorkloadError;
use crate::simulator::WorkloadSimulator;
use crate::types::{ExecutionModel, WorkloadResult, current_thread_name};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinError;

/// A finished call plus the thread that ran it.
#[derive(Debug)]
pub struct Execution {
    pub model: ExecutionModel,
    pub result: WorkloadResult,
    pub thread_name: String,
}

/// Run one simulated call under `model`.
///
/// The simulator is the same for every model; only the place its future is
/// driven from changes. Must be called from a multi-thread runtime, since
/// the platform model relies on `block_in_place`.
pub async fn execute(
    sim: Arc<WorkloadSimulator>,
    model: ExecutionModel,
    input: String,
) -> Result<Execution, WorkloadError> {
    match model {
        ExecutionModel::Platform => {
            let handle = Handle::current();
            tokio::task::block_in_place(move || -> Result<Execution, WorkloadError> {
                let thread_name = current_thread_name();
                let result = handle.block_on(sim.simulate(&input, &thread_name))?;
                Ok(Execution {
                    model,
                    result,
                    thread_name,
                })
            })
        }
        ExecutionModel::Pool => {
            let handle = Handle::current();
            let joined = tokio::task::spawn_blocking(move || -> Result<Execution, WorkloadError> {
                let thread_name = current_thread_name();
                let result = handle.block_on(sim.simulate(&input, &thread_name))?;
                Ok(Execution {
                    model,
                    result,
                    thread_name,
                })
            })
            .await;
            flatten(joined)
        }
        ExecutionModel::Coroutine => {
            let thread_name = current_thread_name();
            let result = sim.simulate(&input, &thread_name).await?;
            Ok(Execution {
                model,
                result,
                thread_name,
            })
        }
        ExecutionModel::Virtual => {
            let joined = tokio::spawn(async move {
                let thread_name = current_thread_name();
                let result = sim.simulate(&input, &thread_name).await?;
                Ok::<_, WorkloadError>(Execution {
                    model,
                    result,
                    thread_name,
                })
            })
            .await;
            flatten(joined)
        }
    }
}

fn flatten<T>(joined: Result<Result<T, WorkloadError>, JoinError>) -> Result<T, WorkloadError> {
    match joined {
        Ok(res) => res,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(WorkloadError::Interrupted { sequence: None }),
    }
}
