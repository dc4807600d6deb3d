pub mod orchestrator;
pub mod simulated;

use async_trait::async_trait;

use crate::model::{Task, Workflow, WorkflowStep};

pub use orchestrator::Orchestrator;
pub use simulated::SimulatedWork;

/// Failure reported by a unit of work
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{reason}")]
pub struct WorkError {
    pub reason: String,
}

impl WorkError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// The asynchronous work behind a task or a workflow step.
///
/// Implementations stand in for real agent back-ends. The orchestrator awaits
/// them at its suspension points and never assumes how long they take.
#[async_trait]
pub trait WorkUnit: Send + Sync {
    async fn execute_task(&self, task: &Task) -> Result<(), WorkError>;

    /// Runs one step and returns its textual output summary
    async fn execute_step(&self, workflow: &Workflow, step: &WorkflowStep) -> Result<String, WorkError>;
}
