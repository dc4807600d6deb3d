use async_trait::async_trait;
use std::time::Duration;

use super::{WorkError, WorkUnit};
use crate::config::SimulationConfig;
use crate::model::{Task, Workflow, WorkflowStep};

/// Fixed-delay stand-in for real agent execution
#[derive(Debug, Clone)]
pub struct SimulatedWork {
    task_duration: Duration,
    step_duration: Duration,
}

impl SimulatedWork {
    pub fn new(task_duration: Duration, step_duration: Duration) -> Self {
        Self {
            task_duration,
            step_duration,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(
            Duration::from_millis(config.task_duration_ms),
            Duration::from_millis(config.step_duration_ms),
        )
    }
}

impl Default for SimulatedWork {
    fn default() -> Self {
        Self::from_config(&SimulationConfig::default())
    }
}

#[async_trait]
impl WorkUnit for SimulatedWork {
    async fn execute_task(&self, task: &Task) -> Result<(), WorkError> {
        tracing::debug!(task_id = %task.id, "Simulating task execution");
        tokio::time::sleep(self.task_duration).await;
        Ok(())
    }

    async fn execute_step(&self, workflow: &Workflow, step: &WorkflowStep) -> Result<String, WorkError> {
        tracing::debug!(workflow_id = %workflow.id, step = %step.name, "Simulating step execution");
        tokio::time::sleep(self.step_duration).await;
        Ok(format!("Execution result: {} completed successfully.", step.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;
    use chrono::Utc;

    #[tokio::test]
    async fn test_step_output_names_the_step() {
        let work = SimulatedWork::new(Duration::from_millis(1), Duration::from_millis(1));
        let step = WorkflowStep::new("step1", "Data Collection", "");
        let workflow = Workflow::new("wf", "Research", "", vec![], vec![step.clone()]).unwrap();

        let output = work.execute_step(&workflow, &step).await.unwrap();
        assert_eq!(output, "Execution result: Data Collection completed successfully.");
    }

    #[tokio::test]
    async fn test_task_waits_for_configured_duration() {
        let work = SimulatedWork::new(Duration::from_millis(20), Duration::from_millis(1));
        let task = Task::new("t", "Plan", "", Priority::Low, Utc::now());

        let started = std::time::Instant::now();
        work.execute_task(&task).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
