use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{EntityKind, OrchestrationError, Result};
use crate::transitions::{self, StepEvent, WorkflowEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Draft,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled
        )
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowStatus::Draft => "draft",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Error,
    Cancelled,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Error => "error",
            StepStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// One stage of a workflow, optionally delegated to an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: StepStatus,
    pub agent: Option<String>,
    pub output: Option<String>,
}

impl WorkflowStep {
    pub fn new(id: impl Into<String>, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            status: StepStatus::Pending,
            agent: None,
            output: None,
        }
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent = Some(agent_id.into());
        self
    }

    fn apply(&mut self, event: StepEvent) -> Result<StepStatus> {
        self.status = transitions::step(self.status, event)?;
        Ok(self.status)
    }
}

/// An ordered pipeline of steps executed one after another.
///
/// The step list is fixed at construction. `progress` is a cached value that
/// is recomputed from the step statuses after every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub agents: Vec<String>,
    pub status: WorkflowStatus,
    steps: Vec<WorkflowStep>,
    progress: f64,
}

impl Workflow {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        agents: Vec<String>,
        steps: Vec<WorkflowStep>,
    ) -> Result<Self> {
        let id = id.into();
        for (index, step) in steps.iter().enumerate() {
            if steps[..index].iter().any(|s| s.id == step.id) {
                return Err(OrchestrationError::Validation(format!(
                    "workflow '{}' has duplicate step id '{}'",
                    id, step.id
                )));
            }
        }

        let mut workflow = Self {
            id,
            name: name.into(),
            description: description.into(),
            agents,
            status: WorkflowStatus::Draft,
            steps,
            progress: 0.0,
        };
        workflow.progress = workflow.computed_progress();
        Ok(workflow)
    }

    pub fn steps(&self) -> &[WorkflowStep] {
        &self.steps
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn step(&self, step_id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    /// Progress as a pure function of the statuses: each completed step
    /// counts fully and an in-flight step counts for half.
    pub fn computed_progress(&self) -> f64 {
        if self.status == WorkflowStatus::Completed {
            return 100.0;
        }
        if self.steps.is_empty() {
            return 0.0;
        }

        let credit: f64 = self
            .steps
            .iter()
            .map(|s| match s.status {
                StepStatus::Completed => 1.0,
                StepStatus::Running => 0.5,
                _ => 0.0,
            })
            .sum();
        credit / self.steps.len() as f64 * 100.0
    }

    pub fn apply(&mut self, event: WorkflowEvent) -> Result<WorkflowStatus> {
        self.status = transitions::workflow(self.status, event)?;
        if event == WorkflowEvent::Reset {
            for step in &mut self.steps {
                step.apply(StepEvent::Reset)?;
                step.output = None;
            }
        }
        self.progress = self.computed_progress();
        Ok(self.status)
    }

    pub fn start_step(&mut self, index: usize) -> Result<&WorkflowStep> {
        self.step_event(index, StepEvent::Start)?;
        Ok(&self.steps[index])
    }

    pub fn complete_step(&mut self, index: usize, output: String) -> Result<&WorkflowStep> {
        self.step_event(index, StepEvent::Finish)?;
        self.steps[index].output = Some(output);
        Ok(&self.steps[index])
    }

    pub fn fail_step(&mut self, index: usize) -> Result<&WorkflowStep> {
        self.step_event(index, StepEvent::Fail)?;
        Ok(&self.steps[index])
    }

    pub fn cancel_step(&mut self, index: usize) -> Result<&WorkflowStep> {
        self.step_event(index, StepEvent::Cancel)?;
        Ok(&self.steps[index])
    }

    /// Settles an execution that lost its owner: the in-flight step ends in
    /// `error` and the workflow in `failed`. Other workflows are left alone.
    pub fn interrupt(&mut self) -> Result<()> {
        if self.status != WorkflowStatus::Running {
            return Ok(());
        }
        for index in 0..self.steps.len() {
            if self.steps[index].status == StepStatus::Running {
                self.step_event(index, StepEvent::Fail)?;
            }
        }
        self.apply(WorkflowEvent::Fail)?;
        Ok(())
    }

    fn step_event(&mut self, index: usize, event: StepEvent) -> Result<()> {
        let step = self.steps.get_mut(index).ok_or_else(|| OrchestrationError::NotFound {
            entity: EntityKind::Step,
            id: format!("{}#{}", self.id, index),
        })?;
        step.apply(event)?;
        self.progress = self.computed_progress();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_steps() -> Workflow {
        Workflow::new(
            "wf",
            "Market research",
            "",
            vec![],
            vec![
                WorkflowStep::new("collect", "Collect", ""),
                WorkflowStep::new("analyze", "Analyze", ""),
                WorkflowStep::new("report", "Report", ""),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_progress_gives_half_credit_to_running_step() {
        let mut wf = three_steps();
        wf.apply(WorkflowEvent::Start).unwrap();
        assert_eq!(wf.progress(), 0.0);

        wf.start_step(0).unwrap();
        assert!((wf.progress() - 50.0 / 3.0).abs() < 1e-9);

        wf.complete_step(0, "done".to_string()).unwrap();
        assert!((wf.progress() - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(wf.progress(), wf.computed_progress());
    }

    #[test]
    fn test_completed_workflow_reports_exactly_one_hundred() {
        let mut wf = three_steps();
        wf.apply(WorkflowEvent::Start).unwrap();
        for i in 0..3 {
            wf.start_step(i).unwrap();
            wf.complete_step(i, format!("out {}", i)).unwrap();
        }
        wf.apply(WorkflowEvent::Finish).unwrap();
        assert_eq!(wf.progress(), 100.0);
    }

    #[test]
    fn test_completed_step_cannot_revert() {
        let mut wf = three_steps();
        wf.apply(WorkflowEvent::Start).unwrap();
        wf.start_step(0).unwrap();
        wf.complete_step(0, "ok".to_string()).unwrap();

        assert!(wf.start_step(0).is_err());
        assert!(wf.fail_step(0).is_err());
        assert_eq!(wf.steps()[0].status, StepStatus::Completed);
    }

    #[test]
    fn test_reset_clears_previous_execution() {
        let mut wf = three_steps();
        wf.apply(WorkflowEvent::Start).unwrap();
        wf.start_step(0).unwrap();
        wf.fail_step(0).unwrap();
        wf.apply(WorkflowEvent::Fail).unwrap();

        wf.apply(WorkflowEvent::Reset).unwrap();
        assert_eq!(wf.status, WorkflowStatus::Draft);
        assert!(wf.steps().iter().all(|s| s.status == StepStatus::Pending && s.output.is_none()));
        assert_eq!(wf.progress(), 0.0);
    }

    #[test]
    fn test_duplicate_step_ids_are_rejected() {
        let result = Workflow::new(
            "wf",
            "dup",
            "",
            vec![],
            vec![WorkflowStep::new("a", "A", ""), WorkflowStep::new("a", "B", "")],
        );
        assert!(matches!(result, Err(OrchestrationError::Validation(_))));
    }

    #[test]
    fn test_interrupt_fails_the_running_step() {
        let mut wf = three_steps();
        wf.apply(WorkflowEvent::Start).unwrap();
        wf.start_step(0).unwrap();
        wf.complete_step(0, "kept".to_string()).unwrap();
        wf.start_step(1).unwrap();

        wf.interrupt().unwrap();
        assert_eq!(wf.status, WorkflowStatus::Failed);
        let statuses: Vec<StepStatus> = wf.steps().iter().map(|s| s.status).collect();
        assert_eq!(statuses, vec![StepStatus::Completed, StepStatus::Error, StepStatus::Pending]);
        assert_eq!(wf.steps()[0].output.as_deref(), Some("kept"));
        assert!((wf.progress() - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_interrupt_leaves_idle_workflows_alone() {
        let mut wf = three_steps();
        wf.interrupt().unwrap();
        assert_eq!(wf.status, WorkflowStatus::Draft);
    }
}
