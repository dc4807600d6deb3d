use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{WorkError, WorkUnit};
use crate::clock::{Clock, SystemClock};
use crate::error::{EntityKind, OrchestrationError, Result};
use crate::model::{NewTask, Task, TaskStatus, Workflow, WorkflowStatus, WorkflowStep};
use crate::notifications::NotificationSink;
use crate::store::Stores;
use crate::transitions::{AgentEvent, TaskEvent, WorkflowEvent};

/// Drives tasks and workflows through their lifecycles.
///
/// Each task and workflow execution owns its record for the duration of the
/// run; the status guard at entry keeps a record from being run twice at once.
/// Different tasks and workflows share nothing but agent assignments, so they
/// can run concurrently.
/// How a started step ended
enum StepOutcome {
    Completed { progress: f64 },
    Failed(String),
    Cancelled,
}

#[derive(Clone)]
pub struct Orchestrator {
    stores: Stores,
    work: Arc<dyn WorkUnit>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    pub fn new(stores: Stores, work: Arc<dyn WorkUnit>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self {
            stores,
            work,
            notifier,
            clock: Arc::new(SystemClock::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub async fn create_task(&self, new_task: NewTask) -> Result<Task> {
        let title = new_task.title.trim();
        if title.is_empty() {
            return Err(OrchestrationError::Validation("task title must not be empty".to_string()));
        }

        let mut task = Task::new(
            uuid::Uuid::new_v4().to_string(),
            title,
            new_task.description,
            new_task.priority,
            self.clock.now(),
        );
        task.assigned_agent = new_task.assigned_agent;
        self.stores.tasks.insert_front(task.clone()).await?;

        info!(task_id = %task.id, title = %task.title, priority = ?task.priority, "Task created");
        self.notifier
            .success("Task created", "New task added to the execution list.");
        Ok(task)
    }

    pub async fn run_task(&self, task_id: &str) -> Result<Task> {
        self.run_task_until(task_id, &CancellationToken::new()).await
    }

    /// Runs a pending task, giving up at the suspension point if `cancel` fires
    pub async fn run_task_until(&self, task_id: &str, cancel: &CancellationToken) -> Result<Task> {
        let started_at = self.clock.now();
        let task = self
            .stores
            .tasks
            .update(task_id, |task| {
                if task.status != TaskStatus::Pending {
                    return Err(OrchestrationError::InvalidState {
                        entity: EntityKind::Task,
                        id: task.id.clone(),
                        status: task.status.to_string(),
                    });
                }
                task.apply(TaskEvent::Start, started_at)?;
                Ok(task.clone())
            })
            .await
            .inspect_err(|e| warn!(task_id, error = %e, "Task not started"))?;
        info!(task_id, title = %task.title, "Task started");

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.work.execute_task(&task) => Some(result),
        };

        match outcome {
            Some(Ok(())) => {
                let task = self.settle_task(task_id, TaskEvent::Finish).await?;
                info!(task_id, "Task completed");
                self.notifier.success(
                    "Task completed",
                    "The task was executed successfully by the agents.",
                );
                Ok(task)
            }
            Some(Err(WorkError { reason })) => {
                self.settle_task(task_id, TaskEvent::Fail).await?;
                warn!(task_id, reason = %reason, "Task failed");
                self.notifier
                    .error("Task failed", &format!("{}: {}", task.title, reason));
                Err(OrchestrationError::TaskFailed {
                    task_id: task_id.to_string(),
                    reason,
                })
            }
            None => {
                self.settle_task(task_id, TaskEvent::Cancel).await?;
                info!(task_id, "Task cancelled");
                self.notifier
                    .error("Task cancelled", &format!("{} was cancelled.", task.title));
                Err(OrchestrationError::Cancelled {
                    entity: EntityKind::Task,
                    id: task_id.to_string(),
                })
            }
        }
    }

    async fn settle_task(&self, task_id: &str, event: TaskEvent) -> Result<Task> {
        let at = self.clock.now();
        self.stores
            .tasks
            .update(task_id, |task| {
                task.apply(event, at)?;
                Ok(task.clone())
            })
            .await
    }

    pub async fn run_workflow(&self, workflow_id: &str) -> Result<Workflow> {
        self.run_workflow_until(workflow_id, &CancellationToken::new()).await
    }

    /// Executes the steps of a workflow strictly in order.
    ///
    /// Step N+1 starts only after step N completed. A failed or cancelled
    /// step halts the pipeline; steps that already completed keep their
    /// status and output.
    pub async fn run_workflow_until(&self, workflow_id: &str, cancel: &CancellationToken) -> Result<Workflow> {
        let workflow = self
            .stores
            .workflows
            .update(workflow_id, |wf| {
                if wf.status == WorkflowStatus::Running {
                    return Err(OrchestrationError::AlreadyRunning(wf.id.clone()));
                }
                if wf.status.is_terminal() {
                    wf.apply(WorkflowEvent::Reset)?;
                }
                wf.apply(WorkflowEvent::Start)?;
                Ok(wf.clone())
            })
            .await
            .inspect_err(|e| warn!(workflow_id, error = %e, "Workflow not started"))?;

        let total = workflow.steps().len();
        info!(workflow_id, name = %workflow.name, steps = total, "Workflow started");

        for index in 0..total {
            let planned = &workflow.steps()[index];
            if cancel.is_cancelled() {
                return self.cancel_workflow(workflow_id, &workflow.name).await;
            }

            let agent = match &planned.agent {
                Some(agent_id) => match self.stores.agents.claim(agent_id, self.clock.now()).await {
                    Ok(true) => Some(agent_id.clone()),
                    Ok(false) => {
                        warn!(workflow_id, step = %planned.name, agent_id = %agent_id, "Step agent is not registered");
                        None
                    }
                    Err(err) => {
                        self.halt_workflow(workflow_id, &workflow.name, &planned.name, &err.to_string())
                            .await?;
                        return Err(err);
                    }
                },
                None => None,
            };

            let (step, outcome) = match self.run_step(workflow_id, index, cancel).await {
                Ok(done) => done,
                Err(err) => {
                    // Never leave the agent claimed
                    self.release_agent(agent.as_deref(), AgentEvent::Fail).await;
                    warn!(workflow_id, step = %planned.name, error = %err, "Step could not be recorded");
                    return Err(err);
                }
            };

            match outcome {
                StepOutcome::Completed { progress } => {
                    self.release_agent(agent.as_deref(), AgentEvent::Finish).await;
                    debug!(workflow_id, step = %step.name, progress, "Step completed");
                }
                StepOutcome::Failed(reason) => {
                    self.release_agent(agent.as_deref(), AgentEvent::Fail).await;
                    warn!(workflow_id, step = %step.name, reason = %reason, "Workflow step failed");
                    self.notifier.error(
                        "Workflow failed",
                        &format!("{} stopped at step '{}': {}", workflow.name, step.name, reason),
                    );
                    return Err(OrchestrationError::StepFailed {
                        workflow_id: workflow_id.to_string(),
                        step_id: step.id,
                        reason,
                    });
                }
                StepOutcome::Cancelled => {
                    self.release_agent(agent.as_deref(), AgentEvent::Release).await;
                    return self.cancelled(workflow_id, &workflow.name);
                }
            }
        }

        let finished = self
            .stores
            .workflows
            .update(workflow_id, |wf| {
                wf.apply(WorkflowEvent::Finish)?;
                Ok(wf.clone())
            })
            .await?;
        info!(workflow_id, name = %finished.name, "Workflow completed");
        self.notifier.success(
            "Workflow completed",
            &format!("{} was executed successfully!", finished.name),
        );
        Ok(finished)
    }

    /// Starts one step, awaits its work and records the outcome.
    ///
    /// Agent bookkeeping stays with the caller, which must release the agent
    /// whatever this returns.
    async fn run_step(
        &self,
        workflow_id: &str,
        index: usize,
        cancel: &CancellationToken,
    ) -> Result<(WorkflowStep, StepOutcome)> {
        let (current, step) = self
            .stores
            .workflows
            .update(workflow_id, |wf| {
                let step = wf.start_step(index)?.clone();
                Ok((wf.clone(), step))
            })
            .await?;
        debug!(workflow_id, step = %step.name, progress = current.progress(), "Step started");

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.work.execute_step(&current, &step) => Some(result),
        };

        let outcome = match result {
            Some(Ok(output)) => {
                let progress = self
                    .stores
                    .workflows
                    .update(workflow_id, |wf| {
                        wf.complete_step(index, output)?;
                        Ok(wf.progress())
                    })
                    .await?;
                StepOutcome::Completed { progress }
            }
            Some(Err(WorkError { reason })) => {
                self.stores
                    .workflows
                    .update(workflow_id, |wf| {
                        wf.fail_step(index)?;
                        wf.apply(WorkflowEvent::Fail).map(|_| ())
                    })
                    .await?;
                StepOutcome::Failed(reason)
            }
            None => {
                self.stores
                    .workflows
                    .update(workflow_id, |wf| {
                        wf.cancel_step(index)?;
                        wf.apply(WorkflowEvent::Cancel).map(|_| ())
                    })
                    .await?;
                StepOutcome::Cancelled
            }
        };
        Ok((step, outcome))
    }

    /// Ends the execution before the step at hand could start
    async fn halt_workflow(&self, workflow_id: &str, name: &str, step_name: &str, reason: &str) -> Result<()> {
        self.stores
            .workflows
            .update(workflow_id, |wf| wf.apply(WorkflowEvent::Fail).map(|_| ()))
            .await?;
        warn!(workflow_id, step = %step_name, reason, "Workflow halted");
        self.notifier.error(
            "Workflow failed",
            &format!("{} could not start step '{}': {}", name, step_name, reason),
        );
        Ok(())
    }

    /// Cancels between steps, when no step is in flight
    async fn cancel_workflow(&self, workflow_id: &str, name: &str) -> Result<Workflow> {
        self.stores
            .workflows
            .update(workflow_id, |wf| wf.apply(WorkflowEvent::Cancel).map(|_| ()))
            .await?;
        self.cancelled(workflow_id, name)
    }

    fn cancelled(&self, workflow_id: &str, name: &str) -> Result<Workflow> {
        info!(workflow_id, "Workflow cancelled");
        self.notifier
            .error("Workflow cancelled", &format!("{} was cancelled.", name));
        Err(OrchestrationError::Cancelled {
            entity: EntityKind::Workflow,
            id: workflow_id.to_string(),
        })
    }

    async fn release_agent(&self, agent: Option<&str>, event: AgentEvent) {
        let Some(agent_id) = agent else {
            return;
        };
        if let Err(e) = self.stores.agents.release(agent_id, event, self.clock.now()).await {
            warn!(agent_id, error = %e, "Could not release agent");
        }
    }
}
