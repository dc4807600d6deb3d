//! Legal status transitions for every entity.
//!
//! These are pure functions from (current status, event) to the next status.
//! They never touch timestamps; callers stamp those together with the
//! status change.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{EntityKind, OrchestrationError, Result};
use crate::model::{AgentStatus, StepStatus, TaskStatus, WorkflowStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEvent {
    Start,
    Finish,
    Fail,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepEvent {
    Start,
    Finish,
    Fail,
    Cancel,
    /// Only issued by a workflow reset between executions
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEvent {
    Start,
    Finish,
    Fail,
    Cancel,
    /// Begins a new execution of a workflow that reached a terminal state
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentEvent {
    Assign,
    Finish,
    Fail,
    Release,
}

macro_rules! event_display {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", format!("{:?}", self).to_lowercase())
            }
        })*
    };
}

event_display!(TaskEvent, StepEvent, WorkflowEvent, AgentEvent);

fn invalid(entity: EntityKind, from: impl fmt::Display, event: impl fmt::Display) -> OrchestrationError {
    OrchestrationError::InvalidTransition {
        entity,
        from: from.to_string(),
        event: event.to_string(),
    }
}

pub fn task(from: TaskStatus, event: TaskEvent) -> Result<TaskStatus> {
    use TaskStatus::*;
    match (from, event) {
        (Pending, TaskEvent::Start) => Ok(InProgress),
        (InProgress, TaskEvent::Finish) => Ok(Completed),
        (InProgress, TaskEvent::Fail) => Ok(Failed),
        (InProgress, TaskEvent::Cancel) => Ok(Cancelled),
        _ => Err(invalid(EntityKind::Task, from, event)),
    }
}

pub fn step(from: StepStatus, event: StepEvent) -> Result<StepStatus> {
    use StepStatus::*;
    match (from, event) {
        (Pending, StepEvent::Start) => Ok(Running),
        (Running, StepEvent::Finish) => Ok(Completed),
        (Running, StepEvent::Fail) => Ok(Error),
        (Running, StepEvent::Cancel) => Ok(Cancelled),
        (Pending | Completed | Error | Cancelled, StepEvent::Reset) => Ok(Pending),
        _ => Err(invalid(EntityKind::Step, from, event)),
    }
}

pub fn workflow(from: WorkflowStatus, event: WorkflowEvent) -> Result<WorkflowStatus> {
    use WorkflowStatus::*;
    match (from, event) {
        (Draft, WorkflowEvent::Start) => Ok(Running),
        (Running, WorkflowEvent::Finish) => Ok(Completed),
        (Running, WorkflowEvent::Fail) => Ok(Failed),
        (Running, WorkflowEvent::Cancel) => Ok(Cancelled),
        (Completed | Failed | Cancelled, WorkflowEvent::Reset) => Ok(Draft),
        _ => Err(invalid(EntityKind::Workflow, from, event)),
    }
}

pub fn agent(from: AgentStatus, event: AgentEvent) -> Result<AgentStatus> {
    use AgentStatus::*;
    match (from, event) {
        (Idle | Completed | Error, AgentEvent::Assign) => Ok(Running),
        (Running, AgentEvent::Finish) => Ok(Completed),
        (Running, AgentEvent::Fail) => Ok(Error),
        (Running, AgentEvent::Release) => Ok(Idle),
        _ => Err(invalid(EntityKind::Agent, from, event)),
    }
}
