use std::fmt;

/// Kind of record an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Agent,
    Task,
    Workflow,
    Step,
    Document,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Agent => "agent",
            EntityKind::Task => "task",
            EntityKind::Workflow => "workflow",
            EntityKind::Step => "step",
            EntityKind::Document => "document",
        };
        f.write_str(name)
    }
}

/// Errors raised by the orchestration core.
///
/// Every variant is recoverable: callers report it and carry on, nothing in
/// the core terminates the process.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrchestrationError {
    #[error("invalid transition for {entity}: cannot apply '{event}' from '{from}'")]
    InvalidTransition {
        entity: EntityKind,
        from: String,
        event: String,
    },

    #[error("{entity} '{id}' is {status} and cannot be run")]
    InvalidState {
        entity: EntityKind,
        id: String,
        status: String,
    },

    #[error("workflow '{0}' is already running")]
    AlreadyRunning(String),

    #[error("agent '{0}' is busy with another step")]
    AgentBusy(String),

    #[error("step '{step_id}' of workflow '{workflow_id}' failed: {reason}")]
    StepFailed {
        workflow_id: String,
        step_id: String,
        reason: String,
    },

    #[error("task '{task_id}' failed: {reason}")]
    TaskFailed { task_id: String, reason: String },

    #[error("{entity} '{id}' was cancelled")]
    Cancelled { entity: EntityKind, id: String },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: EntityKind, id: String },

    #[error("validation failed: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_entity() {
        let err = OrchestrationError::NotFound {
            entity: EntityKind::Workflow,
            id: "market-research".to_string(),
        };
        assert_eq!(err.to_string(), "workflow 'market-research' not found");

        let err = OrchestrationError::InvalidTransition {
            entity: EntityKind::Task,
            from: "completed".to_string(),
            event: "start".to_string(),
        };
        assert!(err.to_string().contains("from 'completed'"));
    }
}
