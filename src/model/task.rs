use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::transitions::{self, TaskEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// A single unit of user-requested work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: TaskStatus,
    /// Weak reference to an agent id, lookup only
    pub assigned_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        priority: Priority,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            priority,
            status: TaskStatus::Pending,
            assigned_agent: None,
            created_at,
            completed_at: None,
        }
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.assigned_agent = Some(agent_id.into());
        self
    }

    /// Applies `event` and stamps `completed_at` in the same step, so the
    /// timestamp is present exactly when the task is completed.
    pub fn apply(&mut self, event: TaskEvent, at: DateTime<Utc>) -> Result<TaskStatus> {
        let next = transitions::task(self.status, event)?;
        self.status = next;
        self.completed_at = (next == TaskStatus::Completed).then_some(at);
        Ok(next)
    }
}

/// Input for creating a task
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub assigned_agent: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Task {
        Task::new("task1", "Review contracts", "", Priority::High, Utc::now())
    }

    #[test]
    fn test_completed_at_tracks_completed_status() {
        let mut task = sample();
        assert!(task.completed_at.is_none());

        task.apply(TaskEvent::Start, Utc::now()).unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(task.completed_at.is_none());

        let done = Utc::now();
        task.apply(TaskEvent::Finish, done).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.completed_at, Some(done));
    }

    #[test]
    fn test_rejected_event_leaves_task_untouched() {
        let mut task = sample();
        let before = task.clone();
        assert!(task.apply(TaskEvent::Finish, Utc::now()).is_err());
        assert_eq!(task, before);
    }

    #[test]
    fn test_failed_task_has_no_completion_time() {
        let mut task = sample();
        task.apply(TaskEvent::Start, Utc::now()).unwrap();
        task.apply(TaskEvent::Fail, Utc::now()).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let priority: Priority = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(priority, Priority::High);
    }
}
