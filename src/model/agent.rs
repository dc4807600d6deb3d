use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::transitions::{self, AgentEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Running,
    Completed,
    Error,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Running => "running",
            AgentStatus::Completed => "completed",
            AgentStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// A named capability record. Agents are shared reference data; only the
/// execution currently holding an agent writes its status and progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: AgentStatus,
    pub progress: u8,
    pub capabilities: Vec<String>,
    pub last_execution: Option<DateTime<Utc>>,
}

impl Agent {
    pub fn new(id: impl Into<String>, name: impl Into<String>, capabilities: Vec<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            status: AgentStatus::Idle,
            progress: 0,
            capabilities,
            last_execution: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.status == AgentStatus::Running
    }

    pub fn apply(&mut self, event: AgentEvent, at: DateTime<Utc>) -> Result<AgentStatus> {
        let next = transitions::agent(self.status, event)?;
        self.status = next;
        match event {
            AgentEvent::Assign => self.progress = 0,
            AgentEvent::Finish => {
                self.progress = 100;
                self.last_execution = Some(at);
            }
            AgentEvent::Fail => self.last_execution = Some(at),
            AgentEvent::Release => self.progress = 0,
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finished_agent_records_last_execution() {
        let mut agent = Agent::new("research", "Research Agent", vec!["Web Search".to_string()]);
        agent.apply(AgentEvent::Assign, Utc::now()).unwrap();
        assert!(agent.is_busy());

        let at = Utc::now();
        agent.apply(AgentEvent::Finish, at).unwrap();
        assert_eq!(agent.status, AgentStatus::Completed);
        assert_eq!(agent.progress, 100);
        assert_eq!(agent.last_execution, Some(at));
    }

    #[test]
    fn test_running_agent_cannot_be_assigned_twice() {
        let mut agent = Agent::new("planning", "Planning Agent", vec![]);
        agent.apply(AgentEvent::Assign, Utc::now()).unwrap();
        assert!(agent.apply(AgentEvent::Assign, Utc::now()).is_err());
    }
}
