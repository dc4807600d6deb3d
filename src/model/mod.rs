//! Entity records: agents, tasks, workflows and their steps.

pub mod agent;
pub mod task;
pub mod workflow;

pub use agent::{Agent, AgentStatus};
pub use task::{NewTask, Priority, Task, TaskStatus};
pub use workflow::{StepStatus, Workflow, WorkflowStatus, WorkflowStep};
