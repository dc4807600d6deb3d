//! Process-wide repositories for agents, tasks and workflows.
//!
//! Each repository is a cloneable handle over shared state. `update` applies a
//! closure under the write lock, which serializes every mutation of a record.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{EntityKind, OrchestrationError, Result};
use crate::model::{Agent, Task, TaskStatus, Workflow};
use crate::transitions::AgentEvent;

/// A record addressable by a unique id
pub trait Record: Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> &str;
}

impl Record for Agent {
    const KIND: EntityKind = EntityKind::Agent;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Task {
    const KIND: EntityKind = EntityKind::Task;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Workflow {
    const KIND: EntityKind = EntityKind::Workflow;

    fn id(&self) -> &str {
        &self.id
    }
}

struct Inner<T> {
    order: Vec<String>,
    items: HashMap<String, T>,
}

pub struct Repository<T: Record> {
    inner: Arc<RwLock<Inner<T>>>,
}

pub type AgentStore = Repository<Agent>;
pub type TaskStore = Repository<Task>;
pub type WorkflowStore = Repository<Workflow>;

impl<T: Record> Repository<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                order: Vec::new(),
                items: HashMap::new(),
            })),
        }
    }

    fn not_found(id: &str) -> OrchestrationError {
        OrchestrationError::NotFound {
            entity: T::KIND,
            id: id.to_string(),
        }
    }

    /// Appends a record. Ids are unique.
    pub async fn insert(&self, record: T) -> Result<()> {
        self.insert_at(record, false).await
    }

    /// Inserts a record ahead of all others (newest first listings)
    pub async fn insert_front(&self, record: T) -> Result<()> {
        self.insert_at(record, true).await
    }

    async fn insert_at(&self, record: T, front: bool) -> Result<()> {
        let mut inner = self.inner.write().await;
        let id = record.id().to_string();
        if inner.items.contains_key(&id) {
            return Err(OrchestrationError::Validation(format!(
                "{} '{}' already exists",
                T::KIND,
                id
            )));
        }
        if front {
            inner.order.insert(0, id.clone());
        } else {
            inner.order.push(id.clone());
        }
        inner.items.insert(id, record);
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<T> {
        let inner = self.inner.read().await;
        inner.items.get(id).cloned().ok_or_else(|| Self::not_found(id))
    }

    pub async fn list(&self) -> Vec<T> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.items.get(id).cloned())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Applies `f` to the record under the write lock.
    ///
    /// The closure sees the current state and decides atomically; if it
    /// returns an error the record must be left as it was.
    pub async fn update<R, F>(&self, id: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut T) -> Result<R>,
    {
        let mut inner = self.inner.write().await;
        let record = inner.items.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        let mut draft = record.clone();
        let result = f(&mut draft)?;
        *record = draft;
        Ok(result)
    }

    pub async fn remove(&self, id: &str) -> Result<T> {
        let mut inner = self.inner.write().await;
        let record = inner.items.remove(id).ok_or_else(|| Self::not_found(id))?;
        inner.order.retain(|existing| existing != id);
        Ok(record)
    }

    async fn replace_all(&self, records: Vec<T>) {
        let mut inner = self.inner.write().await;
        inner.order = records.iter().map(|r| r.id().to_string()).collect();
        inner.items = records.into_iter().map(|r| (r.id().to_string(), r)).collect();
    }
}

impl<T: Record> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Record> Default for Repository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository<Task> {
    pub async fn pending_count(&self) -> usize {
        let inner = self.inner.read().await;
        inner
            .items
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .count()
    }
}

impl Repository<Agent> {
    /// Marks an agent as running for the caller.
    ///
    /// Returns `Ok(false)` when no such agent is registered (agent references
    /// are weak) and `AgentBusy` when another execution already holds it.
    pub async fn claim(&self, agent_id: &str, at: chrono::DateTime<chrono::Utc>) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let Some(agent) = inner.items.get_mut(agent_id) else {
            return Ok(false);
        };
        if agent.is_busy() {
            return Err(OrchestrationError::AgentBusy(agent_id.to_string()));
        }
        agent.apply(AgentEvent::Assign, at)?;
        Ok(true)
    }

    /// Hands the agent back after its step reached `event`'s outcome
    pub async fn release(
        &self,
        agent_id: &str,
        event: AgentEvent,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        self.update(agent_id, |agent| agent.apply(event, at).map(|_| ())).await
    }
}

/// Serializable copy of every repository
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub agents: Vec<Agent>,
    pub tasks: Vec<Task>,
    pub workflows: Vec<Workflow>,
}

impl StoreSnapshot {
    /// Nothing owns an execution that was in flight when the snapshot was
    /// taken, so those records are restored as failed.
    fn settle_interrupted(&mut self) {
        for agent in &mut self.agents {
            if agent.is_busy() {
                agent.status = crate::model::AgentStatus::Error;
            }
        }
        for task in &mut self.tasks {
            if task.status == TaskStatus::InProgress {
                task.status = TaskStatus::Failed;
                task.completed_at = None;
            }
        }
        for workflow in &mut self.workflows {
            if let Err(e) = workflow.interrupt() {
                tracing::warn!(workflow_id = %workflow.id, error = %e, "Could not settle interrupted workflow");
            }
        }
    }
}

/// The three repositories the orchestrator works against
#[derive(Clone, Default)]
pub struct Stores {
    pub agents: AgentStore,
    pub tasks: TaskStore,
    pub workflows: WorkflowStore,
}

impl Stores {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            agents: self.agents.list().await,
            tasks: self.tasks.list().await,
            workflows: self.workflows.list().await,
        }
    }

    pub async fn restore(&self, mut snapshot: StoreSnapshot) {
        snapshot.settle_interrupted();
        self.agents.replace_all(snapshot.agents).await;
        self.tasks.replace_all(snapshot.tasks).await;
        self.workflows.replace_all(snapshot.workflows).await;
    }

    pub async fn save_snapshot(&self, path: &Path) -> anyhow::Result<()> {
        let snapshot = self.snapshot().await;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(&snapshot)?;
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("writing snapshot to {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Saved store snapshot");
        Ok(())
    }

    pub async fn load_snapshot(&self, path: &Path) -> anyhow::Result<()> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading snapshot from {}", path.display()))?;
        let snapshot: StoreSnapshot = serde_json::from_str(&content)?;
        self.restore(snapshot).await;
        tracing::debug!(path = %path.display(), "Restored store snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Priority, StepStatus, WorkflowStatus, WorkflowStep};
    use crate::transitions::WorkflowEvent;
    use chrono::Utc;

    fn task(id: &str) -> Task {
        Task::new(id, format!("Task {}", id), "", Priority::Medium, Utc::now())
    }

    #[tokio::test]
    async fn test_insert_front_lists_newest_first() {
        let store = TaskStore::new();
        store.insert(task("a")).await.unwrap();
        store.insert_front(task("b")).await.unwrap();

        let ids: Vec<String> = store.list().await.into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(store.pending_count().await, 2);
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let store = TaskStore::new();
        store.insert(task("a")).await.unwrap();
        assert!(matches!(
            store.insert(task("a")).await,
            Err(OrchestrationError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_update_leaves_record_unchanged() {
        let store = TaskStore::new();
        store.insert(task("a")).await.unwrap();

        let result = store
            .update("a", |t| {
                t.title = "changed".to_string();
                Err::<(), _>(OrchestrationError::Validation("nope".to_string()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(store.get("a").await.unwrap().title, "Task a");
    }

    #[tokio::test]
    async fn test_missing_record_is_not_found() {
        let store = WorkflowStore::new();
        let err = store.get("ghost").await.unwrap_err();
        assert_eq!(
            err,
            OrchestrationError::NotFound {
                entity: EntityKind::Workflow,
                id: "ghost".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_claim_busy_agent_fails() {
        let agents = AgentStore::new();
        agents.insert(Agent::new("research", "Research", vec![])).await.unwrap();

        assert!(agents.claim("research", Utc::now()).await.unwrap());
        assert_eq!(
            agents.claim("research", Utc::now()).await,
            Err(OrchestrationError::AgentBusy("research".to_string()))
        );
        assert!(!agents.claim("unknown", Utc::now()).await.unwrap());

        agents.release("research", AgentEvent::Finish, Utc::now()).await.unwrap();
        assert!(agents.claim("research", Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_snapshot_restores_interrupted_work_as_failed() {
        let stores = Stores::new();
        let mut running = task("t1");
        running.apply(crate::transitions::TaskEvent::Start, Utc::now()).unwrap();
        stores.tasks.insert(running).await.unwrap();

        let mut wf = Workflow::new(
            "wf",
            "Pipeline",
            "",
            vec![],
            vec![WorkflowStep::new("s1", "Collect", ""), WorkflowStep::new("s2", "Analyze", "")],
        )
        .unwrap();
        wf.apply(WorkflowEvent::Start).unwrap();
        wf.start_step(0).unwrap();
        stores.workflows.insert(wf).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("snapshot.json");
        stores.save_snapshot(&path).await.unwrap();

        let restored = Stores::new();
        restored.load_snapshot(&path).await.unwrap();

        let t1 = restored.tasks.get("t1").await.unwrap();
        assert_eq!(t1.status, TaskStatus::Failed);

        let wf = restored.workflows.get("wf").await.unwrap();
        assert_eq!(wf.status, WorkflowStatus::Failed);
        assert_eq!(wf.steps()[0].status, StepStatus::Error);
        assert_eq!(wf.steps()[1].status, StepStatus::Pending);
    }
}
