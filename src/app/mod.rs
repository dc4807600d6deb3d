use anyhow::Result;
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::agents::{Orchestrator, SimulatedWork, WorkUnit};
use crate::clock::{Clock, SystemClock};
use crate::config::AssistantConfig;
use crate::model::TaskStatus;
use crate::notifications::{FanoutSink, MemorySink, NotificationSink, TracingSink};
use crate::store::Stores;

/// Outcome counts of one application run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub tasks_completed: usize,
    pub tasks_failed: usize,
    pub workflows_completed: usize,
    pub workflows_failed: usize,
}

pub struct Application {
    config: AssistantConfig,
    orchestrator: Orchestrator,
    clock: Arc<dyn Clock>,
    notifications: MemorySink,
    shutdown: CancellationToken,
}

impl Application {
    pub fn new(config: AssistantConfig) -> Self {
        let work = Arc::new(SimulatedWork::from_config(&config.simulation));
        Self::with_work(config, work)
    }

    pub fn with_work(config: AssistantConfig, work: Arc<dyn WorkUnit>) -> Self {
        let notifications = MemorySink::new();
        let sink: Arc<dyn NotificationSink> = Arc::new(
            FanoutSink::new()
                .with(Arc::new(TracingSink))
                .with(Arc::new(notifications.clone())),
        );
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let orchestrator = Orchestrator::new(Stores::new(), work, sink).with_clock(clock.clone());

        Self {
            config,
            orchestrator,
            clock,
            notifications,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn notifications(&self) -> &MemorySink {
        &self.notifications
    }

    /// Token that stops in-flight executions at their next suspension point
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn run(&mut self) -> Result<RunSummary> {
        // Ctrl-C cancels whatever is running
        let shutdown = self.shutdown.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, cancelling running work");
                shutdown.cancel();
            }
        });

        let result = self.execute().await;
        watcher.abort();
        result
    }

    async fn execute(&self) -> Result<RunSummary> {
        let stores = self.orchestrator.stores().clone();
        self.config.seed(&stores, self.clock.as_ref()).await?;

        let task_ids: Vec<String> = stores
            .tasks
            .list()
            .await
            .into_iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .map(|t| t.id)
            .collect();
        let workflow_ids: Vec<String> = stores.workflows.list().await.into_iter().map(|w| w.id).collect();
        tracing::info!(
            tasks = task_ids.len(),
            workflows = workflow_ids.len(),
            pending = stores.tasks.pending_count().await,
            "Starting run"
        );

        let task_runs = join_all(
            task_ids
                .iter()
                .map(|id| self.orchestrator.run_task_until(id, &self.shutdown)),
        );
        let workflow_runs = join_all(
            workflow_ids
                .iter()
                .map(|id| self.orchestrator.run_workflow_until(id, &self.shutdown)),
        );
        let (task_results, workflow_results) = tokio::join!(task_runs, workflow_runs);

        let mut summary = RunSummary::default();
        for result in task_results {
            match result {
                Ok(_) => summary.tasks_completed += 1,
                Err(e) => {
                    tracing::warn!(error = %e, "Task did not complete");
                    summary.tasks_failed += 1;
                }
            }
        }
        for result in workflow_results {
            match result {
                Ok(_) => summary.workflows_completed += 1,
                Err(e) => {
                    tracing::warn!(error = %e, "Workflow did not complete");
                    summary.workflows_failed += 1;
                }
            }
        }

        if self.config.persist_snapshot {
            stores.save_snapshot(&AssistantConfig::snapshot_path()?).await?;
        }

        tracing::info!(?summary, "Run finished");
        Ok(summary)
    }
}
