use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::clock::Clock;
use crate::model::{Agent, Priority, Task, Workflow, WorkflowStep};
use crate::store::Stores;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default)]
    pub persist_snapshot: bool,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub agents: Vec<AgentSeed>,
    #[serde(default)]
    pub workflows: Vec<WorkflowSeed>,
    #[serde(default)]
    pub tasks: Vec<TaskSeed>,
}

/// Durations of the simulated units of work, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub task_duration_ms: u64,
    pub step_duration_ms: u64,
    pub document_indexing_ms: u64,
    pub search_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            task_duration_ms: 3000,
            step_duration_ms: 2000,
            document_indexing_ms: 1000,
            search_ms: 1500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-1.5-pro".to_string(),
            embedding_model: "embedding-001".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl GenerationConfig {
    pub const API_KEY_ENV: &'static str = "GEMINI_API_KEY";

    /// Configured key, falling back to the environment
    pub fn resolved_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    /// Blank values count as absent at both levels
    pub fn resolve_api_key_with<F>(&self, lookup: F) -> Option<String>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| lookup(Self::API_KEY_ENV))
            .filter(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSeed {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSeed {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSeed {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub agents: Vec<String>,
    pub steps: Vec<StepSeed>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSeed {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    pub assigned_agent: Option<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        let agents = vec![
            AgentSeed {
                id: "research".to_string(),
                name: "Research Agent".to_string(),
                description: "Finds and analyzes information on the web and in documents".to_string(),
                capabilities: strings(&["Web Search", "Document Analysis", "Data Extraction"]),
            },
            AgentSeed {
                id: "planning".to_string(),
                name: "Planning Agent".to_string(),
                description: "Builds detailed plans and organizes complex tasks".to_string(),
                capabilities: strings(&["Task Planning", "Project Management", "Resource Allocation"]),
            },
            AgentSeed {
                id: "execution".to_string(),
                name: "Execution Agent".to_string(),
                description: "Runs automated tasks and system integrations".to_string(),
                capabilities: strings(&["API Integration", "Automation", "Data Processing"]),
            },
        ];

        let workflows = vec![WorkflowSeed {
            id: "market-research".to_string(),
            name: "Complete Market Research".to_string(),
            description: "Comprehensive market analysis with a final report".to_string(),
            agents: strings(&["research", "planning"]),
            steps: vec![
                StepSeed {
                    id: "step1".to_string(),
                    name: "Data Collection".to_string(),
                    description: "Gather relevant information about the market".to_string(),
                    agent: Some("research".to_string()),
                },
                StepSeed {
                    id: "step2".to_string(),
                    name: "Data Analysis".to_string(),
                    description: "Process and analyze the collected information".to_string(),
                    agent: Some("planning".to_string()),
                },
                StepSeed {
                    id: "step3".to_string(),
                    name: "Report Generation".to_string(),
                    description: "Write the final report with insights and recommendations".to_string(),
                    agent: Some("execution".to_string()),
                },
            ],
        }];

        let tasks = vec![
            TaskSeed {
                id: "task1".to_string(),
                title: "Analyze supplier documents".to_string(),
                description: "Review supplier contracts and extract their key terms".to_string(),
                priority: Priority::High,
                assigned_agent: Some("research".to_string()),
            },
            TaskSeed {
                id: "task2".to_string(),
                title: "Create project schedule".to_string(),
                description: "Develop a detailed timeline for the new project".to_string(),
                priority: Priority::Medium,
                assigned_agent: Some("planning".to_string()),
            },
        ];

        Self {
            persist_snapshot: false,
            simulation: SimulationConfig::default(),
            generation: GenerationConfig::default(),
            agents,
            workflows,
            tasks,
        }
    }
}

impl AssistantConfig {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config file
            let default_config = Self::default();
            default_config.save_to(&config_path)?;
            Ok(default_config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
        Ok(home.join(".config").join("agentflow"))
    }

    fn config_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn snapshot_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("state.json"))
    }

    /// Fills the stores with the configured agents, workflows and tasks
    pub async fn seed(&self, stores: &Stores, clock: &dyn Clock) -> Result<()> {
        for seed in &self.agents {
            let mut agent = Agent::new(&seed.id, &seed.name, seed.capabilities.clone());
            agent.description = seed.description.clone();
            stores.agents.insert(agent).await?;
        }

        for seed in &self.workflows {
            let steps = seed
                .steps
                .iter()
                .map(|s| {
                    let step = WorkflowStep::new(&s.id, &s.name, &s.description);
                    match &s.agent {
                        Some(agent) => step.with_agent(agent),
                        None => step,
                    }
                })
                .collect();
            let workflow = Workflow::new(&seed.id, &seed.name, &seed.description, seed.agents.clone(), steps)?;
            stores.workflows.insert(workflow).await?;
        }

        let now = clock.now();
        for seed in &self.tasks {
            let mut task = Task::new(&seed.id, &seed.title, &seed.description, seed.priority, now);
            task.assigned_agent = seed.assigned_agent.clone();
            stores.tasks.insert(task).await?;
        }

        tracing::info!(
            agents = self.agents.len(),
            workflows = self.workflows.len(),
            tasks = self.tasks.len(),
            "Seeded stores"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    #[test]
    fn test_config_round_trips_through_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AssistantConfig::default();
        config.simulation.step_duration_ms = 5;
        config.save_to(&path).unwrap();

        let loaded = AssistantConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_sections_fall_back_to_defaults() {
        let config: AssistantConfig = toml::from_str("persist_snapshot = true").unwrap();
        assert!(config.persist_snapshot);
        assert_eq!(config.simulation.task_duration_ms, 3000);
        assert_eq!(config.generation.model, "gemini-1.5-pro");
        assert!(config.agents.is_empty());
    }

    #[tokio::test]
    async fn test_default_seed_matches_reference_catalogue() {
        let stores = Stores::new();
        AssistantConfig::default()
            .seed(&stores, &SystemClock::new())
            .await
            .unwrap();

        assert_eq!(stores.agents.len().await, 3);
        assert_eq!(stores.tasks.pending_count().await, 2);

        let wf = stores.workflows.get("market-research").await.unwrap();
        let agents: Vec<Option<&str>> = wf.steps().iter().map(|s| s.agent.as_deref()).collect();
        assert_eq!(agents, vec![Some("research"), Some("planning"), Some("execution")]);
    }

    #[test]
    fn test_blank_api_key_is_ignored() {
        let blank = GenerationConfig {
            api_key: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(blank.resolve_api_key_with(|_| None), None);
        assert_eq!(blank.resolve_api_key_with(|_| Some(" ".to_string())), None);
        assert_eq!(
            blank.resolve_api_key_with(|name| (name == "GEMINI_API_KEY").then(|| "env-key".to_string())),
            Some("env-key".to_string())
        );

        let configured = GenerationConfig {
            api_key: Some("key-123".to_string()),
            ..Default::default()
        };
        assert_eq!(
            configured.resolve_api_key_with(|_| Some("env-key".to_string())).as_deref(),
            Some("key-123")
        );
    }
}
