use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::runner::state::{AgentConfig, RunnerOptions};
use crate::task::TaskSpec;

/// Top-level shape of a herald YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeraldConfig {
    pub agent: AgentConfig,
    pub runner: Option<RunnerSection>,
    pub store: Option<StoreConfig>,
    /// Tasks submitted on `herald run`.
    pub tasks: Option<Vec<TaskSpec>>,
}

impl HeraldConfig {
    pub fn runner_options(&self) -> RunnerOptions {
        let mut options = RunnerOptions::default();
        if let Some(ms) = self.runner.as_ref().and_then(|r| r.poll_interval_ms) {
            options.poll_interval = Duration::from_millis(ms);
        }
        options
    }

    pub fn store_config(&self) -> StoreConfig {
        self.store.clone().unwrap_or_default()
    }

    pub fn task_specs(&self) -> &[TaskSpec] {
        self.tasks.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerSection {
    pub poll_interval_ms: Option<u64>,
    /// Simulated latency for dry-run skills.
    pub dry_run_latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    Sqlite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// SQLite file; defaults to `herald.db` in the working directory.
    pub path: Option<String>,
}

impl StoreConfig {
    pub fn path_or_default(&self) -> &str {
        self.path.as_deref().unwrap_or("herald.db")
    }
}
