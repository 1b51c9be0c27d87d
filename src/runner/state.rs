use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::HeraldError;
use crate::task::{Task, TaskType};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Running,
    Paused,
    Stopped,
    Error,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Stopped => write!(f, "stopped"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub id: String,
    pub status: AgentStatus,
    pub current_task: Option<Task>,
    pub completed_tasks: Vec<Task>,
    pub failed_tasks: Vec<Task>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl AgentState {
    pub fn new(id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            status: AgentStatus::Idle,
            current_task: None,
            completed_tasks: Vec::new(),
            failed_tasks: Vec::new(),
            created_at: now,
            updated_at: now,
            metadata: HashMap::new(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn default_max_concurrent_tasks() -> usize {
    3
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_timeout_ms() -> u64 {
    300_000
}

/// Construction-time configuration for a runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub skills: Vec<TaskType>,
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl AgentConfig {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            skills: Vec::new(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
            retry_attempts: default_retry_attempts(),
            timeout_ms: default_timeout_ms(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), HeraldError> {
        if self.id.trim().is_empty() {
            return Err(HeraldError::Config("agent id must not be empty".into()));
        }
        if self.max_concurrent_tasks == 0 {
            return Err(HeraldError::Config("max_concurrent_tasks must be at least 1".into()));
        }
        if self.timeout_ms == 0 {
            return Err(HeraldError::Config("timeout_ms must be at least 1".into()));
        }
        Ok(())
    }
}

/// Tuning knobs for the dispatch loop that are not part of the agent's identity.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Backoff used when the queue is empty, the runner is paused, or concurrency is saturated.
    pub poll_interval: Duration,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
        }
    }
}
