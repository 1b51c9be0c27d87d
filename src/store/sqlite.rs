use async_trait::async_trait;

use crate::db::Database;
use crate::errors::HeraldError;
use crate::runner::metrics::AgentMetrics;
use crate::runner::state::AgentState;
use crate::task::{Task, TaskStatus};
use super::models::{metrics_from_tasks, Feedback};
use super::traits::AgentStore;

/// Durable store backed by a single SQLite file.
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, HeraldError> {
        Ok(Self { db: Database::new(path)? })
    }

    pub fn in_memory() -> Result<Self, HeraldError> {
        Ok(Self { db: Database::in_memory()? })
    }

    pub fn from_database(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl SqliteStore {
    /// Run a database call on the blocking pool so a slow disk never stalls
    /// the async workers driving the dispatch loop.
    async fn blocking<T, F>(&self, op: F) -> Result<T, HeraldError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, HeraldError> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(|e| HeraldError::Database(format!("Database task failed: {}", e)))?
    }
}

#[async_trait]
impl AgentStore for SqliteStore {
    async fn save_state(&self, state: &AgentState) -> Result<(), HeraldError> {
        let state = state.clone();
        self.blocking(move |db| db.upsert_state(&state)).await
    }

    async fn load_state(&self, agent_id: &str) -> Result<Option<AgentState>, HeraldError> {
        let agent_id = agent_id.to_string();
        self.blocking(move |db| db.get_state(&agent_id)).await
    }

    async fn delete_state(&self, agent_id: &str) -> Result<bool, HeraldError> {
        let agent_id = agent_id.to_string();
        self.blocking(move |db| db.delete_state(&agent_id)).await
    }

    async fn save_task(&self, task: &Task) -> Result<(), HeraldError> {
        let task = task.clone();
        self.blocking(move |db| db.upsert_task(&task)).await
    }

    async fn load_task(&self, task_id: &str) -> Result<Option<Task>, HeraldError> {
        let task_id = task_id.to_string();
        self.blocking(move |db| db.get_task(&task_id)).await
    }

    async fn load_tasks_by_agent(&self, agent_id: &str) -> Result<Vec<Task>, HeraldError> {
        let agent_id = agent_id.to_string();
        self.blocking(move |db| db.get_tasks_by_agent(&agent_id)).await
    }

    async fn update_task_status(&self, task_id: &str, status: TaskStatus) -> Result<bool, HeraldError> {
        let task_id = task_id.to_string();
        self.blocking(move |db| db.set_task_status(&task_id, status)).await
    }

    async fn save_feedback(&self, feedback: &Feedback) -> Result<(), HeraldError> {
        feedback.validate()?;
        let feedback = feedback.clone();
        self.blocking(move |db| db.upsert_feedback(&feedback)).await
    }

    async fn load_feedback(&self, task_id: &str) -> Result<Vec<Feedback>, HeraldError> {
        let task_id = task_id.to_string();
        self.blocking(move |db| db.get_feedback(&task_id)).await
    }

    async fn get_agent_metrics(&self, agent_id: &str) -> Result<AgentMetrics, HeraldError> {
        let agent_id = agent_id.to_string();
        self.blocking(move |db| {
            let tasks = db.get_tasks_by_agent(&agent_id)?;
            let created_at = db.get_state(&agent_id)?.map(|s| s.created_at);
            Ok(metrics_from_tasks(&tasks, created_at))
        })
        .await
    }

    async fn get_task_history(&self, agent_id: &str, limit: usize) -> Result<Vec<Task>, HeraldError> {
        let agent_id = agent_id.to_string();
        self.blocking(move |db| db.get_task_history(&agent_id, limit)).await
    }

    fn backend_name(&self) -> &str {
        "sqlite"
    }
}
