use async_trait::async_trait;

use crate::errors::HeraldError;
use crate::runner::metrics::AgentMetrics;
use crate::runner::state::AgentState;
use crate::task::{Task, TaskStatus};
use super::models::Feedback;

/// Backend-agnostic persistence for runner state, tasks and review feedback.
///
/// Every write is an idempotent upsert keyed by id: saving the same record
/// twice leaves a single, equal record behind.
#[async_trait]
pub trait AgentStore: Send + Sync {
    async fn save_state(&self, state: &AgentState) -> Result<(), HeraldError>;

    async fn load_state(&self, agent_id: &str) -> Result<Option<AgentState>, HeraldError>;

    /// Returns whether a state existed.
    async fn delete_state(&self, agent_id: &str) -> Result<bool, HeraldError>;

    async fn save_task(&self, task: &Task) -> Result<(), HeraldError>;

    async fn load_task(&self, task_id: &str) -> Result<Option<Task>, HeraldError>;

    async fn load_tasks_by_agent(&self, agent_id: &str) -> Result<Vec<Task>, HeraldError>;

    /// Returns whether the task was found.
    async fn update_task_status(&self, task_id: &str, status: TaskStatus) -> Result<bool, HeraldError>;

    async fn save_feedback(&self, feedback: &Feedback) -> Result<(), HeraldError>;

    async fn load_feedback(&self, task_id: &str) -> Result<Vec<Feedback>, HeraldError>;

    /// Aggregate metrics over the agent's persisted tasks.
    async fn get_agent_metrics(&self, agent_id: &str) -> Result<AgentMetrics, HeraldError>;

    /// The agent's tasks, most recent activity first.
    async fn get_task_history(&self, agent_id: &str, limit: usize) -> Result<Vec<Task>, HeraldError>;

    /// Backend name for logging
    fn backend_name(&self) -> &str;
}
