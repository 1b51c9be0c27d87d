use async_trait::async_trait;
use dashmap::DashMap;

use crate::errors::HeraldError;
use crate::runner::metrics::AgentMetrics;
use crate::runner::state::AgentState;
use crate::task::{Task, TaskStatus};
use super::models::{metrics_from_tasks, sort_history, Feedback};
use super::traits::AgentStore;

/// Process-local store. Everything is lost when the process exits.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    states: DashMap<String, AgentState>,
    tasks: DashMap<String, Task>,
    feedback: DashMap<String, Feedback>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

#[async_trait]
impl AgentStore for InMemoryStore {
    async fn save_state(&self, state: &AgentState) -> Result<(), HeraldError> {
        self.states.insert(state.id.clone(), state.clone());
        Ok(())
    }

    async fn load_state(&self, agent_id: &str) -> Result<Option<AgentState>, HeraldError> {
        Ok(self.states.get(agent_id).map(|s| s.value().clone()))
    }

    async fn delete_state(&self, agent_id: &str) -> Result<bool, HeraldError> {
        Ok(self.states.remove(agent_id).is_some())
    }

    async fn save_task(&self, task: &Task) -> Result<(), HeraldError> {
        self.tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn load_task(&self, task_id: &str) -> Result<Option<Task>, HeraldError> {
        Ok(self.tasks.get(task_id).map(|t| t.value().clone()))
    }

    async fn load_tasks_by_agent(&self, agent_id: &str) -> Result<Vec<Task>, HeraldError> {
        let mut tasks: Vec<Task> = self.tasks.iter()
            .filter(|entry| entry.agent_id == agent_id)
            .map(|entry| entry.value().clone())
            .collect();
        tasks.sort_by_key(|t| t.sequence);
        Ok(tasks)
    }

    async fn update_task_status(&self, task_id: &str, status: TaskStatus) -> Result<bool, HeraldError> {
        match self.tasks.get_mut(task_id) {
            Some(mut task) => {
                task.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn save_feedback(&self, feedback: &Feedback) -> Result<(), HeraldError> {
        feedback.validate()?;
        self.feedback.insert(feedback.id.clone(), feedback.clone());
        Ok(())
    }

    async fn load_feedback(&self, task_id: &str) -> Result<Vec<Feedback>, HeraldError> {
        let mut items: Vec<Feedback> = self.feedback.iter()
            .filter(|entry| entry.task_id == task_id)
            .map(|entry| entry.value().clone())
            .collect();
        items.sort_by_key(|f| f.created_at);
        Ok(items)
    }

    async fn get_agent_metrics(&self, agent_id: &str) -> Result<AgentMetrics, HeraldError> {
        let tasks = self.load_tasks_by_agent(agent_id).await?;
        let created_at = self.states.get(agent_id).map(|s| s.created_at);
        Ok(metrics_from_tasks(&tasks, created_at))
    }

    async fn get_task_history(&self, agent_id: &str, limit: usize) -> Result<Vec<Task>, HeraldError> {
        let mut tasks = self.load_tasks_by_agent(agent_id).await?;
        sort_history(&mut tasks);
        tasks.truncate(limit);
        Ok(tasks)
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{ExecutionMetrics, TaskResult, TaskSpec, TaskType};

    fn make_task(agent: &str, seq: u64) -> Task {
        Task::from_spec(TaskSpec::new(TaskType::SocialPost), agent, seq, 2)
    }

    #[tokio::test]
    async fn test_save_state_twice_is_idempotent() {
        let store = InMemoryStore::new();
        let state = AgentState::new("agent-1");

        store.save_state(&state).await.unwrap();
        store.save_state(&state).await.unwrap();

        assert_eq!(store.state_count(), 1);
        assert_eq!(store.load_state("agent-1").await.unwrap(), Some(state));
    }

    #[tokio::test]
    async fn test_delete_state() {
        let store = InMemoryStore::new();
        store.save_state(&AgentState::new("agent-1")).await.unwrap();

        assert!(store.delete_state("agent-1").await.unwrap());
        assert!(!store.delete_state("agent-1").await.unwrap());
        assert!(store.load_state("agent-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tasks_partitioned_by_agent() {
        let store = InMemoryStore::new();
        store.save_task(&make_task("a", 2)).await.unwrap();
        store.save_task(&make_task("a", 1)).await.unwrap();
        store.save_task(&make_task("b", 3)).await.unwrap();

        let tasks = store.load_tasks_by_agent("a").await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].sequence, 1);
        assert_eq!(store.load_tasks_by_agent("b").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_save_task_upserts() {
        let store = InMemoryStore::new();
        let mut task = make_task("a", 1);
        store.save_task(&task).await.unwrap();
        task.mark_running().unwrap();
        store.save_task(&task).await.unwrap();

        assert_eq!(store.task_count(), 1);
        let loaded = store.load_task(&task.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn test_update_task_status() {
        let store = InMemoryStore::new();
        let task = make_task("a", 1);
        store.save_task(&task).await.unwrap();

        assert!(store.update_task_status(&task.id, TaskStatus::Cancelled).await.unwrap());
        assert!(!store.update_task_status("missing", TaskStatus::Cancelled).await.unwrap());
        let loaded = store.load_task(&task.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_feedback_round_trip_and_validation() {
        let store = InMemoryStore::new();
        let fb = Feedback::new("task-1", "a").with_rating(4).with_comment("good tone");
        store.save_feedback(&fb).await.unwrap();
        store.save_feedback(&fb).await.unwrap();

        let loaded = store.load_feedback("task-1").await.unwrap();
        assert_eq!(loaded, vec![fb]);

        let bad = Feedback::new("task-1", "a").with_rating(9);
        assert!(store.save_feedback(&bad).await.is_err());
    }

    #[tokio::test]
    async fn test_metrics_and_history() {
        let store = InMemoryStore::new();
        store.save_state(&AgentState::new("a")).await.unwrap();

        let mut done = make_task("a", 1);
        done.mark_running().unwrap();
        done.mark_completed(TaskResult {
            success: true,
            data: None,
            metrics: ExecutionMetrics { execution_time_ms: 10, tokens_used: 42, api_calls: 2 },
            artifacts: None,
        }).unwrap();
        let mut failed = make_task("a", 2);
        failed.mark_running().unwrap();
        failed.mark_failed("boom".into()).unwrap();
        let pending = make_task("a", 3);

        for t in [&done, &failed, &pending] {
            store.save_task(t).await.unwrap();
        }

        let metrics = store.get_agent_metrics("a").await.unwrap();
        assert_eq!(metrics.total_tasks, 2);
        assert!((metrics.success_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(metrics.tokens_used, 42);

        let history = store.get_task_history("a", 2).await.unwrap();
        assert_eq!(history.len(), 2);
    }
}
