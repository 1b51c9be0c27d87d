use std::sync::Arc;
use std::time::Duration;

use herald::queue::JobQueue;
use herald::runner::{AgentConfig, AgentRunner, AgentState, AgentStatus, RunnerOptions};
use herald::skills::{DryRunSkill, SkillRegistry};
use herald::store::{AgentStore, Feedback, InMemoryStore, SqliteStore};
use herald::task::{TaskPriority, TaskSpec, TaskStatus, TaskType};
use tempfile::TempDir;

fn backends(dir: &TempDir) -> Vec<Arc<dyn AgentStore>> {
    let path = dir.path().join("herald.db");
    let memory: Arc<dyn AgentStore> = Arc::new(InMemoryStore::new());
    let sqlite: Arc<dyn AgentStore> = Arc::new(SqliteStore::open(path.to_str().unwrap()).unwrap());
    vec![memory, sqlite]
}

#[tokio::test]
async fn test_save_state_is_idempotent_on_every_backend() {
    let dir = TempDir::new().unwrap();
    for store in backends(&dir) {
        let state = AgentState::new("agent-idem");
        store.save_state(&state).await.unwrap();
        store.save_state(&state).await.unwrap();

        let loaded = store.load_state("agent-idem").await.unwrap().unwrap();
        assert_eq!(loaded, state, "backend {}", store.backend_name());
        assert!(store.delete_state("agent-idem").await.unwrap());
        assert!(!store.delete_state("agent-idem").await.unwrap());
    }
}

#[tokio::test]
async fn test_feedback_validation_on_every_backend() {
    let dir = TempDir::new().unwrap();
    for store in backends(&dir) {
        let good = Feedback::new("task-9", "agent-1").with_rating(3).approved(true);
        store.save_feedback(&good).await.unwrap();
        assert!(store.save_feedback(&Feedback::new("task-9", "agent-1").with_rating(0)).await.is_err());

        let loaded = store.load_feedback("task-9").await.unwrap();
        assert_eq!(loaded.len(), 1, "backend {}", store.backend_name());
        assert_eq!(loaded[0].rating, Some(3));
        assert!(loaded[0].approved);
    }
}

#[tokio::test]
async fn test_runner_results_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("agent.db");
    let path = path.to_str().unwrap();

    let mut config = AgentConfig::new("durable", "Durable Agent");
    config.retry_attempts = 0;
    let registry = SkillRegistry::new()
        .with_skill(Arc::new(DryRunSkill::new(TaskType::SocialPost, Duration::from_millis(1))));

    let runner = AgentRunner::new(
        config,
        registry,
        Arc::new(SqliteStore::open(path).unwrap()),
        Arc::new(JobQueue::new()),
        RunnerOptions { poll_interval: Duration::from_millis(5) },
    )
    .unwrap();

    runner.start().await.unwrap();
    let ok = runner.add_task(TaskSpec::new(TaskType::SocialPost).with_field("text", "hi")).await;
    let bad = runner
        .add_task(TaskSpec::new(TaskType::SocialPost).with_priority(TaskPriority::Low).with_field("fail", true))
        .await;
    tokio::time::timeout(Duration::from_secs(5), runner.wait_for_idle()).await.unwrap();
    runner.stop().await.unwrap();
    drop(runner);

    let reopened = SqliteStore::open(path).unwrap();
    let state = reopened.load_state("durable").await.unwrap().unwrap();
    assert_eq!(state.status, AgentStatus::Stopped);
    assert_eq!(state.completed_tasks.len(), 1);
    assert_eq!(state.failed_tasks.len(), 1);

    assert_eq!(reopened.load_task(&ok).await.unwrap().unwrap().status, TaskStatus::Completed);
    let failed = reopened.load_task(&bad).await.unwrap().unwrap();
    assert_eq!(failed.status, TaskStatus::Failed);
    assert!(failed.error.is_some());

    let history = reopened.get_task_history("durable", 10).await.unwrap();
    assert_eq!(history.len(), 2);
    let metrics = reopened.get_agent_metrics("durable").await.unwrap();
    assert_eq!(metrics.total_tasks, 2);
    assert!((metrics.success_rate - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_recovery_from_sqlite_after_crash() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("crash.db");
    let path = path.to_str().unwrap();

    // First process queues work but never starts.
    {
        let runner = AgentRunner::new(
            AgentConfig::new("crashy", "Crashy"),
            SkillRegistry::new(),
            Arc::new(SqliteStore::open(path).unwrap()),
            Arc::new(JobQueue::new()),
            RunnerOptions::default(),
        )
        .unwrap();
        runner.add_task(TaskSpec::new(TaskType::AnalyticsReport)).await;
        runner.add_task(TaskSpec::new(TaskType::AnalyticsReport).with_priority(TaskPriority::Urgent)).await;
    }

    let store = Arc::new(SqliteStore::open(path).unwrap());
    let runner = AgentRunner::new(
        AgentConfig::new("crashy", "Crashy"),
        SkillRegistry::new()
            .with_skill(Arc::new(DryRunSkill::new(TaskType::AnalyticsReport, Duration::from_millis(1)))),
        store.clone(),
        Arc::new(JobQueue::new()),
        RunnerOptions { poll_interval: Duration::from_millis(5) },
    )
    .unwrap();

    assert_eq!(runner.recover().await.unwrap(), 2);
    assert_eq!(runner.pending_tasks()[0].priority, TaskPriority::Urgent);

    runner.start().await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), runner.wait_for_idle()).await.unwrap();
    runner.stop().await.unwrap();

    let tasks = store.load_tasks_by_agent("crashy").await.unwrap();
    assert_eq!(tasks.len(), 2);
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Completed));
}
