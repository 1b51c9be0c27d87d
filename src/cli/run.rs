use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::commands::RunArgs;
use crate::config::{self, HeraldConfig, StoreBackend};
use crate::errors::HeraldError;
use crate::queue::JobQueue;
use crate::runner::{AgentRunner, RunnerEvent};
use crate::skills::{DryRunSkill, SkillRegistry};
use crate::store::{AgentStore, InMemoryStore, SqliteStore};
use crate::task::TaskType;

const DEFAULT_DRY_RUN_LATENCY_MS: u64 = 50;

pub async fn handle_run(args: RunArgs) -> Result<(), HeraldError> {
    let config = config::parse_config(&PathBuf::from(&args.config)).await?;
    info!(agent_id = %config.agent.id, config = %args.config, "Starting agent");

    let store = open_store(&config, args.db.as_deref())?;
    let registry = build_registry(&config);

    let mut runner = AgentRunner::new(
        config.agent.clone(),
        registry,
        store,
        Arc::new(JobQueue::new()),
        config.runner_options(),
    )?;

    let printer = if args.follow {
        let (tx, rx) = mpsc::unbounded_channel();
        runner = runner.with_event_channel(tx);
        Some(tokio::spawn(print_events(rx)))
    } else {
        None
    };

    if args.recover {
        let requeued = runner.recover().await?;
        info!(requeued, "Recovered unfinished tasks");
    }

    runner.start().await?;
    for spec in config.task_specs() {
        runner.add_task(spec.clone()).await;
    }
    info!(queued = runner.pending_tasks().len(), "Tasks submitted");

    tokio::select! {
        _ = runner.wait_for_idle() => {}
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, draining in-flight tasks");
        }
    }

    runner.stop().await?;
    let metrics = runner.get_metrics().await;
    drop(runner);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}

fn open_store(config: &HeraldConfig, db_override: Option<&str>) -> Result<Arc<dyn AgentStore>, HeraldError> {
    let store_config = config.store_config();
    match (store_config.backend, db_override) {
        (StoreBackend::Memory, None) => Ok(Arc::new(InMemoryStore::new())),
        (_, path) => {
            let path = path.unwrap_or_else(|| store_config.path_or_default());
            info!(path, "Opening SQLite store");
            Ok(Arc::new(SqliteStore::open(path)?))
        }
    }
}

/// One dry-run skill per configured task type, or for every type when none are listed.
fn build_registry(config: &HeraldConfig) -> SkillRegistry {
    let latency = Duration::from_millis(
        config.runner.as_ref()
            .and_then(|r| r.dry_run_latency_ms)
            .unwrap_or(DEFAULT_DRY_RUN_LATENCY_MS),
    );
    let types: Vec<TaskType> = if config.agent.skills.is_empty() {
        TaskType::ALL.to_vec()
    } else {
        config.agent.skills.clone()
    };

    let mut registry = SkillRegistry::new();
    for task_type in types {
        registry.register(Arc::new(DryRunSkill::new(task_type, latency)));
    }
    registry
}

async fn print_events(mut rx: mpsc::UnboundedReceiver<RunnerEvent>) {
    while let Some(event) = rx.recv().await {
        match event.task() {
            Some(task) => println!(
                "[{}] {} {} ({})",
                event.name(),
                task.id,
                task.task_type,
                task.priority
            ),
            None => println!("[{}]", event.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config_str;

    #[test]
    fn test_registry_covers_all_types_when_unlisted() {
        let config = parse_config_str("agent: {id: a, name: A}").unwrap();
        let registry = build_registry(&config);
        assert_eq!(registry.len(), TaskType::ALL.len());
    }

    #[test]
    fn test_registry_limited_to_listed_skills() {
        let config = parse_config_str("agent: {id: a, name: A, skills: [social-post]}").unwrap();
        let registry = build_registry(&config);
        assert_eq!(registry.get_skill_types(), vec![TaskType::SocialPost]);
    }

    #[test]
    fn test_open_memory_store() {
        let config = parse_config_str("agent: {id: a, name: A}\nstore: {backend: memory}").unwrap();
        let store = open_store(&config, None).unwrap();
        assert_eq!(store.backend_name(), "memory");
    }

    #[test]
    fn test_db_override_forces_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("herald.db");
        let config = parse_config_str("agent: {id: a, name: A}\nstore: {backend: memory}").unwrap();
        let store = open_store(&config, path.to_str()).unwrap();
        assert_eq!(store.backend_name(), "sqlite");
    }
}
