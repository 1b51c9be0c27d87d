use tracing::info;

use crate::cli::commands::{HistoryArgs, MetricsArgs, StateArgs};
use crate::errors::HeraldError;
use crate::store::{AgentStore, SqliteStore};
use crate::task::Task;

pub async fn handle_state(args: StateArgs) -> Result<(), HeraldError> {
    let store = SqliteStore::open(&args.db)?;

    if args.delete {
        if store.delete_state(&args.agent_id).await? {
            info!(agent_id = %args.agent_id, "Deleted agent state");
            println!("Deleted state for {}", args.agent_id);
        } else {
            println!("No state stored for {}", args.agent_id);
        }
        return Ok(());
    }

    match store.load_state(&args.agent_id).await? {
        Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
        None => {
            return Err(HeraldError::Validation(format!("No state stored for agent {}", args.agent_id)));
        }
    }
    Ok(())
}

pub async fn handle_history(args: HistoryArgs) -> Result<(), HeraldError> {
    let store = SqliteStore::open(&args.db)?;
    let tasks = store.get_task_history(&args.agent_id, args.limit).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }

    if tasks.is_empty() {
        println!("No tasks recorded for {}", args.agent_id);
        return Ok(());
    }
    for task in &tasks {
        println!("{}", format_history_line(task));
    }
    Ok(())
}

pub async fn handle_metrics(args: MetricsArgs) -> Result<(), HeraldError> {
    let store = SqliteStore::open(&args.db)?;
    let metrics = store.get_agent_metrics(&args.agent_id).await?;
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}

fn format_history_line(task: &Task) -> String {
    let when = task.completed_at.unwrap_or(task.scheduled_at);
    let mut line = format!(
        "{}  {:<9}  {:<7}  {:<20}  {}",
        when.format("%Y-%m-%d %H:%M:%S"),
        task.status.as_str(),
        task.priority.to_string(),
        task.task_type.as_str(),
        task.id
    );
    if task.retry_count > 0 {
        line.push_str(&format!("  retries={}", task.retry_count));
    }
    if let Some(err) = &task.error {
        line.push_str(&format!("  error={}", err));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TaskSpec, TaskType};

    #[test]
    fn test_history_line_includes_retries_and_error() {
        let mut task = Task::from_spec(TaskSpec::new(TaskType::SocialPost), "a", 1, 3);
        task.mark_running().unwrap();
        task.mark_retrying("rate limited".into()).unwrap();

        let line = format_history_line(&task);
        assert!(line.contains("pending"));
        assert!(line.contains("social-post"));
        assert!(line.contains("retries=1"));
        assert!(line.contains("error=rate limited"));
    }
}
