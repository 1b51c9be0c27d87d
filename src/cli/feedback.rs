use tracing::info;

use crate::cli::commands::FeedbackArgs;
use crate::errors::HeraldError;
use crate::store::{AgentStore, Feedback, SqliteStore};

pub async fn handle_feedback(args: FeedbackArgs) -> Result<(), HeraldError> {
    let store = SqliteStore::open(&args.db)?;

    if !args.is_write() {
        let items = store.load_feedback(&args.task_id).await?;
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    let task = store.load_task(&args.task_id).await?
        .ok_or_else(|| HeraldError::Validation(format!("Unknown task: {}", args.task_id)))?;

    let mut feedback = Feedback::new(&task.id, &task.agent_id).approved(args.approve);
    if let Some(rating) = args.rating {
        feedback = feedback.with_rating(rating);
    }
    if let Some(comment) = &args.comment {
        feedback = feedback.with_comment(comment);
    }

    store.save_feedback(&feedback).await?;
    info!(task_id = %task.id, feedback_id = %feedback.id, "Feedback recorded");
    println!("Recorded feedback {} for task {}", feedback.id, task.id);
    Ok(())
}
