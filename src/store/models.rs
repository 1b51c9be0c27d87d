use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::HeraldError;
use crate::runner::metrics::{compute_metrics, AgentMetrics};
use crate::task::{Task, TaskStatus};

/// Human review annotation attached to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: String,
    pub task_id: String,
    pub agent_id: String,
    pub rating: Option<u8>,
    pub comment: Option<String>,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

impl Feedback {
    pub fn new(task_id: &str, agent_id: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: task_id.to_string(),
            agent_id: agent_id.to_string(),
            rating: None,
            comment: None,
            approved: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_rating(mut self, rating: u8) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    pub fn approved(mut self, approved: bool) -> Self {
        self.approved = approved;
        self
    }

    pub fn validate(&self) -> Result<(), HeraldError> {
        if let Some(rating) = self.rating {
            if !(1..=5).contains(&rating) {
                return Err(HeraldError::Validation(format!(
                    "Feedback rating must be between 1 and 5, got {}",
                    rating
                )));
            }
        }
        Ok(())
    }
}

/// Metrics over persisted tasks. Uptime is measured from the stored state's
/// creation time and is zero when no state has been saved.
pub(crate) fn metrics_from_tasks(tasks: &[Task], created_at: Option<DateTime<Utc>>) -> AgentMetrics {
    let (completed, failed): (Vec<Task>, Vec<Task>) = tasks.iter()
        .filter(|t| matches!(t.status, TaskStatus::Completed | TaskStatus::Failed))
        .cloned()
        .partition(|t| t.status == TaskStatus::Completed);
    let now = Utc::now();
    compute_metrics(&completed, &failed, created_at.unwrap_or(now), now)
}

/// Most recent activity first: completion time, falling back to scheduling time.
pub(crate) fn sort_history(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        let a_key = a.completed_at.unwrap_or(a.scheduled_at);
        let b_key = b.completed_at.unwrap_or(b.scheduled_at);
        b_key.cmp(&a_key)
    });
}
