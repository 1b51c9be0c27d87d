use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::HeraldError;

/// Opaque key/value input handed to a skill.
pub type Payload = HashMap<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    ContentGeneration,
    SocialPost,
    MarketResearch,
    EmailCampaign,
    CommunityEngagement,
    AnalyticsReport,
}

impl TaskType {
    pub const ALL: [TaskType; 6] = [
        Self::ContentGeneration,
        Self::SocialPost,
        Self::MarketResearch,
        Self::EmailCampaign,
        Self::CommunityEngagement,
        Self::AnalyticsReport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContentGeneration => "content-generation",
            Self::SocialPost => "social-post",
            Self::MarketResearch => "market-research",
            Self::EmailCampaign => "email-campaign",
            Self::CommunityEngagement => "community-engagement",
            Self::AnalyticsReport => "analytics-report",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskType {
    type Err = HeraldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| HeraldError::Validation(format!("Unknown task type: {}", s)))
    }
}

/// Declaration order gives `Low < Medium < High < Urgent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Urgent => write!(f, "urgent"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = HeraldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(HeraldError::Validation(format!("Unknown task status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    pub execution_time_ms: u64,
    pub tokens_used: u64,
    pub api_calls: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub metrics: ExecutionMetrics,
    pub artifacts: Option<serde_json::Value>,
}

/// Caller-supplied description of work to submit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default)]
    pub priority: TaskPriority,
    pub max_retries: Option<u32>,
}

impl TaskSpec {
    pub fn new(task_type: TaskType) -> Self {
        Self {
            task_type,
            payload: Payload::new(),
            priority: TaskPriority::default(),
            max_retries: None,
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_field(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub agent_id: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub payload: Payload,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    /// Submission order; the queue uses it to keep retried tasks at their original rank.
    pub sequence: u64,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<TaskResult>,
    pub error: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl Task {
    pub fn from_spec(spec: TaskSpec, agent_id: &str, sequence: u64, default_retries: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            task_type: spec.task_type,
            payload: spec.payload,
            status: TaskStatus::Pending,
            priority: spec.priority,
            sequence,
            scheduled_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
            retry_count: 0,
            max_retries: spec.max_retries.unwrap_or(default_retries),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Wall time between start and completion, if both are recorded.
    pub fn execution_time_ms(&self) -> Option<u64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(
                end.signed_duration_since(start)
                    .num_milliseconds()
                    .max(0) as u64,
            ),
            _ => None,
        }
    }

    fn transition(&mut self, to: TaskStatus) -> Result<(), HeraldError> {
        let allowed = matches!(
            (self.status, to),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Pending, TaskStatus::Cancelled)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
                | (TaskStatus::Running, TaskStatus::Cancelled)
                | (TaskStatus::Running, TaskStatus::Pending)
        );
        if !allowed {
            return Err(HeraldError::InvalidTransition { from: self.status, to });
        }
        self.status = to;
        Ok(())
    }

    pub fn mark_running(&mut self) -> Result<(), HeraldError> {
        self.transition(TaskStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_completed(&mut self, result: TaskResult) -> Result<(), HeraldError> {
        self.transition(TaskStatus::Completed)?;
        self.completed_at = Some(Utc::now());
        self.result = Some(result);
        Ok(())
    }

    pub fn mark_failed(&mut self, error: String) -> Result<(), HeraldError> {
        self.transition(TaskStatus::Failed)?;
        self.completed_at = Some(Utc::now());
        self.error = Some(error);
        Ok(())
    }

    pub fn mark_cancelled(&mut self, reason: String) -> Result<(), HeraldError> {
        self.transition(TaskStatus::Cancelled)?;
        self.completed_at = Some(Utc::now());
        self.error = Some(reason);
        Ok(())
    }

    /// Send a failed running task back to the queue. Keeps the error for inspection.
    pub fn mark_retrying(&mut self, error: String) -> Result<(), HeraldError> {
        if !self.can_retry() {
            return Err(HeraldError::Validation(format!(
                "Task {} has exhausted its {} retries",
                self.id, self.max_retries
            )));
        }
        self.transition(TaskStatus::Pending)?;
        self.retry_count += 1;
        self.started_at = None;
        self.error = Some(error);
        Ok(())
    }

    /// Reset a task orphaned by a crashed process so it can be queued again.
    pub(crate) fn reset_for_recovery(&mut self) {
        if self.status == TaskStatus::Running {
            self.status = TaskStatus::Pending;
            self.started_at = None;
        }
    }
}
