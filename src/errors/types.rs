use thiserror::Error;

use crate::task::{TaskStatus, TaskType};

#[derive(Debug, Error)]
pub enum HeraldError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No skill found for task type: {0}")]
    NoSkill(TaskType),

    #[error("Skill error: {0}")]
    Skill(String),

    #[error("Skill reported failure: {0}")]
    SkillRejected(String),

    #[error("Timeout: task exceeded {0}ms")]
    Timeout(u64),

    #[error("Task cancelled: {0}")]
    Cancelled(String),

    #[error("Agent is already running")]
    AlreadyRunning,

    #[error("Agent is not running")]
    NotRunning,

    #[error("Agent is not paused")]
    NotPaused,

    #[error("Invalid task transition: {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Panicked: {0}")]
    Panicked(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T, E = HeraldError> = std::result::Result<T, E>;
