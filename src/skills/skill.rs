use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::errors::HeraldError;
use crate::task::{Payload, TaskType};

/// Usage reported by a skill alongside its result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillMetadata {
    pub tokens_used: Option<u64>,
    pub api_calls: Option<u64>,
    pub artifacts: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillResult {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub metadata: Option<SkillMetadata>,
}

impl SkillResult {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            metadata: None,
        }
    }

    pub fn with_usage(mut self, tokens_used: u64, api_calls: u64) -> Self {
        let metadata = self.metadata.get_or_insert_with(SkillMetadata::default);
        metadata.tokens_used = Some(tokens_used);
        metadata.api_calls = Some(api_calls);
        self
    }

    pub fn tokens_used(&self) -> u64 {
        self.metadata.as_ref().and_then(|m| m.tokens_used).unwrap_or(0)
    }

    pub fn api_calls(&self) -> u64 {
        self.metadata.as_ref().and_then(|m| m.api_calls).unwrap_or(0)
    }
}

#[async_trait]
pub trait Skill: Send + Sync {
    /// Skill name for logging
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// The task type this skill handles
    fn task_type(&self) -> TaskType;

    /// Run the capability against a task payload.
    ///
    /// `cancel` fires when the task times out or is cancelled; long-running
    /// work should select on it and return early. The runner also drops the
    /// returned future at that point.
    async fn execute(
        &self,
        payload: &Payload,
        cancel: CancellationToken,
    ) -> Result<SkillResult, HeraldError>;
}
