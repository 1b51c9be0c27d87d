use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::errors::HeraldError;
use crate::task::{Payload, TaskType};
use super::skill::{Skill, SkillResult};

/// Stand-in skill for dry runs: waits a fixed latency and echoes the payload.
///
/// A payload key `"fail": true` makes the skill report failure, which is
/// handy for exercising retry policy from a task file.
pub struct DryRunSkill {
    task_type: TaskType,
    name: String,
    latency: Duration,
}

impl DryRunSkill {
    pub fn new(task_type: TaskType, latency: Duration) -> Self {
        Self {
            task_type,
            name: format!("dry-run-{}", task_type.as_str()),
            latency,
        }
    }
}

#[async_trait]
impl Skill for DryRunSkill {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Simulated skill that echoes its payload without calling external services"
    }

    fn task_type(&self) -> TaskType {
        self.task_type
    }

    async fn execute(&self, payload: &Payload, cancel: CancellationToken) -> Result<SkillResult, HeraldError> {
        tokio::select! {
            _ = tokio::time::sleep(self.latency) => {}
            _ = cancel.cancelled() => {
                return Err(HeraldError::Cancelled(format!("{} interrupted", self.name)));
            }
        }

        if payload.get("fail").and_then(|v| v.as_bool()).unwrap_or(false) {
            return Ok(SkillResult::failed("Simulated failure requested by payload"));
        }

        Ok(SkillResult::ok(json!({
            "skill": self.name,
            "echo": payload,
        }))
        .with_usage(0, 0))
    }
}
