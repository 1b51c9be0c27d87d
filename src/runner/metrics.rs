use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::Task;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub success_rate: f64,
    pub average_execution_time_ms: f64,
    pub tokens_used: u64,
    pub api_calls: u64,
    pub uptime_ms: u64,
}

pub fn compute_metrics(
    completed: &[Task],
    failed: &[Task],
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> AgentMetrics {
    let total_tasks = completed.len() + failed.len();
    let success_rate = if total_tasks == 0 {
        0.0
    } else {
        completed.len() as f64 / total_tasks as f64
    };

    let durations: Vec<u64> = completed.iter()
        .filter_map(|t| t.execution_time_ms())
        .collect();
    let average_execution_time_ms = if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<u64>() as f64 / durations.len() as f64
    };

    let tokens_used = completed.iter()
        .filter_map(|t| t.result.as_ref())
        .map(|r| r.metrics.tokens_used)
        .sum();
    let api_calls = completed.iter()
        .filter_map(|t| t.result.as_ref())
        .map(|r| r.metrics.api_calls)
        .sum();

    AgentMetrics {
        total_tasks,
        completed_tasks: completed.len(),
        failed_tasks: failed.len(),
        success_rate,
        average_execution_time_ms,
        tokens_used,
        api_calls,
        uptime_ms: now.signed_duration_since(created_at).num_milliseconds().max(0) as u64,
    }
}
