use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "required": ["agent"],
        "properties": {
            "agent": {
                "type": "object",
                "required": ["id", "name"],
                "properties": {
                    "id": { "type": "string", "minLength": 1 },
                    "name": { "type": "string" },
                    "description": { "type": "string" },
                    "skills": { "type": "array", "items": { "$ref": "#/$defs/task_type" } },
                    "max_concurrent_tasks": { "type": "integer", "minimum": 1 },
                    "retry_attempts": { "type": "integer", "minimum": 0 },
                    "timeout_ms": { "type": "integer", "minimum": 1 }
                }
            },
            "runner": {
                "type": "object",
                "properties": {
                    "poll_interval_ms": { "type": "integer", "minimum": 1 },
                    "dry_run_latency_ms": { "type": "integer", "minimum": 0 }
                }
            },
            "store": {
                "type": "object",
                "properties": {
                    "backend": { "type": "string", "enum": ["memory", "sqlite"] },
                    "path": { "type": "string" }
                }
            },
            "tasks": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["type"],
                    "properties": {
                        "type": { "$ref": "#/$defs/task_type" },
                        "priority": { "type": "string", "enum": ["low", "medium", "high", "urgent"] },
                        "payload": { "type": "object" },
                        "max_retries": { "type": "integer", "minimum": 0 }
                    }
                }
            }
        },
        "$defs": {
            "task_type": {
                "type": "string",
                "enum": [
                    "content-generation",
                    "social-post",
                    "market-research",
                    "email-campaign",
                    "community-engagement",
                    "analytics-report"
                ]
            }
        }
    })
});
