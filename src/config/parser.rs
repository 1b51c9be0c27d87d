use std::collections::HashSet;
use std::path::Path;

use tracing::warn;

use crate::errors::HeraldError;
use super::schema::CONFIG_SCHEMA;
use super::types::{HeraldConfig, StoreBackend};

pub async fn parse_config(path: &Path) -> Result<HeraldConfig, HeraldError> {
    if !path.exists() {
        return Err(HeraldError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > 1_048_576 {
        return Err(HeraldError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    parse_config_str(&content)
}

/// Parse and validate config text.
pub fn parse_config_str(content: &str) -> Result<HeraldConfig, HeraldError> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(content)?;

    validate_schema(&yaml)?;

    let config: HeraldConfig = serde_yaml::from_value(yaml)?;

    validate_conflicts(&config)?;

    Ok(config)
}

/// Structural check against the JSON schema. Advisory only: problems are logged.
fn validate_schema(yaml: &serde_yaml::Value) -> Result<(), HeraldError> {
    let json_value = serde_json::to_value(yaml)
        .map_err(|e| HeraldError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| HeraldError::Config(format!("Schema compilation error: {}", e)))?;

    if let Err(errors) = compiled.validate(&json_value) {
        for e in errors {
            warn!(validation_error = %format!("{} at {}", e, e.instance_path), "Config schema warning");
        }
    }

    Ok(())
}

/// Semantic checks that serde cannot express.
fn validate_conflicts(config: &HeraldConfig) -> Result<(), HeraldError> {
    config.agent.validate()?;

    let mut seen = HashSet::new();
    for skill in &config.agent.skills {
        if !seen.insert(*skill) {
            warn!(task_type = %skill, "Skill listed more than once");
        }
    }

    if let Some(ms) = config.runner.as_ref().and_then(|r| r.poll_interval_ms) {
        if ms == 0 {
            return Err(HeraldError::Config("runner.poll_interval_ms must be at least 1".into()));
        }
    }

    if let Some(store) = &config.store {
        if store.backend == StoreBackend::Memory && store.path.is_some() {
            warn!("store.path is ignored by the memory backend");
        }
        if store.backend == StoreBackend::Sqlite && store.path.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(HeraldError::Config("store.path must not be empty".into()));
        }
    }

    for (index, spec) in config.task_specs().iter().enumerate() {
        if !config.agent.skills.is_empty() && !config.agent.skills.contains(&spec.task_type) {
            return Err(HeraldError::Config(format!(
                "tasks[{}] has type '{}' which agent '{}' does not list in its skills",
                index, spec.task_type, config.agent.id
            )));
        }
    }

    Ok(())
}
