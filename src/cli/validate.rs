use std::path::PathBuf;

use crate::cli::commands::ValidateArgs;
use crate::config;
use crate::errors::HeraldError;

pub async fn handle_validate(args: ValidateArgs) -> Result<(), HeraldError> {
    let path = PathBuf::from(&args.config);
    let config = config::parse_config(&path).await?;
    println!("Configuration is valid: {}", args.config);
    println!(
        "  agent: {} ({}), {} task(s), max {} concurrent",
        config.agent.id,
        config.agent.name,
        config.task_specs().len(),
        config.agent.max_concurrent_tasks
    );
    Ok(())
}
