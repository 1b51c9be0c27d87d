use clap::Parser;
use tracing_subscriber::EnvFilter;

use herald::cli::{self, LogFormat};
use herald::errors::{ErrorKind, HeraldError};

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // Initialize logging
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match cli.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.with_ansi(!cli.no_color).init(),
    }

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = option_env!("GIT_HASH").unwrap_or("unknown"),
        built = env!("BUILD_TIMESTAMP"),
        "herald starting"
    );

    let result = match cli.command {
        cli::Commands::Run(args) => cli::run::handle_run(args).await,
        cli::Commands::Validate(args) => cli::validate::handle_validate(args).await,
        cli::Commands::State(args) => cli::query::handle_state(args).await,
        cli::Commands::History(args) => cli::query::handle_history(args).await,
        cli::Commands::Metrics(args) => cli::query::handle_metrics(args).await,
        cli::Commands::Feedback(args) => cli::feedback::handle_feedback(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(exit_code(&e));
    }
}

fn exit_code(error: &HeraldError) -> i32 {
    match error.classify().kind {
        ErrorKind::Configuration => 2,
        ErrorKind::Programmer => 3,
        ErrorKind::SchedulerInternal => 4,
        ErrorKind::Transient | ErrorKind::Cancellation => 1,
    }
}
