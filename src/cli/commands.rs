use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "herald",
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_TIMESTAMP"), ")"),
    about = "Agent task scheduling engine"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an agent from a config file until its task list drains
    Run(RunArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
    /// Show or delete the persisted state of an agent
    State(StateArgs),
    /// List an agent's most recent tasks
    History(HistoryArgs),
    /// Show aggregate metrics for an agent
    Metrics(MetricsArgs),
    /// Record or list review feedback for a task
    Feedback(FeedbackArgs),
}

#[derive(Args, Clone)]
pub struct RunArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: String,

    /// Override the SQLite path from the config
    #[arg(long)]
    pub db: Option<String>,

    /// Requeue unfinished tasks from a previous run before starting
    #[arg(long)]
    pub recover: bool,

    /// Print task events as they happen
    #[arg(long)]
    pub follow: bool,
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// Config file to validate
    pub config: String,
}

#[derive(Args, Clone)]
pub struct StateArgs {
    /// Agent ID
    pub agent_id: String,

    /// SQLite database path
    #[arg(long, default_value = "herald.db")]
    pub db: String,

    /// Delete the stored state instead of printing it
    #[arg(long)]
    pub delete: bool,
}

#[derive(Args, Clone)]
pub struct HistoryArgs {
    /// Agent ID
    pub agent_id: String,

    /// SQLite database path
    #[arg(long, default_value = "herald.db")]
    pub db: String,

    /// Maximum number of tasks to show
    #[arg(short, long, default_value = "20")]
    pub limit: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct MetricsArgs {
    /// Agent ID
    pub agent_id: String,

    /// SQLite database path
    #[arg(long, default_value = "herald.db")]
    pub db: String,
}

#[derive(Args, Clone)]
pub struct FeedbackArgs {
    /// Task ID
    pub task_id: String,

    /// SQLite database path
    #[arg(long, default_value = "herald.db")]
    pub db: String,

    /// Rating from 1 to 5
    #[arg(long)]
    pub rating: Option<u8>,

    /// Free-form review comment
    #[arg(long)]
    pub comment: Option<String>,

    /// Mark the task output as approved
    #[arg(long)]
    pub approve: bool,
}

impl FeedbackArgs {
    /// True when the invocation records feedback rather than listing it.
    pub fn is_write(&self) -> bool {
        self.rating.is_some() || self.comment.is_some() || self.approve
    }
}
