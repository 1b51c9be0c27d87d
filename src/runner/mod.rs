pub mod agent_runner;
pub mod events;
pub mod metrics;
pub mod state;

pub use agent_runner::AgentRunner;
pub use events::{EventBus, ListenerId, RunnerEvent};
pub use metrics::AgentMetrics;
pub use state::{AgentConfig, AgentState, AgentStatus, RunnerOptions};
