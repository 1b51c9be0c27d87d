pub mod commands;
pub mod feedback;
pub mod query;
pub mod run;
pub mod validate;

pub use commands::{Cli, Commands, LogFormat};
