//! Agent task scheduling engine.
//!
//! Typed, prioritized tasks flow through a [`queue::JobQueue`] into an
//! [`runner::AgentRunner`], which dispatches them to registered
//! [`skills::Skill`]s under bounded concurrency with timeout and retry, and
//! records outcomes through an [`store::AgentStore`].

pub mod config;
pub mod db;
pub mod errors;
pub mod queue;
pub mod runner;
pub mod skills;
pub mod store;
pub mod task;

#[cfg(feature = "cli")]
pub mod cli;

pub use errors::{HeraldError, Result};
