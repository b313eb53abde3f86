//! Analysis Jobs - asynchronous dataset analysis over a resilient cache
//!
//! Runs a fixed pipeline of analysis phases per submitted dataset, publishes
//! progress and per-phase results to Redis, and falls back to an in-process
//! cache whenever Redis is unreachable.

pub mod api;
pub mod cache;
pub mod config;
pub mod dataset;
pub mod error;
pub mod jobs;
pub mod models;
pub mod pipeline;
pub mod query;
pub mod tasks;

pub use api::{create_router, AppState};
pub use config::Config;
pub use jobs::Orchestrator;
pub use query::QueryService;
pub use tasks::spawn_cleanup_task;
