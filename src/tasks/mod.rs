//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Cache maintenance: sweeps expired local entries and probes Redis

mod cleanup;

pub use cleanup::spawn_cleanup_task;
