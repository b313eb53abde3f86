//! Jobs Module
//!
//! Job records and the orchestrator that runs them.

mod model;
mod orchestrator;

pub use model::{Job, JobStatus, TransitionError};
pub use orchestrator::{
    validate_dataset_ref, JobHandle, JobPolicy, Orchestrator, MAX_DATASET_REF_LENGTH,
};

pub(crate) use orchestrator::read_job;
