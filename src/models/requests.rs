//! Request DTOs for the analysis job API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

/// Request body for submitting an analysis (POST /jobs)
///
/// The reference is validated by the orchestrator on submit.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    /// Reference of the dataset to analyze
    pub dataset_ref: String,
}
