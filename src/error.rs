//! Error types for the analysis job service
//!
//! Provides unified error handling using thiserror. Each layer owns its own
//! enum; only `ServiceError` ever reaches an HTTP client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Service Error Enum ==
/// Errors surfaced synchronously to callers of the service.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Bad or missing dataset reference at submit time
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Unknown job id, or a view that is missing or expired
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Cache Error Enum ==
/// Failures of a single cache backend call.
///
/// These never leave the `CacheStore`; they only decide whether it demotes
/// itself to the local fallback.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Remote backend returned an error or dropped the connection
    #[error("Remote cache error: {0}")]
    Remote(String),

    /// Remote backend did not answer within the configured timeout
    #[error("Remote cache timed out after {0} ms")]
    Timeout(u64),

    /// Stored bytes could not be decoded
    #[error("Corrupt cache entry: {0}")]
    Codec(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Remote(err.to_string())
    }
}

// == Phase Error Enum ==
/// Failure of one pipeline phase. Captured into the job record, never thrown.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhaseError {
    /// The phase function reported an error
    #[error("{0}")]
    Failed(String),

    /// The phase exceeded its time budget
    #[error("phase timed out")]
    TimedOut,

    /// The phase body panicked on the blocking pool
    #[error("phase panicked: {0}")]
    Panicked(String),
}

// == Dataset Error Enum ==
/// Failure to turn a dataset reference into a table.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// No dataset exists under this reference
    #[error("dataset '{0}' not found")]
    NotFound(String),

    /// Reference cannot be mapped to storage
    #[error("invalid dataset reference '{0}'")]
    InvalidReference(String),

    /// Dataset exists but could not be read or parsed
    #[error("failed to read dataset: {0}")]
    Io(String),
}

impl From<std::io::Error> for DatasetError {
    fn from(err: std::io::Error) -> Self {
        DatasetError::Io(err.to_string())
    }
}

// == Pipeline Error Enum ==
/// Invalid pipeline declaration, reported when the pipeline is built.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PipelineError {
    /// Phase name is empty or contains `:`
    #[error("invalid phase name '{0}'")]
    InvalidPhaseName(String),

    /// Two phases share a name
    #[error("duplicate phase name '{0}'")]
    DuplicatePhase(String),
}

// == Result Type Alias ==
/// Convenience Result type for the service.
pub type Result<T> = std::result::Result<T, ServiceError>;
