//! Response DTOs for the analysis job API
//!
//! Defines the structure of outgoing HTTP response bodies.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::cache::{BackendKind, CacheStats};
use crate::jobs::{Job, JobStatus};

/// Response body for a submitted job (POST /jobs)
#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    /// Always "queued"
    pub status: JobStatus,
    pub dataset_ref: String,
    pub created_at: DateTime<Utc>,
    /// Where to poll for progress
    pub polling_endpoint: String,
}

impl SubmitResponse {
    pub fn queued(job_id: Uuid, dataset_ref: impl Into<String>) -> Self {
        Self {
            job_id,
            status: JobStatus::Queued,
            dataset_ref: dataset_ref.into(),
            created_at: Utc::now(),
            polling_endpoint: format!("/jobs/{}", job_id),
        }
    }
}

/// Response body for job polling (GET /jobs/:job_id)
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub dataset_ref: String,
    pub status: JobStatus,
    pub progress: u8,
    pub current_phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            dataset_ref: job.dataset_ref,
            status: job.status,
            progress: job.progress,
            current_phase: job.current_phase,
            error: job.error,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        let hit_rate = stats.hit_rate();
        Self { stats, hit_rate }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status, "healthy" while the process serves requests
    pub status: String,
    /// "healthy" on Redis, "degraded" on the local fallback
    pub cache: String,
    pub cache_backend: BackendKind,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn for_backend(backend: BackendKind) -> Self {
        let cache = match backend {
            BackendKind::Remote => "healthy",
            BackendKind::LocalFallback => "degraded",
        };
        Self {
            status: "healthy".to_string(),
            cache: cache.to_string(),
            cache_backend: backend,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
