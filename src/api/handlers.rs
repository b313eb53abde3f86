//! API Handlers
//!
//! HTTP request handlers for each analysis job endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use crate::cache::{CacheStore, RedisBackend};
use crate::config::Config;
use crate::dataset::{CsvDirectoryResolver, DatasetResolver};
use crate::error::{Result, ServiceError};
use crate::jobs::{JobPolicy, Orchestrator};
use crate::models::{
    HealthResponse, JobStatusResponse, StatsResponse, SubmitRequest, SubmitResponse,
};
use crate::pipeline::{default_pipeline, Pipeline};
use crate::query::QueryService;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Shared cache store
    pub cache: Arc<CacheStore>,
    pub orchestrator: Orchestrator,
    pub query: QueryService,
}

impl AppState {
    /// Wires the orchestrator and query surface around one cache store.
    pub fn new(
        cache: Arc<CacheStore>,
        pipeline: Pipeline,
        resolver: Arc<dyn DatasetResolver>,
        policy: JobPolicy,
    ) -> Self {
        let orchestrator = Orchestrator::new(Arc::clone(&cache), pipeline, resolver, policy);
        let query = QueryService::new(Arc::clone(&cache));
        Self {
            cache,
            orchestrator,
            query,
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Connects to Redis when `redis_url` is set, and otherwise caches in
    /// process. Datasets are read from `data_dir`.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let cache = match &config.redis_url {
            Some(url) => {
                let remote = RedisBackend::new(
                    url,
                    &config.redis_prefix,
                    Duration::from_millis(config.remote_timeout_ms),
                )?;
                CacheStore::connect(
                    Arc::new(remote),
                    Duration::from_secs(config.reconnect_interval),
                )
                .await
            }
            None => CacheStore::local_only(),
        };

        Ok(Self::new(
            Arc::new(cache),
            default_pipeline()?,
            Arc::new(CsvDirectoryResolver::new(config.data_dir.clone())),
            config.job_policy(),
        ))
    }
}

/// Handler for POST /jobs
///
/// Queues an analysis and answers 202 with the job id.
pub async fn submit_handler(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>)> {
    let handle = state.orchestrator.submit(&req.dataset_ref).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse::queued(handle.id(), req.dataset_ref)),
    ))
}

/// Handler for GET /jobs/:job_id
///
/// Unknown, expired, and malformed ids are all 404.
pub async fn job_status_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>> {
    let not_found = || ServiceError::NotFound(format!("Job '{}' not found or expired", job_id));

    let id = Uuid::parse_str(&job_id).map_err(|_| not_found())?;
    let job = state.query.job_status(&id).await.ok_or_else(not_found)?;

    Ok(Json(job.into()))
}

/// Handler for GET /datasets/:dataset_ref/views/:view
///
/// Returns the phase payload as-is.
pub async fn view_handler(
    State(state): State<AppState>,
    Path((dataset_ref, view)): Path<(String, String)>,
) -> Result<Json<Value>> {
    state
        .query
        .get_view(&dataset_ref, &view)
        .await
        .map(Json)
        .ok_or_else(|| {
            ServiceError::NotFound(format!(
                "View '{}' for dataset '{}' not found or expired",
                view, dataset_ref
            ))
        })
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.query.stats().await.into())
}

/// Handler for GET /health
///
/// Reports which cache backend is serving traffic.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::for_backend(state.query.health().await))
}
