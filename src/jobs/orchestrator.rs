//! Job Orchestrator
//!
//! Accepts analysis requests, runs the phase pipeline for each on its own
//! tokio task, and publishes job state and phase results to the cache.
//!
//! Each job's whole lifecycle lives inside the one task that owns its `Job`
//! value, so no two writers ever update the same job record.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::{job_key, view_key, CacheStore, MAX_KEY_LENGTH};
use crate::dataset::DatasetResolver;
use crate::error::{Result, ServiceError};
use crate::jobs::{Job, TransitionError};
use crate::pipeline::{PhaseResult, PhaseSink, Pipeline};

/// Longest accepted dataset reference, leaving room for the view key prefix.
pub const MAX_DATASET_REF_LENGTH: usize = 200;

// == Job Policy ==
/// Retention and time limits applied to every job.
#[derive(Debug, Clone)]
pub struct JobPolicy {
    /// How long job records stay queryable
    pub job_ttl: Duration,
    /// How long phase results stay queryable
    pub view_ttl: Duration,
    /// Ceiling for a single phase
    pub phase_timeout: Duration,
}

impl Default for JobPolicy {
    fn default() -> Self {
        Self {
            job_ttl: Duration::from_secs(86_400),
            view_ttl: Duration::from_secs(86_400),
            phase_timeout: Duration::from_secs(300),
        }
    }
}

// == Validation ==
/// Checks a dataset reference before any work is scheduled.
pub fn validate_dataset_ref(dataset_ref: &str) -> Result<()> {
    if dataset_ref.trim().is_empty() {
        return Err(ServiceError::Validation(
            "dataset reference cannot be empty".to_string(),
        ));
    }
    if dataset_ref.len() > MAX_DATASET_REF_LENGTH {
        return Err(ServiceError::Validation(format!(
            "dataset reference exceeds maximum length of {} bytes",
            MAX_DATASET_REF_LENGTH
        )));
    }
    if dataset_ref.chars().any(char::is_control) {
        return Err(ServiceError::Validation(
            "dataset reference contains control characters".to_string(),
        ));
    }
    Ok(())
}

// == Job Handle ==
/// Returned by [`Orchestrator::submit`]. Dropping it detaches the job.
#[derive(Debug)]
pub struct JobHandle {
    id: Uuid,
    task: JoinHandle<Job>,
}

impl JobHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Waits for the job to reach a terminal state and returns its final
    /// record. `None` only if the job task panicked.
    pub async fn wait(self) -> Option<Job> {
        self.task.await.ok()
    }
}

// == Orchestrator ==
#[derive(Clone)]
pub struct Orchestrator {
    cache: Arc<CacheStore>,
    pipeline: Arc<Pipeline>,
    resolver: Arc<dyn DatasetResolver>,
    policy: JobPolicy,
}

impl Orchestrator {
    pub fn new(
        cache: Arc<CacheStore>,
        pipeline: Pipeline,
        resolver: Arc<dyn DatasetResolver>,
        policy: JobPolicy,
    ) -> Self {
        Self {
            cache,
            pipeline: Arc::new(pipeline),
            resolver,
            policy,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    // == Submit ==
    /// Queues an analysis of `dataset_ref` and returns without waiting for it.
    ///
    /// Resubmitting a dataset that already has a job in flight starts an
    /// independent job; the two race on the dataset's view keys and the later
    /// write wins.
    pub async fn submit(&self, dataset_ref: &str) -> Result<JobHandle> {
        validate_dataset_ref(dataset_ref)?;

        let job = Job::new(dataset_ref);
        let id = job.id;
        write_job(&self.cache, &job, self.policy.job_ttl).await;

        let runner = JobRunner {
            cache: Arc::clone(&self.cache),
            policy: self.policy.clone(),
            job,
        };
        let task = tokio::spawn(runner.run(
            Arc::clone(&self.pipeline),
            Arc::clone(&self.resolver),
        ));

        info!(job_id = %id, dataset_ref, "Job queued");
        Ok(JobHandle { id, task })
    }

    // == Status ==
    /// Current record of job `id`, or `None` if unknown or expired.
    pub async fn status(&self, id: &Uuid) -> Option<Job> {
        read_job(&self.cache, id).await
    }
}

// == Job Record IO ==
pub(crate) async fn write_job(cache: &CacheStore, job: &Job, ttl: Duration) {
    match serde_json::to_vec(job) {
        Ok(bytes) => cache.put(&job_key(&job.id), bytes, ttl).await,
        Err(err) => warn!(job_id = %job.id, error = %err, "Failed to encode job record"),
    }
}

pub(crate) async fn read_job(cache: &CacheStore, id: &Uuid) -> Option<Job> {
    let bytes = cache.get(&job_key(id)).await?;
    match serde_json::from_slice(&bytes) {
        Ok(job) => Some(job),
        Err(err) => {
            warn!(job_id = %id, error = %err, "Discarding undecodable job record");
            None
        }
    }
}

// == Job Runner ==
/// Sole owner and writer of one job's record.
struct JobRunner {
    cache: Arc<CacheStore>,
    policy: JobPolicy,
    job: Job,
}

impl JobRunner {
    async fn run(mut self, pipeline: Arc<Pipeline>, resolver: Arc<dyn DatasetResolver>) -> Job {
        let dataset_ref = self.job.dataset_ref.clone();

        let table = match resolver.resolve(&dataset_ref).await {
            Ok(table) => table,
            Err(err) => {
                let message = format!("dataset unavailable: {}", err);
                self.apply(|job| job.fail(message)).await;
                warn!(
                    job_id = %self.job.id,
                    dataset_ref = %dataset_ref,
                    error = %err,
                    "Job failed"
                );
                return self.job;
            }
        };

        let first_phase = pipeline.phase_names().first().map(|name| name.to_string());
        self.apply(|job| job.start(first_phase.as_deref())).await;
        info!(
            job_id = %self.job.id,
            dataset_ref = %dataset_ref,
            phases = pipeline.len(),
            "Job processing"
        );

        let outcome = pipeline
            .run(&dataset_ref, table, self.policy.phase_timeout, &mut self)
            .await;

        match outcome {
            Ok(_) => {
                self.apply(Job::complete).await;
                info!(job_id = %self.job.id, dataset_ref = %dataset_ref, "Job completed");
            }
            Err(failure) => {
                let message = failure.error.to_string();
                self.apply(|job| job.fail(message)).await;
                warn!(
                    job_id = %self.job.id,
                    dataset_ref = %dataset_ref,
                    phase = %failure.phase,
                    error = %failure.error,
                    "Job failed"
                );
            }
        }

        self.job
    }

    /// Applies a state change and publishes the record if it was accepted.
    async fn apply<F>(&mut self, change: F)
    where
        F: FnOnce(&mut Job) -> std::result::Result<(), TransitionError>,
    {
        match change(&mut self.job) {
            Ok(()) => write_job(&self.cache, &self.job, self.policy.job_ttl).await,
            Err(err) => {
                warn!(job_id = %self.job.id, error = %err, "Ignoring invalid job transition")
            }
        }
    }
}

#[async_trait]
impl PhaseSink for JobRunner {
    async fn phase_started(&mut self, phase: &str, progress: u8) {
        let unchanged =
            self.job.current_phase.as_deref() == Some(phase) && self.job.progress == progress;
        if !unchanged {
            self.apply(|job| job.advance(phase, progress)).await;
        }
    }

    async fn phase_completed(&mut self, result: &PhaseResult) {
        let key = view_key(&result.dataset_ref, &result.phase_name);
        if key.len() > MAX_KEY_LENGTH {
            warn!(key_len = key.len(), "View key too long, result not cached");
            return;
        }
        match serde_json::to_vec(&result.payload) {
            Ok(bytes) => self.cache.put(&key, bytes, self.policy.view_ttl).await,
            Err(err) => warn!(
                job_id = %self.job.id,
                phase = %result.phase_name,
                error = %err,
                "Failed to encode phase result"
            ),
        }
    }
}
