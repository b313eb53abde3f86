//! Integration Tests for the Job Orchestrator
//!
//! Drives whole jobs through the pipeline and observes them the way a
//! polling client would, through the query surface.

use std::sync::Arc;
use std::time::{Duration, Instant};

use analysis_jobs::cache::{BackendKind, CacheBackend, CacheStore};
use analysis_jobs::dataset::{DatasetResolver, Table};
use analysis_jobs::error::{CacheError, DatasetError, PhaseError};
use analysis_jobs::jobs::{Job, JobPolicy, JobStatus, Orchestrator};
use analysis_jobs::pipeline::{Phase, Pipeline, PriorResults};
use analysis_jobs::QueryService;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use uuid::Uuid;

// == Helpers ==

/// Resolves any reference to the same table, optionally after a gate opens.
struct StaticResolver {
    table: Arc<Table>,
    gate: Option<Arc<Semaphore>>,
}

impl StaticResolver {
    fn new() -> Self {
        Self {
            table: Arc::new(Table::from_csv("a,b\n1,2\n3,\n").unwrap()),
            gate: None,
        }
    }

    fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }
}

#[async_trait]
impl DatasetResolver for StaticResolver {
    async fn resolve(&self, dataset_ref: &str) -> Result<Arc<Table>, DatasetError> {
        if dataset_ref == "missing" {
            return Err(DatasetError::NotFound(dataset_ref.to_string()));
        }
        if let Some(gate) = &self.gate {
            pass(gate).await;
        }
        Ok(Arc::clone(&self.table))
    }
}

/// Phase returning a fixed payload once its gate hands out a permit.
struct GatedPhase {
    name: String,
    payload: Value,
    gate: Arc<Semaphore>,
}

#[async_trait]
impl Phase for GatedPhase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _table: Arc<Table>, _prior: &PriorResults) -> Result<Value, PhaseError> {
        pass(&self.gate).await;
        Ok(self.payload.clone())
    }
}

/// Phase that sleeps before answering.
struct SlowPhase {
    delay: Duration,
}

#[async_trait]
impl Phase for SlowPhase {
    fn name(&self) -> &str {
        "slow"
    }

    async fn run(&self, _table: Arc<Table>, _prior: &PriorResults) -> Result<Value, PhaseError> {
        tokio::time::sleep(self.delay).await;
        Ok(json!({ "slept_ms": self.delay.as_millis() as u64 }))
    }
}

/// Redis stand-in whose every call fails.
struct FailingRemote;

#[async_trait]
impl CacheBackend for FailingRemote {
    async fn put(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Remote("connection refused".to_string()))
    }

    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Err(CacheError::Remote("connection refused".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::Remote("connection refused".to_string()))
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Err(CacheError::Remote("connection refused".to_string()))
    }
}

async fn pass(gate: &Semaphore) {
    if let Ok(permit) = gate.acquire().await {
        permit.forget();
    }
}

fn simple_pipeline() -> Pipeline {
    Pipeline::builder()
        .phase_fn("profile", |table: &Table, _: &PriorResults| {
            Ok(json!({ "rows": table.row_count() }))
        })
        .build()
        .unwrap()
}

fn setup(
    cache: CacheStore,
    pipeline: Pipeline,
    resolver: impl DatasetResolver + 'static,
    policy: JobPolicy,
) -> (Orchestrator, QueryService) {
    let cache = Arc::new(cache);
    let orchestrator = Orchestrator::new(Arc::clone(&cache), pipeline, Arc::new(resolver), policy);
    (orchestrator, QueryService::new(cache))
}

/// Polls job `id` until `predicate` holds, recording every progress value seen.
async fn poll_until<F>(query: &QueryService, id: &Uuid, seen: &mut Vec<u8>, predicate: F) -> Job
where
    F: Fn(&Job) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(job) = query.job_status(id).await {
            seen.push(job.progress);
            if predicate(&job) {
                return job;
            }
        }
        assert!(Instant::now() < deadline, "job {} never reached the expected state", id);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// == Full Lifecycle ==

#[tokio::test]
async fn test_job_moves_through_every_state() {
    let resolve_gate = Arc::new(Semaphore::new(0));
    let profile_gate = Arc::new(Semaphore::new(0));
    let stats_gate = Arc::new(Semaphore::new(0));

    let pipeline = Pipeline::builder()
        .phase(GatedPhase {
            name: "profile".to_string(),
            payload: json!({ "rows": 100 }),
            gate: Arc::clone(&profile_gate),
        })
        .phase(GatedPhase {
            name: "stats".to_string(),
            payload: json!({ "mean": 5.2 }),
            gate: Arc::clone(&stats_gate),
        })
        .build()
        .unwrap();
    let (orchestrator, query) = setup(
        CacheStore::local_only(),
        pipeline,
        StaticResolver::gated(Arc::clone(&resolve_gate)),
        JobPolicy::default(),
    );

    let handle = orchestrator.submit("ds-1").await.unwrap();
    let id = handle.id();
    let mut seen = Vec::new();

    let job = poll_until(&query, &id, &mut seen, |_| true).await;
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.progress, 0);

    resolve_gate.add_permits(1);
    let job = poll_until(&query, &id, &mut seen, |j| j.status == JobStatus::Processing).await;
    assert_eq!(job.current_phase.as_deref(), Some("profile"));
    assert!(query.get_view("ds-1", "profile").await.is_none());

    profile_gate.add_permits(1);
    let job = poll_until(&query, &id, &mut seen, |j| {
        j.current_phase.as_deref() == Some("stats")
    })
    .await;
    assert_eq!(job.status, JobStatus::Processing);
    assert_eq!(job.progress, 50);
    assert_eq!(
        query.get_view("ds-1", "profile").await,
        Some(json!({ "rows": 100 }))
    );
    assert!(query.get_view("ds-1", "stats").await.is_none());

    stats_gate.add_permits(1);
    let job = poll_until(&query, &id, &mut seen, |j| j.status.is_terminal()).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert!(job.error.is_none());
    assert_eq!(
        query.get_view("ds-1", "stats").await,
        Some(json!({ "mean": 5.2 }))
    );

    assert!(
        seen.windows(2).all(|w| w[0] <= w[1]),
        "progress went backwards: {:?}",
        seen
    );
}

// == Failure Handling ==

#[tokio::test]
async fn test_failed_phase_keeps_earlier_results() {
    let pipeline = Pipeline::builder()
        .phase_fn("first", |_: &Table, _: &PriorResults| Ok(json!({ "ok": 1 })))
        .phase_fn("second", |_: &Table, _: &PriorResults| {
            Err(PhaseError::Failed("column 'x' is not numeric".to_string()))
        })
        .phase_fn("third", |_: &Table, _: &PriorResults| Ok(json!({ "ok": 3 })))
        .build()
        .unwrap();
    let (orchestrator, query) = setup(
        CacheStore::local_only(),
        pipeline,
        StaticResolver::new(),
        JobPolicy::default(),
    );

    let handle = orchestrator.submit("ds-2").await.unwrap();
    let id = handle.id();
    let job = handle.wait().await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("column 'x' is not numeric"));
    assert_eq!(job.current_phase.as_deref(), Some("second"));
    assert!(job.progress < 100);

    let polled = query.job_status(&id).await.unwrap();
    assert_eq!(polled.status, JobStatus::Failed);

    assert_eq!(query.get_view("ds-2", "first").await, Some(json!({ "ok": 1 })));
    assert!(query.get_view("ds-2", "second").await.is_none());
    assert!(query.get_view("ds-2", "third").await.is_none());
}

#[tokio::test]
async fn test_phase_timeout_fails_job() {
    let pipeline = Pipeline::builder()
        .phase(SlowPhase {
            delay: Duration::from_secs(5),
        })
        .build()
        .unwrap();
    let policy = JobPolicy {
        phase_timeout: Duration::from_millis(50),
        ..JobPolicy::default()
    };
    let (orchestrator, _query) = setup(
        CacheStore::local_only(),
        pipeline,
        StaticResolver::new(),
        policy,
    );

    let job = orchestrator.submit("ds-1").await.unwrap().wait().await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("phase timed out"));
    assert_eq!(job.current_phase.as_deref(), Some("slow"));
}

#[tokio::test]
async fn test_unresolvable_dataset_fails_job() {
    let (orchestrator, query) = setup(
        CacheStore::local_only(),
        simple_pipeline(),
        StaticResolver::new(),
        JobPolicy::default(),
    );

    let handle = orchestrator.submit("missing").await.unwrap();
    let id = handle.id();
    handle.wait().await.unwrap();

    let job = query.job_status(&id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job
        .error
        .as_deref()
        .unwrap()
        .starts_with("dataset unavailable"));
    assert!(query.get_view("missing", "profile").await.is_none());
}

// == Submission ==

#[tokio::test]
async fn test_submit_returns_before_pipeline_finishes() {
    let pipeline = Pipeline::builder()
        .phase(SlowPhase {
            delay: Duration::from_secs(2),
        })
        .build()
        .unwrap();
    let (orchestrator, query) = setup(
        CacheStore::local_only(),
        pipeline,
        StaticResolver::new(),
        JobPolicy::default(),
    );

    let started = Instant::now();
    let handle = orchestrator.submit("ds-1").await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(500));

    let job = query.job_status(&handle.id()).await.unwrap();
    assert!(!job.status.is_terminal());
}

#[tokio::test]
async fn test_resubmission_creates_independent_jobs() {
    let (orchestrator, query) = setup(
        CacheStore::local_only(),
        simple_pipeline(),
        StaticResolver::new(),
        JobPolicy::default(),
    );

    let first = orchestrator.submit("ds-1").await.unwrap();
    let second = orchestrator.submit("ds-1").await.unwrap();
    assert_ne!(first.id(), second.id());

    let (first_id, second_id) = (first.id(), second.id());
    assert_eq!(first.wait().await.unwrap().status, JobStatus::Completed);
    assert_eq!(second.wait().await.unwrap().status, JobStatus::Completed);

    assert!(query.job_status(&first_id).await.is_some());
    assert!(query.job_status(&second_id).await.is_some());
    assert_eq!(
        query.get_view("ds-1", "profile").await,
        Some(json!({ "rows": 2 }))
    );
}

#[tokio::test]
async fn test_unknown_job_is_none() {
    let (_orchestrator, query) = setup(
        CacheStore::local_only(),
        simple_pipeline(),
        StaticResolver::new(),
        JobPolicy::default(),
    );

    assert!(query.job_status(&Uuid::new_v4()).await.is_none());
}

// == Cache Degradation ==

#[tokio::test]
async fn test_jobs_complete_with_unreachable_remote() {
    let cache = CacheStore::connect(Arc::new(FailingRemote), Duration::from_secs(60)).await;
    let (orchestrator, query) = setup(
        cache,
        simple_pipeline(),
        StaticResolver::new(),
        JobPolicy::default(),
    );

    let handle = orchestrator.submit("ds-1").await.unwrap();
    let id = handle.id();
    handle.wait().await.unwrap();

    let job = query.job_status(&id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(
        query.get_view("ds-1", "profile").await,
        Some(json!({ "rows": 2 }))
    );
    assert_eq!(query.health().await, BackendKind::LocalFallback);
}
