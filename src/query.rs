//! Query Surface
//!
//! Read-only lookups of job state and phase results for the HTTP layer.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::cache::{view_key, BackendKind, CacheStats, CacheStore};
use crate::jobs::{read_job, Job};

#[derive(Clone)]
pub struct QueryService {
    cache: Arc<CacheStore>,
}

impl QueryService {
    pub fn new(cache: Arc<CacheStore>) -> Self {
        Self { cache }
    }

    /// Current record of job `id`; `None` if it never existed or expired.
    pub async fn job_status(&self, id: &Uuid) -> Option<Job> {
        read_job(&self.cache, id).await
    }

    /// Result of phase `view_name` for `dataset_ref`; `None` until that phase
    /// has completed, or once its entry expired.
    pub async fn get_view(&self, dataset_ref: &str, view_name: &str) -> Option<Value> {
        if view_name.contains(':') {
            return None;
        }

        let bytes = self.cache.get(&view_key(dataset_ref, view_name)).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(dataset_ref, view_name, error = %err, "Discarding undecodable view");
                None
            }
        }
    }

    /// Backend currently serving cache traffic.
    pub async fn health(&self) -> BackendKind {
        self.cache.ping().await
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}
