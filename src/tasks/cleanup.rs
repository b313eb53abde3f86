//! Cache Maintenance Task
//!
//! Background task that periodically drops expired local cache entries and
//! pings the store so a recovered Redis is re-adopted even when no job is
//! touching the cache.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheStore;

/// Spawns the maintenance loop.
///
/// # Arguments
/// * `cache` - Shared cache store
/// * `interval_secs` - Seconds between runs
///
/// # Returns
/// A JoinHandle for the spawned task, aborted during graceful shutdown.
pub fn spawn_cleanup_task(cache: Arc<CacheStore>, interval_secs: u64) -> JoinHandle<()> {
    spawn_cleanup_task_every(cache, Duration::from_secs(interval_secs))
}

pub(crate) fn spawn_cleanup_task_every(
    cache: Arc<CacheStore>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting cache maintenance task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.sweep_expired().await;
            let backend = cache.ping().await;

            if removed > 0 {
                info!(backend = %backend, "Cache maintenance: removed {} expired entries", removed);
            } else {
                debug!(backend = %backend, "Cache maintenance: no expired entries found");
            }
        }
    })
}
