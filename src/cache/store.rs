//! Cache Store Module
//!
//! Tiered cache: a remote backend when it is reachable, an in-process backend
//! otherwise. Backend failures are absorbed here and never reach callers.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{BackendKind, CacheBackend, CacheStats, LocalBackend, MAX_KEY_LENGTH};
use crate::error::CacheError;

// == Store State ==
/// Backend selection and counters, guarded by the store's lock.
///
/// The lock is never held across a backend call.
#[derive(Debug)]
struct StoreState {
    mode: BackendKind,
    last_probe: Option<Instant>,
    /// Keys deleted while the remote was unreachable. Their remote copies
    /// are ignored until the delete is replayed.
    pending_deletes: HashSet<String>,
    stats: CacheStats,
}

impl StoreState {
    fn new(mode: BackendKind, last_probe: Option<Instant>) -> Self {
        Self {
            mode,
            last_probe,
            pending_deletes: HashSet::new(),
            stats: CacheStats::new(),
        }
    }
}

/// Outcome of asking which remote, if any, serves the current call.
struct ActiveRemote<'a> {
    backend: &'a Arc<dyn CacheBackend>,
    /// The remote was pinged successfully while answering
    probed: bool,
}

// == Cache Store ==
/// Cache shared by the orchestrator and the query surface.
pub struct CacheStore {
    /// Networked backend, if one is configured
    remote: Option<Arc<dyn CacheBackend>>,
    /// Always-available fallback
    local: LocalBackend,
    /// Minimum delay between attempts to re-adopt the remote backend
    reconnect_interval: Duration,
    state: Mutex<StoreState>,
}

impl CacheStore {
    // == Constructors ==
    /// Creates a store with no remote backend. It stays in local-fallback mode.
    pub fn local_only() -> Self {
        Self {
            remote: None,
            local: LocalBackend::new(),
            reconnect_interval: Duration::MAX,
            state: Mutex::new(StoreState::new(BackendKind::LocalFallback, None)),
        }
    }

    /// Creates a store in front of `remote`, pinging it once to pick the
    /// starting mode.
    ///
    /// # Arguments
    /// * `remote` - The preferred backend
    /// * `reconnect_interval` - While in fallback, the remote is re-probed at
    ///   most once per this interval
    pub async fn connect(remote: Arc<dyn CacheBackend>, reconnect_interval: Duration) -> Self {
        let (mode, last_probe) = match remote.ping().await {
            Ok(()) => {
                info!("Remote cache reachable, using remote backend");
                (BackendKind::Remote, None)
            }
            Err(err) => {
                warn!(error = %err, "Remote cache unreachable, using local fallback");
                (BackendKind::LocalFallback, Some(Instant::now()))
            }
        };

        Self {
            remote: Some(remote),
            local: LocalBackend::new(),
            reconnect_interval,
            state: Mutex::new(StoreState::new(mode, last_probe)),
        }
    }

    // == Put ==
    /// Stores `value` under `key` for `ttl`. Never fails; a remote error
    /// demotes the store and the write lands in the local backend.
    pub async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        if !Self::key_allowed(key) {
            return;
        }

        if let Some(remote) = self.active_remote().await {
            match remote.backend.put(key, value.clone(), ttl).await {
                Ok(()) => {
                    // Local entries shadow the remote on reads; drop any
                    // copy left from an outage.
                    let _ = self.local.delete(key).await;
                    self.state.lock().await.pending_deletes.remove(key);
                    return;
                }
                Err(err) => self.demote("put", &err).await,
            }
        }

        let _ = self.local.put(key, value, ttl).await;
    }

    // == Get ==
    /// Returns the live value for `key`, or `None` on a miss.
    ///
    /// The local backend is consulted first. It only holds keys written
    /// while the remote was unreachable, and a successful remote write drops
    /// the local copy, so a live local entry is always the newest value.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        if !Self::key_allowed(key) {
            return None;
        }

        let mut value = self.local.get(key).await.ok().flatten();

        if value.is_none() {
            if let Some(remote) = self.active_remote().await {
                if !self.is_pending_delete(key).await {
                    match remote.backend.get(key).await {
                        Ok(found) => value = found,
                        Err(CacheError::Codec(msg)) => {
                            warn!(key, error = %msg, "Discarding undecodable remote entry");
                        }
                        Err(err) => self.demote("get", &err).await,
                    }
                }
            }
        }

        let mut state = self.state.lock().await;
        if value.is_some() {
            state.stats.record_hit();
        } else {
            state.stats.record_miss();
        }
        value
    }

    // == Delete ==
    /// Best-effort removal from both backends.
    ///
    /// A delete that cannot reach the remote is remembered and replayed when
    /// the remote is re-adopted, so the old remote copy does not reappear.
    pub async fn delete(&self, key: &str) {
        let _ = self.local.delete(key).await;

        if self.remote.is_none() {
            return;
        }

        let removed = match self.active_remote().await {
            Some(remote) => match remote.backend.delete(key).await {
                Ok(()) => true,
                Err(err) => {
                    self.demote("delete", &err).await;
                    false
                }
            },
            None => false,
        };

        let mut state = self.state.lock().await;
        if removed {
            state.pending_deletes.remove(key);
        } else {
            state.pending_deletes.insert(key.to_string());
        }
    }

    // == Ping ==
    /// Reports the backend currently serving traffic.
    ///
    /// In remote mode the remote is pinged and a failure demotes the store;
    /// in fallback mode the remote is probed only if a probe is due.
    pub async fn ping(&self) -> BackendKind {
        let Some(remote) = self.active_remote().await else {
            return BackendKind::LocalFallback;
        };
        if remote.probed {
            return BackendKind::Remote;
        }

        match remote.backend.ping().await {
            Ok(()) => BackendKind::Remote,
            Err(err) => {
                self.demote("ping", &err).await;
                BackendKind::LocalFallback
            }
        }
    }

    // == Backend ==
    /// Returns the active backend without touching the network.
    pub async fn backend(&self) -> BackendKind {
        self.state.lock().await.mode
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let local_entries = self.local.len().await;
        let mut stats = self.state.lock().await.stats.clone();
        stats.set_local_entries(local_entries);
        stats
    }

    // == Sweep ==
    /// Physically drops expired local entries. Returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        self.local.cleanup_expired().await
    }

    fn key_allowed(key: &str) -> bool {
        if key.len() > MAX_KEY_LENGTH {
            warn!(
                len = key.len(),
                "Cache key exceeds maximum length of {} bytes, ignoring", MAX_KEY_LENGTH
            );
            return false;
        }
        true
    }

    async fn is_pending_delete(&self, key: &str) -> bool {
        self.state.lock().await.pending_deletes.contains(key)
    }

    /// Returns the remote backend if it should serve this call, probing it
    /// when the store is in fallback mode and the reconnect interval elapsed.
    async fn active_remote(&self) -> Option<ActiveRemote<'_>> {
        let remote = self.remote.as_ref()?;

        {
            let mut state = self.state.lock().await;
            if state.mode == BackendKind::Remote {
                return Some(ActiveRemote {
                    backend: remote,
                    probed: false,
                });
            }
            let due = state
                .last_probe
                .map_or(true, |at| at.elapsed() >= self.reconnect_interval);
            if !due {
                return None;
            }
            state.last_probe = Some(Instant::now());
        }

        if let Err(err) = remote.ping().await {
            debug!(error = %err, "Remote cache still unreachable");
            return None;
        }
        if let Err(err) = self.replay_deletes(remote).await {
            warn!(error = %err, "Replaying deletes failed, staying on local fallback");
            return None;
        }

        let mut state = self.state.lock().await;
        if state.mode == BackendKind::LocalFallback {
            state.mode = BackendKind::Remote;
            state.stats.record_promotion();
            info!("Remote cache reachable again, leaving local fallback");
        }
        Some(ActiveRemote {
            backend: remote,
            probed: true,
        })
    }

    /// Applies deletes recorded during the outage to the remote. Keys not
    /// yet applied stay pending when a call fails.
    async fn replay_deletes(&self, remote: &Arc<dyn CacheBackend>) -> Result<(), CacheError> {
        let pending: Vec<String> = self
            .state
            .lock()
            .await
            .pending_deletes
            .iter()
            .cloned()
            .collect();

        for key in pending {
            remote.delete(&key).await?;
            self.state.lock().await.pending_deletes.remove(&key);
        }
        Ok(())
    }

    async fn demote(&self, op: &str, err: &CacheError) {
        let mut state = self.state.lock().await;
        state.stats.record_remote_error();
        if state.mode == BackendKind::Remote {
            state.mode = BackendKind::LocalFallback;
            state.last_probe = Some(Instant::now());
            state.stats.record_demotion();
            warn!(op, error = %err, "Remote cache failed, switching to local fallback");
        }
    }
}
