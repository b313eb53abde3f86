//! Cache Backend Module
//!
//! The capability shared by the remote and local cache implementations.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::CacheError;

// == Backend Kind ==
/// Which backend is currently serving cache traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    Remote,
    LocalFallback,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Remote => "remote",
            BackendKind::LocalFallback => "local-fallback",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Cache Backend ==
/// Key/value storage with per-entry TTL.
///
/// Implementations must be safe for concurrent use. A read past an entry's
/// expiry must return `Ok(None)` even if the entry is still physically stored.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value and TTL.
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Returns the live value for `key`, or `None` on a miss.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Removes `key` if present.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Verifies the backend can serve requests.
    async fn ping(&self) -> Result<(), CacheError>;
}
