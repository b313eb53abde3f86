//! Remote Backend Module
//!
//! Redis-backed cache storage. Every call is bounded by a timeout and any
//! failure drops the pooled connection so the next call reconnects.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

use crate::cache::{CacheBackend, CacheEntry};
use crate::error::CacheError;

// == Redis Backend ==
/// Cache backend talking to a Redis server.
///
/// Values are stored as [`CacheEntry`] envelopes so expiry is checked against
/// our own clock as well as Redis' `PX` expiry.
pub struct RedisBackend {
    client: redis::Client,
    prefix: String,
    timeout: Duration,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisBackend {
    // == Constructor ==
    /// Creates a backend for `url`. No connection is opened until first use.
    ///
    /// # Arguments
    /// * `url` - Redis connection URL, e.g. `redis://127.0.0.1:6379/`
    /// * `prefix` - Namespace prepended to every key (empty for none)
    /// * `timeout` - Upper bound for each round trip, connect included
    pub fn new(url: &str, prefix: &str, timeout: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            prefix: prefix.to_string(),
            timeout,
            conn: Mutex::new(None),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.prefix, key)
        }
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self.client.get_multiplexed_async_connection().await?;
        debug!("Opened Redis connection");
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, CacheError>>,
    {
        let result = match timeout(self.timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(self.timeout.as_millis() as u64)),
        };

        if result.is_err() {
            *self.conn.lock().await = None;
        }
        result
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let key = self.namespaced(key);
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);

        // Redis rejects a zero PX; an entry that is born expired is just a delete.
        if ttl_ms == 0 {
            return self
                .bounded(async {
                    let mut conn = self.connection().await?;
                    let _: () = conn.del(&key).await?;
                    Ok::<_, CacheError>(())
                })
                .await;
        }

        let envelope = CacheEntry::new(value, ttl).to_envelope();
        self.bounded(async {
            let mut conn = self.connection().await?;
            let _: () = conn.pset_ex(&key, envelope, ttl_ms).await?;
            Ok::<_, CacheError>(())
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let key = self.namespaced(key);
        let raw: Option<Vec<u8>> = self
            .bounded(async {
                let mut conn = self.connection().await?;
                let raw: Option<Vec<u8>> = conn.get(&key).await?;
                Ok::<_, CacheError>(raw)
            })
            .await?;

        match raw {
            Some(bytes) => {
                let entry = CacheEntry::from_envelope(&bytes)?;
                if entry.is_expired() {
                    Ok(None)
                } else {
                    Ok(Some(entry.value))
                }
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let key = self.namespaced(key);
        self.bounded(async {
            let mut conn = self.connection().await?;
            let _: () = conn.del(&key).await?;
            Ok::<_, CacheError>(())
        })
        .await
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.bounded(async {
            let mut conn = self.connection().await?;
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok::<_, CacheError>(())
        })
        .await
    }
}
