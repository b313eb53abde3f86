//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::jobs::JobPolicy;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Redis URL; local-only caching when unset
    pub redis_url: Option<String>,
    /// Namespace prepended to every Redis key
    pub redis_prefix: String,
    /// Per-call Redis timeout in milliseconds
    pub remote_timeout_ms: u64,
    /// Minimum seconds between attempts to reconnect to Redis
    pub reconnect_interval: u64,
    /// Retention of job records in seconds
    pub job_ttl: u64,
    /// Retention of phase results in seconds
    pub view_ttl: u64,
    /// Ceiling for a single phase in seconds
    pub phase_timeout: u64,
    /// Background maintenance interval in seconds
    pub cleanup_interval: u64,
    /// Directory holding `<dataset>.csv` files
    pub data_dir: PathBuf,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `REDIS_URL` - Redis connection URL (default: unset, local cache only)
    /// - `REDIS_PREFIX` - Redis key namespace (default: "analysis")
    /// - `REMOTE_TIMEOUT_MS` - Redis call timeout in ms (default: 250)
    /// - `RECONNECT_INTERVAL` - Seconds between Redis reconnect probes (default: 30)
    /// - `JOB_TTL` - Job record retention in seconds (default: 86400)
    /// - `VIEW_TTL` - Phase result retention in seconds (default: 86400)
    /// - `PHASE_TIMEOUT` - Per-phase time limit in seconds (default: 300)
    /// - `CLEANUP_INTERVAL` - Maintenance frequency in seconds (default: 60)
    /// - `DATA_DIR` - Dataset directory (default: "./data")
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            redis_url: env::var("REDIS_URL").ok().filter(|v| !v.trim().is_empty()),
            redis_prefix: env::var("REDIS_PREFIX").unwrap_or(defaults.redis_prefix),
            remote_timeout_ms: env_or("REMOTE_TIMEOUT_MS", defaults.remote_timeout_ms),
            reconnect_interval: env_or("RECONNECT_INTERVAL", defaults.reconnect_interval),
            job_ttl: env_or("JOB_TTL", defaults.job_ttl),
            view_ttl: env_or("VIEW_TTL", defaults.view_ttl),
            phase_timeout: env_or("PHASE_TIMEOUT", defaults.phase_timeout),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
        }
    }

    /// Job retention and timeouts derived from this configuration.
    pub fn job_policy(&self) -> JobPolicy {
        JobPolicy {
            job_ttl: Duration::from_secs(self.job_ttl),
            view_ttl: Duration::from_secs(self.view_ttl),
            phase_timeout: Duration::from_secs(self.phase_timeout),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            redis_url: None,
            redis_prefix: "analysis".to_string(),
            remote_timeout_ms: 250,
            reconnect_interval: 30,
            job_ttl: 86_400,
            view_ttl: 86_400,
            phase_timeout: 300,
            cleanup_interval: 60,
            data_dir: PathBuf::from("./data"),
        }
    }
}
