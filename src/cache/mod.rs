//! Cache Module
//!
//! Tiered key/value caching with per-entry TTL: Redis when reachable, an
//! in-process map otherwise.

mod backend;
mod entry;
mod keys;
mod local;
mod remote;
mod stats;
mod store;


// Re-export public types
pub use backend::{BackendKind, CacheBackend};
pub use entry::CacheEntry;
pub use keys::{job_key, view_key};
pub use local::LocalBackend;
pub use remote::RedisBackend;
pub use stats::CacheStats;
pub use store::CacheStore;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
