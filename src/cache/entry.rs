//! Cache Entry Module
//!
//! Defines individual cache entries with TTL support, plus the byte envelope
//! used to carry an entry's expiry through the remote backend.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::CacheError;

/// Envelope header: created_at (u64 BE) followed by expires_at (u64 BE).
const ENVELOPE_HEADER_LEN: usize = 16;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The stored value
    pub value: Vec<u8>,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry that expires `ttl` from now.
    pub fn new(value: Vec<u8>, ttl: Duration) -> Self {
        let now = current_timestamp_ms();
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);

        Self {
            value,
            created_at: now,
            expires_at: now.saturating_add(ttl_ms),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches `expires_at`, so a
    /// zero TTL produces an entry that is never readable.
    pub fn is_expired(&self) -> bool {
        current_timestamp_ms() >= self.expires_at
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, `0` once expired.
    pub fn ttl_remaining_ms(&self) -> u64 {
        self.expires_at.saturating_sub(current_timestamp_ms())
    }

    // == Envelope ==
    /// Serializes the entry for a backend that does not understand our expiry.
    pub fn to_envelope(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ENVELOPE_HEADER_LEN + self.value.len());
        bytes.extend_from_slice(&self.created_at.to_be_bytes());
        bytes.extend_from_slice(&self.expires_at.to_be_bytes());
        bytes.extend_from_slice(&self.value);
        bytes
    }

    /// Parses bytes produced by [`CacheEntry::to_envelope`].
    pub fn from_envelope(bytes: &[u8]) -> Result<Self, CacheError> {
        if bytes.len() < ENVELOPE_HEADER_LEN {
            return Err(CacheError::Codec(format!(
                "envelope is {} bytes, header needs {}",
                bytes.len(),
                ENVELOPE_HEADER_LEN
            )));
        }

        let (created, rest) = bytes.split_at(8);
        let (expires, value) = rest.split_at(8);

        Ok(Self {
            value: value.to_vec(),
            created_at: read_u64(created),
            expires_at: read_u64(expires),
        })
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_be_bytes(buf)
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
