//! TTL-governed session history storage
//!
//! - `KeyValueBackend`: single-key get / set-with-expiry seam
//! - `RedisBackend`: production backend (`GET` / `SET EX`)
//! - `MemoryBackend`: in-process backend with expiry events, for local runs
//! - `SessionStore`: load / append over any backend
//!
//! Append is a plain read-modify-write of the whole history. Two concurrent
//! appends to one key race and the last full write wins; callers that need
//! every turn kept must serialize writes per session themselves.

mod memory;
mod redis_backend;
mod session_store;

pub use self::memory::MemoryBackend;
pub use self::redis_backend::RedisBackend;
pub use self::session_store::SessionStore;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Session store unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to encode history: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("System messages are not stored in session history")]
    SystemMessage,
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Atomic single-key operations the session store relies on.
#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    /// Returns `None` when the key is absent or already expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Replaces the value and sets its expiry to `now + ttl`.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
