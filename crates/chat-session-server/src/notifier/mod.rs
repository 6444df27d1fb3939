//! Expiry notification pipeline
//!
//! Subscribes to the store's "expired key" event stream, keeps only keys in
//! the tenant's session namespace and hands each one to an [`ArchiveSink`].
//!
//! Delivery is at-most-once. The underlying pub/sub has no replay: keys that
//! expire while the subscriber is disconnected are never reported.

mod archive;
mod listener;
mod source;

pub use archive::{ArchiveError, ArchiveSink, LogArchiveSink, WebhookArchiveSink};
pub use listener::{ExpiryNotifier, NotifierState, ReconnectPolicy};
pub use source::{
    ExpiryEventSource, ExpirySubscription, MemoryExpirySource, RedisExpirySource,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("Notification transport error: {0}")]
    Transport(String),

    #[error("Invalid notifier configuration: {0}")]
    Config(String),

    #[error("Gave up after {attempts} consecutive failed subscribe attempts")]
    ReconnectExhausted { attempts: u32 },
}

impl From<redis::RedisError> for NotifierError {
    fn from(err: redis::RedisError) -> Self {
        NotifierError::Transport(err.to_string())
    }
}
