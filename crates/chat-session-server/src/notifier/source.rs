use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::NotifierError;
use crate::store::MemoryBackend;

/// Where expiry events come from. Each `subscribe` opens a fresh transport.
#[async_trait]
pub trait ExpiryEventSource: Send + Sync {
    async fn subscribe(&self) -> Result<Box<dyn ExpirySubscription>, NotifierError>;
}

/// A live subscription to expired-key events.
#[async_trait]
pub trait ExpirySubscription: Send {
    /// Next expired key. `None` means the transport closed.
    async fn next_expired(&mut self) -> Option<Result<String, NotifierError>>;

    /// Unsubscribe and release the connection.
    async fn close(&mut self);
}

// ===== Redis keyspace notifications =====

/// Redis `__keyevent@{db}__:expired` subscriber.
pub struct RedisExpirySource {
    client: redis::Client,
    channel: String,
    configure_keyspace_events: bool,
}

impl RedisExpirySource {
    pub fn new(
        url: &str,
        channel: String,
        configure_keyspace_events: bool,
    ) -> Result<Self, NotifierError> {
        let client =
            redis::Client::open(url).map_err(|e| NotifierError::Config(e.to_string()))?;
        Ok(Self {
            client,
            channel,
            configure_keyspace_events,
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

#[async_trait]
impl ExpiryEventSource for RedisExpirySource {
    async fn subscribe(&self) -> Result<Box<dyn ExpirySubscription>, NotifierError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        if self.configure_keyspace_events {
            // E = keyevent channel, x = expired events
            let _: () = redis::cmd("CONFIG")
                .arg("SET")
                .arg("notify-keyspace-events")
                .arg("Ex")
                .query_async(&mut conn)
                .await?;
            debug!("Enabled notify-keyspace-events Ex");
        }
        drop(conn);

        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(self.channel.as_str()).await?;
        info!(channel = %self.channel, "Listening for expired keys");

        Ok(Box::new(RedisSubscription {
            pubsub,
            channel: self.channel.clone(),
        }))
    }
}

struct RedisSubscription {
    pubsub: redis::aio::PubSub,
    channel: String,
}

#[async_trait]
impl ExpirySubscription for RedisSubscription {
    async fn next_expired(&mut self) -> Option<Result<String, NotifierError>> {
        let mut messages = std::pin::pin!(self.pubsub.on_message());
        loop {
            let msg = messages.next().await?;
            match msg.get_payload::<String>() {
                Ok(key) => return Some(Ok(key)),
                Err(e) => warn!(error = %e, "Skipping undecodable expiry payload"),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.pubsub.unsubscribe(self.channel.as_str()).await {
            warn!(channel = %self.channel, error = %e, "Unsubscribe failed");
        }
    }
}

// ===== In-process backend =====

/// Expiry events published by a [`MemoryBackend`] in the same process.
pub struct MemoryExpirySource {
    backend: Arc<MemoryBackend>,
}

impl MemoryExpirySource {
    pub fn new(backend: Arc<MemoryBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ExpiryEventSource for MemoryExpirySource {
    async fn subscribe(&self) -> Result<Box<dyn ExpirySubscription>, NotifierError> {
        Ok(Box::new(MemorySubscription {
            rx: self.backend.subscribe_expired(),
        }))
    }
}

struct MemorySubscription {
    rx: broadcast::Receiver<String>,
}

#[async_trait]
impl ExpirySubscription for MemorySubscription {
    async fn next_expired(&mut self) -> Option<Result<String, NotifierError>> {
        loop {
            match self.rx.recv().await {
                Ok(key) => return Some(Ok(key)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Expiry events dropped, subscriber lagging");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    async fn close(&mut self) {}
}
