use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{KeyValueBackend, StoreError};

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-process key-value backend with Redis-like expiry events.
///
/// Keys expire lazily on read and in bulk via [`MemoryBackend::sweep_expired`].
/// Each expiry publishes the key once on a broadcast channel; receivers that
/// are not subscribed at that moment never see it.
pub struct MemoryBackend {
    map: DashMap<String, Entry>,
    expired_tx: broadcast::Sender<String>,
}

impl MemoryBackend {
    pub fn new(event_capacity: usize) -> Self {
        let (expired_tx, _rx) = broadcast::channel(event_capacity.max(1));
        Self {
            map: DashMap::new(),
            expired_tx,
        }
    }

    /// Receiver for keys evicted from now on.
    pub fn subscribe_expired(&self) -> broadcast::Receiver<String> {
        self.expired_tx.subscribe()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Remove every expired entry and publish its key. Returns how many expired.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let candidates: Vec<String> = self
            .map
            .iter()
            .filter(|r| r.is_expired(now))
            .map(|r| r.key().clone())
            .collect();

        candidates
            .into_iter()
            .filter(|key| self.expire(key, now))
            .count()
    }

    /// Periodically sweep until shutdown is signalled.
    pub fn spawn_reaper(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let backend = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let count = backend.sweep_expired();
                        if count > 0 {
                            debug!(count, "Reaped expired sessions");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                if *shutdown.borrow() {
                    break;
                }
            }
            info!("Memory backend reaper stopped");
        })
    }

    fn expire(&self, key: &str, now: Instant) -> bool {
        let removed = self.map.remove_if(key, |_, e| e.is_expired(now)).is_some();
        if removed {
            // No receivers is fine: the event is simply gone.
            let _ = self.expired_tx.send(key.to_string());
        }
        removed
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl KeyValueBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let Some(entry) = self.map.get(key) else {
            return Ok(None);
        };
        if entry.is_expired(now) {
            drop(entry);
            self.expire(key, now);
            return Ok(None);
        }
        Ok(Some(entry.value.clone()))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        };
        self.map.insert(key.to_string(), entry);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
