use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{KeyValueBackend, StoreError};
use crate::models::{Message, Role, SessionKey};

/// Session history over a key-value backend with one store-wide TTL.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueBackend>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KeyValueBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.backend.ping().await
    }

    /// Load ordered history for a session.
    ///
    /// Absent or expired keys yield an empty history. A stored value that fails
    /// to decode is logged and also treated as empty; the next append replaces it.
    pub async fn load(&self, key: &SessionKey) -> Result<Vec<Message>, StoreError> {
        let redis_key = key.to_string();
        let Some(raw) = self.backend.get(&redis_key).await? else {
            debug!(key = %redis_key, "No stored history");
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<Message>>(&raw) {
            Ok(messages) => {
                debug!(key = %redis_key, count = messages.len(), "Loaded history");
                Ok(messages)
            }
            Err(e) => {
                warn!(
                    key = %redis_key,
                    error = %e,
                    "Stored history is corrupted, treating session as empty"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Append with the store-wide TTL.
    pub async fn append(
        &self,
        key: &SessionKey,
        new_messages: Vec<Message>,
    ) -> Result<(), StoreError> {
        self.append_with_ttl(key, new_messages, self.ttl).await
    }

    /// Append messages to the end of a session and reset its expiry to `now + ttl`.
    ///
    /// Not atomic: the current history is read, extended and written back whole.
    pub async fn append_with_ttl(
        &self,
        key: &SessionKey,
        new_messages: Vec<Message>,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        if new_messages.iter().any(|m| m.role() == Role::System) {
            return Err(StoreError::SystemMessage);
        }

        let mut history = self.load(key).await?;
        let appended = new_messages.len();
        history.extend(new_messages);

        let encoded = serde_json::to_string(&history)?;
        let redis_key = key.to_string();
        self.backend
            .set_with_ttl(&redis_key, &encoded, ttl)
            .await?;

        debug!(
            key = %redis_key,
            appended,
            total = history.len(),
            ttl_secs = ttl.as_secs(),
            "Appended to history"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TenantId;
    use crate::store::MemoryBackend;

    const TTL: Duration = Duration::from_secs(60);

    fn key(session: &str) -> SessionKey {
        SessionKey::new(TenantId::new("999999").unwrap(), session).unwrap()
    }

    fn store() -> (Arc<MemoryBackend>, SessionStore) {
        let backend = Arc::new(MemoryBackend::new(16));
        let store = SessionStore::new(backend.clone(), TTL);
        (backend, store)
    }

    #[tokio::test]
    async fn test_absent_key_is_empty_history() {
        let (_, store) = store();
        assert!(store.load(&key("missing")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_then_load_concatenates_in_order() {
        let (_, store) = store();
        let k = key("abc");

        store
            .append(&k, vec![Message::user("one"), Message::assistant("two")])
            .await
            .unwrap();
        store
            .append(&k, vec![Message::user("three"), Message::assistant("four")])
            .await
            .unwrap();

        let history = store.load(&k).await.unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content()).collect();
        assert_eq!(contents, vec!["one", "two", "three", "four"]);
    }

    #[tokio::test]
    async fn test_system_messages_are_rejected() {
        let (_, store) = store();
        let err = store
            .append(&key("abc"), vec![Message::system("rules")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SystemMessage));
        assert!(store.load(&key("abc")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupted_value_treated_as_empty_and_overwritten() {
        let (backend, store) = store();
        let k = key("broken");
        backend
            .set_with_ttl(&k.to_string(), "{not json", TTL)
            .await
            .unwrap();

        assert!(store.load(&k).await.unwrap().is_empty());

        store.append(&k, vec![Message::user("fresh")]).await.unwrap();
        assert_eq!(store.load(&k).await.unwrap(), vec![Message::user("fresh")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_append_resets_full_ttl() {
        let (_, store) = store();
        let k = key("abc");

        store.append(&k, vec![Message::user("a")]).await.unwrap();
        tokio::time::advance(Duration::from_secs(50)).await;

        // Refresh at t=50 moves the deadline to t=110.
        store.append(&k, vec![Message::assistant("b")]).await.unwrap();
        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(store.load(&k).await.unwrap().len(), 2);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.load(&k).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_append_with_explicit_ttl() {
        let (_, store) = store();
        let k = key("short");

        store
            .append_with_ttl(&k, vec![Message::user("a")], Duration::from_secs(5))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(store.load(&k).await.unwrap().len(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.load(&k).await.unwrap().is_empty());
    }
}
