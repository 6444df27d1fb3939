use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use super::assembler::assemble;
use super::completion::{CompletionError, CompletionProvider};
use super::paginator::{window, WindowError};
use crate::models::{Message, SessionKey};
use crate::store::{SessionStore, StoreError};

#[derive(Error, Debug)]
pub enum ChatError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("Completion timed out after {0:?}")]
    CompletionTimeout(Duration),

    #[error(transparent)]
    Window(#[from] WindowError),
}

/// Request-path orchestration: load, assemble, complete, append.
pub struct ChatService {
    store: SessionStore,
    completion: Arc<dyn CompletionProvider>,
    system_prompt: String,
    completion_timeout: Duration,
}

impl ChatService {
    pub fn new(
        store: SessionStore,
        completion: Arc<dyn CompletionProvider>,
        system_prompt: String,
        completion_timeout: Duration,
    ) -> Self {
        Self {
            store,
            completion,
            system_prompt,
            completion_timeout,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Run one chat turn and persist `(user_input, reply)`.
    ///
    /// Nothing is appended when the completion fails or times out.
    pub async fn chat_turn(&self, key: &SessionKey, user_input: &str) -> Result<String, ChatError> {
        let history = self.store.load(key).await?;
        let payload = assemble(&self.system_prompt, &history, user_input);

        let reply = match tokio::time::timeout(
            self.completion_timeout,
            self.completion.complete(&payload),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!(key = %key, timeout = ?self.completion_timeout, "Completion timed out");
                return Err(ChatError::CompletionTimeout(self.completion_timeout));
            }
        };

        self.store
            .append(
                key,
                vec![Message::user(user_input), Message::assistant(reply.clone())],
            )
            .await?;

        info!(
            key = %key,
            history_len = history.len() + 2,
            reply_len = reply.len(),
            "Chat turn completed"
        );
        Ok(reply)
    }

    pub async fn history(
        &self,
        key: &SessionKey,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, ChatError> {
        // Reject bad paging before touching the store.
        window(&[], limit, offset)?;
        let history = self.store.load(key).await?;
        Ok(window(&history, limit, offset)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TenantId;
    use crate::services::completion::MockCompletionProvider;
    use crate::store::MemoryBackend;

    fn key() -> SessionKey {
        SessionKey::new(TenantId::new("999999").unwrap(), "abc").unwrap()
    }

    fn service(mock: MockCompletionProvider, timeout: Duration) -> ChatService {
        let store = SessionStore::new(
            Arc::new(MemoryBackend::default()),
            Duration::from_secs(600),
        );
        ChatService::new(store, Arc::new(mock), "be helpful".to_string(), timeout)
    }

    #[tokio::test]
    async fn test_turn_sends_assembled_payload_and_appends_pair() {
        let mut mock = MockCompletionProvider::new();
        mock.expect_complete()
            .withf(|messages: &[Message]| {
                messages == [Message::system("be helpful"), Message::user("hi")]
            })
            .times(1)
            .returning(|_| Ok("hey there".to_string()));

        let service = service(mock, Duration::from_secs(5));
        let reply = service.chat_turn(&key(), "hi").await.unwrap();
        assert_eq!(reply, "hey there");

        let history = service.history(&key(), 20, 0).await.unwrap();
        assert_eq!(
            history,
            vec![Message::user("hi"), Message::assistant("hey there")]
        );
    }

    #[tokio::test]
    async fn test_second_turn_includes_history() {
        let mut mock = MockCompletionProvider::new();
        mock.expect_complete()
            .times(2)
            .returning(|messages: &[Message]| Ok(format!("seen {}", messages.len())));

        let service = service(mock, Duration::from_secs(5));
        assert_eq!(service.chat_turn(&key(), "one").await.unwrap(), "seen 2");
        assert_eq!(service.chat_turn(&key(), "two").await.unwrap(), "seen 4");
        assert_eq!(service.store().load(&key()).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_failed_completion_persists_nothing() {
        let mut mock = MockCompletionProvider::new();
        mock.expect_complete()
            .returning(|_| Err(CompletionError::EmptyReply));

        let service = service(mock, Duration::from_secs(5));
        let err = service.chat_turn(&key(), "hi").await.unwrap_err();
        assert!(matches!(
            err,
            ChatError::Completion(CompletionError::EmptyReply)
        ));
        assert!(service.store().load(&key()).await.unwrap().is_empty());
    }

    struct SlowProvider;

    #[async_trait::async_trait]
    impl CompletionProvider for SlowProvider {
        async fn complete(&self, _messages: &[Message]) -> Result<String, CompletionError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_persists_nothing() {
        let store = SessionStore::new(
            Arc::new(MemoryBackend::default()),
            Duration::from_secs(600),
        );
        let service = ChatService::new(
            store,
            Arc::new(SlowProvider),
            "prompt".to_string(),
            Duration::from_secs(2),
        );

        let err = service.chat_turn(&key(), "hi").await.unwrap_err();
        assert!(matches!(err, ChatError::CompletionTimeout(d) if d == Duration::from_secs(2)));
        assert!(service.store().load(&key()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_rejects_bad_paging() {
        let service = service(MockCompletionProvider::new(), Duration::from_secs(5));
        let err = service.history(&key(), 0, 0).await.unwrap_err();
        assert!(matches!(err, ChatError::Window(WindowError::InvalidLimit(0))));
    }
}
