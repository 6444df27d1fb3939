pub mod chat;
pub mod health;
pub mod history;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/chat", post(chat::chat_handler))
        .route("/history", get(history::history_handler))
        .with_state(state)
        // CORS
        .layer(CorsLayer::permissive())
        // Tracing
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::api::{ChatResponse, HistoryResponse};
    use crate::models::{Message, TenantId};
    use crate::services::completion::MockCompletionProvider;
    use crate::services::ChatService;
    use crate::store::{MemoryBackend, SessionStore};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(mock: MockCompletionProvider) -> Router {
        let store = SessionStore::new(
            Arc::new(MemoryBackend::default()),
            Duration::from_secs(600),
        );
        let chat_service = Arc::new(ChatService::new(
            store,
            Arc::new(mock),
            "be kind".to_string(),
            Duration::from_secs(5),
        ));
        build_router(AppState {
            chat_service,
            default_tenant: TenantId::new("999999").unwrap(),
            default_history_limit: 20,
        })
    }

    fn chat_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_chat_then_history() {
        let mut mock = MockCompletionProvider::new();
        mock.expect_complete()
            .times(1)
            .returning(|_| Ok("hello back".to_string()));
        let app = app(mock);

        let response = app
            .clone()
            .oneshot(chat_request(r#"{"sessionId":"abc","message":"hi"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: ChatResponse = json(response).await;
        assert_eq!(body.reply, "hello back");

        let response = app
            .oneshot(get("/history?sessionId=abc"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: HistoryResponse = json(response).await;
        assert_eq!(
            body.messages,
            vec![Message::user("hi"), Message::assistant("hello back")]
        );
    }

    #[tokio::test]
    async fn test_history_unknown_session_is_empty() {
        let response = app(MockCompletionProvider::new())
            .oneshot(get("/history?sessionId=nobody&limit=5&offset=0"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: HistoryResponse = json(response).await;
        assert!(body.messages.is_empty());
    }

    #[tokio::test]
    async fn test_history_rejects_invalid_limit() {
        let response = app(MockCompletionProvider::new())
            .oneshot(get("/history?sessionId=abc&limit=0"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_rejects_empty_session() {
        let response = app(MockCompletionProvider::new())
            .oneshot(chat_request(r#"{"sessionId":"","message":"hi"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_query_uses_error_body() {
        let response = app(MockCompletionProvider::new())
            .oneshot(get("/history?sessionId=abc&limit=abc"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = json(response).await;
        assert_eq!(body["error"], "BadRequest");
        assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
    }

    #[tokio::test]
    async fn test_malformed_body_uses_error_body() {
        let app = app(MockCompletionProvider::new());

        for body in [r#"{"sessionId":"abc""#, r#"{"sessionId":"abc"}"#] {
            let response = app.clone().oneshot(chat_request(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
            let body: serde_json::Value = json(response).await;
            assert_eq!(body["error"], "BadRequest");
        }
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let app = app(MockCompletionProvider::new());
        let response = app.clone().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let response = app.oneshot(get("/health/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
