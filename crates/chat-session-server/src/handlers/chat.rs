use axum::{extract::State, Json};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::models::api::{ChatRequest, ChatResponse};
use crate::models::SessionKey;
use crate::security::ResolvedTenant;
use crate::services::ChatService;
use crate::utils::error::ApiError;
use crate::utils::extract::ApiJson;

pub async fn chat_handler(
    State(chat_service): State<Arc<ChatService>>,
    ResolvedTenant(tenant): ResolvedTenant,
    ApiJson(request): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let start_time = Instant::now();

    if request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }
    let key = SessionKey::new(tenant, request.session_id)?;

    info!(
        key = %key,
        message_len = request.message.len(),
        "Chat request"
    );

    let reply = chat_service.chat_turn(&key, &request.message).await?;

    info!(
        key = %key,
        processing_time_ms = start_time.elapsed().as_millis() as u64,
        "Chat completed"
    );
    Ok(Json(ChatResponse { reply }))
}
