use axum::{extract::State, Json};
use tracing::debug;

use crate::models::api::{HistoryQuery, HistoryResponse};
use crate::models::SessionKey;
use crate::security::ResolvedTenant;
use crate::state::AppState;
use crate::utils::error::ApiError;
use crate::utils::extract::ApiQuery;

pub async fn history_handler(
    State(state): State<AppState>,
    ResolvedTenant(tenant): ResolvedTenant,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let key = SessionKey::new(tenant, query.session_id)?;
    let limit = query.limit.unwrap_or(state.default_history_limit);
    let offset = query.offset.unwrap_or(0);

    let messages = state.chat_service.history(&key, limit, offset).await?;
    debug!(key = %key, limit, offset, returned = messages.len(), "History read");

    Ok(Json(HistoryResponse { messages }))
}
