use axum::extract::FromRef;
use std::sync::Arc;

use crate::models::TenantId;
use crate::services::ChatService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ChatService>,
    /// Tenant applied to requests until identity resolution lives upstream.
    pub default_tenant: TenantId,
    pub default_history_limit: i64,
}

impl FromRef<AppState> for Arc<ChatService> {
    fn from_ref(state: &AppState) -> Self {
        state.chat_service.clone()
    }
}
