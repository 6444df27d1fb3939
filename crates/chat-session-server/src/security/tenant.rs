use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::models::TenantId;
use crate::state::AppState;
use crate::utils::error::ApiError;

/// Tenant owning the current request, resolved once per request and passed
/// explicitly into session key construction.
///
/// A single tenant is configured for now; swap this extractor for one that
/// reads an authenticated identity when multi-tenancy arrives.
#[derive(Debug, Clone)]
pub struct ResolvedTenant(pub TenantId);

impl FromRequestParts<AppState> for ResolvedTenant {
    type Rejection = ApiError;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(state.default_tenant.clone()))
    }
}
