//! Bearer-token auth stand-in (spec §1 Non-goals: not a complete auth
//! system — "a thin named stand-in, bearer-prefix check only").

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

use fetch_core::ids::TenantId;

use crate::error::ApiError;
use crate::state::AppState;

/// Tenant identity derived from a validated bearer token, attached as a
/// request extension for handlers to read.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub tenant: TenantId,
    pub live: bool,
}

pub async fn require_bearer(State(_state): State<Arc<AppState>>, mut req: Request, next: Next) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    let token = header.strip_prefix("Bearer ").ok_or(ApiError::Unauthorized)?;
    let (env_prefix, rest) = token.split_once('_').ok_or(ApiError::Unauthorized)?;
    let live = match env_prefix {
        "live" => true,
        "test" => false,
        _ => return Err(ApiError::Unauthorized),
    };
    if rest.is_empty() {
        return Err(ApiError::Unauthorized);
    }
    let rest = rest.to_string();

    req.extensions_mut().insert(AuthUser { tenant: TenantId::new(rest), live });
    Ok(next.run(req).await)
}
