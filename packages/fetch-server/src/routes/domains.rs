use std::sync::Arc;

use axum::extract::{Extension, Path, State};
use axum::Json;

use fetch_core::pattern::{DomainIntelligence, PatternStore};

use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub async fn intelligence(State(state): State<Arc<AppState>>, Extension(user): Extension<AuthUser>, Path(domain): Path<String>) -> Result<Json<DomainIntelligence>, ApiError> {
    let intel = state
        .pattern_store
        .domain_intelligence(&user.tenant, &domain)
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(intel))
}
