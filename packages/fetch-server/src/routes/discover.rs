use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use fetch_core::discovery::{DiscoveryOrchestrator, DiscoveryResult};

use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FuzzRequest {
    pub domain: String,
}

#[derive(Debug, Serialize)]
pub struct FuzzResponse {
    pub discovered: Vec<DiscoveryResult>,
    pub found_count: usize,
}

pub async fn fuzz(State(state): State<Arc<AppState>>, Extension(user): Extension<AuthUser>, Json(req): Json<FuzzRequest>) -> Result<Json<FuzzResponse>, ApiError> {
    let orchestrator = DiscoveryOrchestrator::new(&state.discovery_cache, &state.pattern_store, &state.probe_client);
    let discovered = orchestrator.discover(&user.tenant, &req.domain).await;
    let found_count = discovered.iter().filter(|r| r.found).count();
    Ok(Json(FuzzResponse { discovered, found_count }))
}
