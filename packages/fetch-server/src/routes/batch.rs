use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::Json;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::routes::browse::{apply_response_options, run_fetch, BrowseRequest, BrowseResponse, FetchOptions};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub urls: Vec<String>,
    #[serde(default)]
    pub options: FetchOptions,
}

#[derive(Debug, Serialize)]
pub struct BatchItem {
    pub url: String,
    pub result: Option<BrowseResponse>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub results: Vec<BatchItem>,
    pub total_time_ms: u128,
}

pub async fn batch(State(state): State<Arc<AppState>>, Extension(user): Extension<AuthUser>, Json(req): Json<BatchRequest>) -> Result<Json<BatchResponse>, ApiError> {
    if req.urls.is_empty() {
        return Err(ApiError::BadRequest("urls must not be empty".to_string()));
    }

    let start = std::time::Instant::now();

    let futures = req.urls.iter().map(|url| {
        let one = BrowseRequest { url: url.clone(), options: req.options.clone(), session: None };
        let state = &state;
        let tenant = &user.tenant;
        async move {
            match run_fetch(state, tenant, &one).await {
                Ok(mut result) => {
                    apply_response_options(&mut result, &one.options);
                    BatchItem { url: one.url, result: Some(BrowseResponse { result }), error: None }
                }
                Err(e) => BatchItem { url: one.url, result: None, error: Some(e.to_string()) },
            }
        }
    });

    let results = join_all(futures).await;

    Ok(Json(BatchResponse { results, total_time_ms: start.elapsed().as_millis() }))
}
