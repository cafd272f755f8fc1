use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::{enforce_rate_limit, require_bearer};
use crate::routes::{batch, browse, discover, domains, predictions, workflows};
use crate::state::AppState;

pub fn build(state: Arc<AppState>) -> Router {
    // Margin over the core's own per-fetch budget (`Executor::execute`
    // already enforces `timeout_overall`); this layer only catches requests
    // that never reach the executor (queuing, connection stalls).
    let request_timeout = state.config.core.timeout_overall + Duration::from_secs(5);

    let protected = Router::new()
        .route("/v1/browse", post(browse::browse))
        .route("/v1/fetch", post(browse::fetch))
        .route("/v1/batch", post(batch::batch))
        .route("/v1/domains/:domain/intelligence", get(domains::intelligence))
        .route("/v1/discover/fuzz", post(discover::fuzz))
        .route("/v1/workflows/record/start", post(workflows::start_recording))
        .route("/v1/workflows/record/:id/step", post(workflows::record_step))
        .route("/v1/workflows/record/:id/annotate", post(workflows::annotate))
        .route("/v1/workflows/record/:id/stop", post(workflows::stop))
        .route("/v1/workflows", get(workflows::list))
        .route("/v1/workflows/:id", get(workflows::get))
        .route("/v1/workflows/:id", delete(workflows::delete))
        .route("/v1/workflows/:id/replay", post(workflows::replay))
        .route("/v1/predictions", get(predictions::list))
        .route("/v1/predictions/lookup", get(predictions::get))
        .route("/v1/predictions/accuracy", get(predictions::accuracy))
        .route("/v1/predictions/urgency", get(predictions::urgency))
        .route("/v1/predictions/urgency/:level", get(predictions::list_by_urgency))
        .route("/v1/predictions/observe", post(predictions::observe))
        .route_layer(middleware::from_fn_with_state(state.clone(), enforce_rate_limit))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    let health = Router::new().route("/healthz", get(|| async { "ok" }));

    Router::new()
        .merge(protected)
        .merge(health)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}
