use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use fetch_core::{DecisionTrace, ExecutorError, FetchError};

/// Wraps a `fetch_core::FetchError` for the HTTP edge, mapping each machine
/// code to the status the spec's §7 table names. Also used for request
/// validation failures the core never sees (bad JSON, missing bearer token).
pub enum ApiError {
    Fetch(FetchError, Option<DecisionTrace>),
    Unauthorized,
    RateLimited { retry_after_secs: u64 },
    BadRequest(String),
}

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        ApiError::Fetch(e, None)
    }
}

impl From<ExecutorError> for ApiError {
    fn from(e: ExecutorError) -> Self {
        ApiError::Fetch(e.error, Some(e.trace))
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Fetch(e, _) => write!(f, "{e}"),
            ApiError::Unauthorized => write!(f, "unauthorized"),
            ApiError::RateLimited { .. } => write!(f, "rate limited"),
            ApiError::BadRequest(msg) => write!(f, "{msg}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, Json(json!({"error": {"code": "unauthorized"}}))).into_response()
            }
            ApiError::RateLimited { retry_after_secs } => {
                let mut resp = (StatusCode::TOO_MANY_REQUESTS, Json(json!({"error": {"code": "rate_limited"}}))).into_response();
                resp.headers_mut().insert("Retry-After", retry_after_secs.into());
                resp
            }
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({"error": {"code": "bad_request", "message": msg}}))).into_response()
            }
            ApiError::Fetch(err, trace) => {
                let status = match &err {
                    FetchError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
                    FetchError::NoViableTier => StatusCode::UNPROCESSABLE_ENTITY,
                    FetchError::FetchTimeout => StatusCode::GATEWAY_TIMEOUT,
                    FetchError::RenderFailed { .. } => StatusCode::BAD_GATEWAY,
                    FetchError::ValidationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    FetchError::BotDetected => StatusCode::from_u16(451).unwrap(),
                    FetchError::UpstreamRateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
                };
                let mut body = json!({"error": {"code": err.code(), "message": err.to_string()}});
                if let Some(trace) = &trace {
                    body["decision_trace"] = serde_json::to_value(trace).unwrap_or(serde_json::Value::Null);
                }
                let mut resp = (status, Json(body)).into_response();
                if let FetchError::UpstreamRateLimited { retry_after_secs: Some(secs) } = &err {
                    resp.headers_mut().insert("Retry-After", (*secs).into());
                }
                resp
            }
        }
    }
}
