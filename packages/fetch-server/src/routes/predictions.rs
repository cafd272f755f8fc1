use std::sync::Arc;

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use fetch_core::change_predictor::{ChangePattern, Prediction, Urgency};

use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DomainUrlQuery {
    pub domain: String,
    pub url_pattern: String,
}

fn key(q: &DomainUrlQuery) -> (String, String) {
    (q.domain.clone(), q.url_pattern.clone())
}

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    pub domain: Option<String>,
    pub min_urgency: Option<u8>,
}

/// `GET /v1/predictions[?domain=&minUrgency=]` — filtered listing; an absent
/// filter matches everything.
pub async fn list(State(state): State<Arc<AppState>>, Extension(_user): Extension<AuthUser>, Query(q): Query<ListQuery>) -> Json<Vec<ChangePattern>> {
    let now = chrono::Utc::now();
    let patterns = state.change_patterns.read().unwrap();
    let filtered = patterns
        .values()
        .filter(|p| q.domain.as_deref().map(|d| p.domain == d).unwrap_or(true))
        .filter(|p| q.min_urgency.map(|min| p.urgency(now) as u8 >= min).unwrap_or(true))
        .cloned()
        .collect();
    Json(filtered)
}

/// `GET /v1/predictions/urgency/{level}` — every pattern currently at or
/// above urgency `level` (0=Low .. 3=Critical), distinct from the
/// single-pattern `urgency` lookup below.
pub async fn list_by_urgency(State(state): State<Arc<AppState>>, Extension(_user): Extension<AuthUser>, Path(level): Path<u8>) -> Result<Json<Vec<ChangePattern>>, ApiError> {
    if level > Urgency::Critical as u8 {
        return Err(ApiError::BadRequest(format!("urgency level must be 0..3, got {level}")));
    }
    let now = chrono::Utc::now();
    let patterns = state.change_patterns.read().unwrap();
    let matching = patterns.values().filter(|p| p.urgency(now) as u8 >= level).cloned().collect();
    Ok(Json(matching))
}

pub async fn get(State(state): State<Arc<AppState>>, Extension(_user): Extension<AuthUser>, Query(q): Query<DomainUrlQuery>) -> Result<Json<ChangePattern>, ApiError> {
    let patterns = state.change_patterns.read().unwrap();
    patterns
        .get(&key(&q))
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::BadRequest(format!("no pattern observed for {}{}", q.domain, q.url_pattern)))
}

#[derive(Debug, Serialize)]
pub struct AccuracyResponse {
    pub hits: u32,
    pub misses: u32,
    pub success_rate: f32,
}

pub async fn accuracy(State(state): State<Arc<AppState>>, Extension(_user): Extension<AuthUser>, Query(q): Query<DomainUrlQuery>) -> Result<Json<AccuracyResponse>, ApiError> {
    let patterns = state.change_patterns.read().unwrap();
    let pattern = patterns
        .get(&key(&q))
        .ok_or_else(|| ApiError::BadRequest(format!("no pattern observed for {}{}", q.domain, q.url_pattern)))?;
    Ok(Json(AccuracyResponse {
        hits: pattern.accuracy.hits,
        misses: pattern.accuracy.misses,
        success_rate: pattern.accuracy.success_rate(),
    }))
}

#[derive(Debug, Serialize)]
pub struct UrgencyResponse {
    pub urgency: Urgency,
    pub prediction: Option<Prediction>,
}

pub async fn urgency(State(state): State<Arc<AppState>>, Extension(_user): Extension<AuthUser>, Query(q): Query<DomainUrlQuery>) -> Result<Json<UrgencyResponse>, ApiError> {
    let patterns = state.change_patterns.read().unwrap();
    let pattern = patterns
        .get(&key(&q))
        .ok_or_else(|| ApiError::BadRequest(format!("no pattern observed for {}{}", q.domain, q.url_pattern)))?;
    Ok(Json(UrgencyResponse { urgency: pattern.urgency(chrono::Utc::now()), prediction: pattern.last_prediction.clone() }))
}

#[derive(Debug, Deserialize)]
pub struct ObserveRequest {
    pub domain: String,
    pub url_pattern: String,
    pub content_hash: String,
    pub changed: bool,
}

pub async fn observe(State(state): State<Arc<AppState>>, Extension(_user): Extension<AuthUser>, Json(req): Json<ObserveRequest>) -> Json<serde_json::Value> {
    let mut patterns = state.change_patterns.write().unwrap();
    let pattern = patterns
        .entry((req.domain.clone(), req.url_pattern.clone()))
        .or_insert_with(|| ChangePattern::new(req.domain.clone(), req.url_pattern.clone()));
    pattern.observe(fetch_core::change_predictor::Observation {
        timestamp: chrono::Utc::now(),
        content_hash: fetch_core::ids::ContentHash(req.content_hash),
        changed: req.changed,
    });
    Json(serde_json::json!({"ok": true}))
}
