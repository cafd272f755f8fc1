use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Extension, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use fetch_core::change_predictor::ChangePattern;
use fetch_core::executor::{Executor, ExecutorDeps, FetchResult};
use fetch_core::planner::{Plan, PlanConstraints, Planner};
use fetch_core::renderer::{SessionBlob, Tier};
use fetch_core::verifier::{self, Check, Severity};

use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct FetchOptions {
    pub content_type: Option<String>,
    pub max_chars: Option<usize>,
    #[serde(default)]
    pub scroll_to_load: bool,
    pub max_latency_ms: Option<u64>,
    pub max_cost_tier: Option<Tier>,
    /// When `true`, a failed verification check propagates as a 422
    /// `ValidationFailed` error. When absent/`false` (the default), verification
    /// still runs and is reported on the response, but never fails the fetch —
    /// checks are downgraded to warning severity before reaching the executor.
    pub verify: Option<bool>,
    pub include_decision_trace: Option<bool>,
    pub include_network_requests: Option<bool>,
    pub force_render_tier: Option<Tier>,
    #[serde(default)]
    pub checks: Vec<Check>,
    pub preset_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BrowseRequest {
    pub url: String,
    #[serde(default)]
    pub options: FetchOptions,
    #[serde(default)]
    pub session: Option<SessionBlob>,
}

#[derive(Debug, Serialize)]
pub struct BrowseResponse {
    #[serde(flatten)]
    pub result: FetchResult,
}

fn constraints_from(options: &FetchOptions) -> PlanConstraints {
    PlanConstraints {
        max_latency: options.max_latency_ms.map(Duration::from_millis),
        max_cost_tier: options.max_cost_tier,
    }
}

/// Resolves the caller's inline `checks` plus any `presetId` into the final
/// check list, then — unless `verify` was requested strict — downgrades every
/// severity to `Warning` so a failed check is reported but never fails the
/// fetch (spec §7: `ValidationFailed` is "200 ... or 422 when caller required
/// strict verification").
fn resolve_checks(options: &FetchOptions) -> Result<Vec<Check>, ApiError> {
    let mut checks = options.checks.clone();
    if let Some(id) = &options.preset_id {
        let preset = verifier::preset(id).ok_or_else(|| ApiError::BadRequest(format!("unknown verification preset '{id}'")))?;
        checks.extend(preset);
    }
    if !options.verify.unwrap_or(false) {
        for check in &mut checks {
            check.severity = Severity::Warning;
        }
    }
    Ok(checks)
}

fn truncate(content: &mut FetchResult, max_chars: usize, content_type: Option<&str>) {
    let truncate_field = |s: &mut String| {
        if s.chars().count() > max_chars {
            *s = s.chars().take(max_chars).collect();
        }
    };
    match content_type {
        Some("html") => {
            if let Some(html) = &mut content.content.html {
                truncate_field(html);
            }
        }
        Some("text") => truncate_field(&mut content.content.text),
        _ => {
            truncate_field(&mut content.content.markdown);
            truncate_field(&mut content.content.text);
            if let Some(html) = &mut content.content.html {
                truncate_field(html);
            }
        }
    }
}

pub(crate) async fn run_fetch(state: &AppState, tenant: &fetch_core::ids::TenantId, req: &BrowseRequest) -> Result<FetchResult, ApiError> {
    let url = url::Url::parse(&req.url).map_err(|e| ApiError::from(fetch_core::FetchError::InvalidUrl(e.to_string())))?;
    let constraints = constraints_from(&req.options);
    let checks = resolve_checks(&req.options)?;

    let planner = Planner::new(&state.pattern_store, &state.config.core);
    let mut plan: Plan = planner.plan(tenant, &url, &constraints, false).await?;
    if let Some(tier) = req.options.force_render_tier {
        plan.tier_sequence = vec![tier];
    }

    // Snapshot-and-writeback rather than holding the map's lock across the
    // `.execute` await: the lock only needs to protect this (domain,
    // url-pattern) key's entry, not every concurrent fetch in the process.
    let domain = url.host_str().unwrap_or_default().to_string();
    let url_pattern = url.path().to_string();
    let key = (domain.clone(), url_pattern.clone());
    let mut change_pattern = state
        .change_patterns
        .read()
        .unwrap()
        .get(&key)
        .cloned()
        .unwrap_or_else(|| ChangePattern::new(domain, url_pattern));
    let last_content_hash = change_pattern.last_content_hash().cloned();

    let executor = Executor::new(ExecutorDeps { store: &state.pattern_store, renderer: state.renderer.as_ref(), cfg: &state.config.core });
    let result = executor
        .execute(
            tenant,
            &url,
            plan,
            req.session.clone(),
            &checks,
            req.options.scroll_to_load,
            Some(&mut change_pattern),
            last_content_hash.as_ref(),
        )
        .await;
    state.change_patterns.write().unwrap().insert(key, change_pattern);

    match result {
        Ok(result) => {
            state.stats.record_success(&result);
            Ok(result)
        }
        Err(err) => {
            state.stats.record_failure(None, Duration::ZERO);
            Err(err.into())
        }
    }
}

/// Applies the response-shaping options common to both a single `/v1/browse`
/// call and each item of a `/v1/batch` call.
pub(crate) fn apply_response_options(result: &mut FetchResult, options: &FetchOptions) {
    if !options.include_decision_trace.unwrap_or(false) {
        result.decision_trace = Default::default();
    }
    if !options.include_network_requests.unwrap_or(false) {
        result.network_log = vec![];
    }
    if let Some(max_chars) = options.max_chars {
        truncate(result, max_chars, options.content_type.as_deref());
    }
}

pub async fn browse(State(state): State<Arc<AppState>>, Extension(user): Extension<AuthUser>, Json(req): Json<BrowseRequest>) -> Result<Json<BrowseResponse>, ApiError> {
    let mut result = run_fetch(&state, &user.tenant, &req).await?;
    apply_response_options(&mut result, &req.options);
    Ok(Json(BrowseResponse { result }))
}

pub async fn fetch(state: State<Arc<AppState>>, user: Extension<AuthUser>, req: Json<BrowseRequest>) -> Result<Json<BrowseResponse>, ApiError> {
    browse(state, user, req).await
}
