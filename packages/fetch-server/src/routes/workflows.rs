use std::sync::Arc;

use axum::extract::{Extension, Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use fetch_core::ids::WorkflowId;
use fetch_core::workflow::{BrowseInvoker, Importance, ReplayResult, Replayer, VarValue, Workflow};

use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::routes::browse::{run_fetch, BrowseRequest, FetchOptions};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartRecordingRequest {
    pub name: String,
    pub domain: String,
}

#[derive(Debug, Serialize)]
pub struct StartRecordingResponse {
    pub workflow_id: WorkflowId,
}

pub async fn start_recording(State(state): State<Arc<AppState>>, Extension(user): Extension<AuthUser>, Json(req): Json<StartRecordingRequest>) -> Result<Json<StartRecordingResponse>, ApiError> {
    let workflow_id = state.recorder.start(user.tenant, req.name, req.domain);
    Ok(Json(StartRecordingResponse { workflow_id }))
}

#[derive(Debug, Deserialize)]
pub struct RecordStepRequest {
    pub url: String,
}

pub async fn record_step(State(state): State<Arc<AppState>>, Extension(user): Extension<AuthUser>, Path(id): Path<WorkflowId>, Json(req): Json<RecordStepRequest>) -> Result<Json<serde_json::Value>, ApiError> {
    let browse_req = BrowseRequest { url: req.url.clone(), options: FetchOptions::default(), session: None };
    let result = run_fetch(&state, &user.tenant, &browse_req).await?;
    state
        .recorder
        .record_step(id, &user.tenant, &req.url, &result)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(serde_json::json!({"ok": true})))
}

#[derive(Debug, Deserialize)]
pub struct AnnotateRequest {
    pub step_number: u32,
    pub annotation: String,
    pub importance: Importance,
}

pub async fn annotate(State(state): State<Arc<AppState>>, Extension(user): Extension<AuthUser>, Path(id): Path<WorkflowId>, Json(req): Json<AnnotateRequest>) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .recorder
        .annotate_step(id, &user.tenant, req.step_number, req.annotation, req.importance)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(serde_json::json!({"ok": true})))
}

#[derive(Debug, Deserialize)]
pub struct StopRequest {
    #[serde(default)]
    pub save: bool,
}

pub async fn stop(State(state): State<Arc<AppState>>, Extension(user): Extension<AuthUser>, Path(id): Path<WorkflowId>, Json(req): Json<StopRequest>) -> Result<Json<Option<Workflow>>, ApiError> {
    let stopped = state.recorder.stop(id, &user.tenant, req.save).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if let Some(workflow) = &stopped {
        state.saved_workflows.write().unwrap().insert(workflow.id, workflow.clone());
    }
    Ok(Json(stopped))
}

pub async fn list(State(state): State<Arc<AppState>>, Extension(user): Extension<AuthUser>) -> Json<Vec<Workflow>> {
    let workflows = state.saved_workflows.read().unwrap();
    Json(workflows.values().filter(|w| w.tenant_id == user.tenant).cloned().collect())
}

pub async fn get(State(state): State<Arc<AppState>>, Extension(user): Extension<AuthUser>, Path(id): Path<WorkflowId>) -> Result<Json<Workflow>, ApiError> {
    let workflows = state.saved_workflows.read().unwrap();
    workflows
        .get(&id)
        .filter(|w| w.tenant_id == user.tenant)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown workflow {id}")))
}

pub async fn delete(State(state): State<Arc<AppState>>, Extension(user): Extension<AuthUser>, Path(id): Path<WorkflowId>) -> Result<Json<serde_json::Value>, ApiError> {
    let mut workflows = state.saved_workflows.write().unwrap();
    match workflows.get(&id) {
        Some(w) if w.tenant_id == user.tenant => {
            workflows.remove(&id);
            Ok(Json(serde_json::json!({"ok": true})))
        }
        Some(_) => Err(ApiError::Unauthorized),
        None => Err(ApiError::BadRequest(format!("unknown workflow {id}"))),
    }
}

struct FetchBrowseInvoker<'a> {
    state: &'a AppState,
    tenant: &'a fetch_core::ids::TenantId,
}

#[async_trait::async_trait]
impl<'a> BrowseInvoker for FetchBrowseInvoker<'a> {
    async fn browse(&self, url: &str) -> anyhow::Result<(bool, std::time::Duration, Option<String>)> {
        let req = BrowseRequest { url: url.to_string(), options: FetchOptions::default(), session: None };
        match run_fetch(self.state, self.tenant, &req).await {
            Ok(result) => Ok((result.verification.passed, result.metadata.load_time, None)),
            Err(e) => Ok((false, std::time::Duration::ZERO, Some(e.to_string()))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReplayRequest {
    #[serde(default)]
    pub vars: std::collections::HashMap<String, VarValue>,
}

pub async fn replay(State(state): State<Arc<AppState>>, Extension(user): Extension<AuthUser>, Path(id): Path<WorkflowId>, Json(req): Json<ReplayRequest>) -> Result<Json<ReplayResult>, ApiError> {
    let mut workflow = {
        let workflows = state.saved_workflows.read().unwrap();
        workflows
            .get(&id)
            .filter(|w| w.tenant_id == user.tenant)
            .cloned()
            .ok_or_else(|| ApiError::BadRequest(format!("unknown workflow {id}")))?
    };

    let invoker = FetchBrowseInvoker { state: state.as_ref(), tenant: &user.tenant };
    let replayer = Replayer::new(&invoker);
    let result = replayer
        .replay(&mut workflow, &req.vars, state.config.core.workflow_success_ema_alpha)
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    state.saved_workflows.write().unwrap().insert(workflow.id, workflow);
    Ok(Json(result))
}
