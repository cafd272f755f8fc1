//! Workflow / Workflow Step data model (spec §3 Data Model).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{TenantId, WorkflowId};
use crate::renderer::Tier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    Navigate,
    Click,
    Fill,
    Select,
    Scroll,
    Wait,
    Extract,
    DismissBanner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Critical,
    Important,
    Optional,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub step_number: u32,
    pub action: StepAction,
    pub url: Option<String>,
    pub selector: Option<String>,
    pub value: Option<String>,
    pub annotation: Option<String>,
    pub importance: Importance,
    pub duration: std::time::Duration,
    pub tier: Option<Tier>,
    pub success: bool,
    pub extracted_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Recording,
    Saved,
    Discarded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    pub description: Option<String>,
    pub domain: String,
    pub tags: Vec<String>,
    pub tenant_id: TenantId,
    pub steps: Vec<WorkflowStep>,
    pub usage_count: u32,
    pub success_rate: f32,
    pub version: u32,
    pub status: WorkflowStatus,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(tenant_id: TenantId, name: impl Into<String>, domain: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowId::new(),
            name: name.into(),
            description: None,
            domain: domain.into(),
            tags: vec![],
            tenant_id,
            steps: vec![],
            usage_count: 0,
            success_rate: 0.0,
            version: 1,
            status: WorkflowStatus::Recording,
            started_at: now,
            updated_at: now,
        }
    }

    /// Exponential moving average update (spec §4.6, alpha=0.2).
    pub fn record_replay_outcome(&mut self, overall_success: bool, alpha: f32) {
        self.usage_count += 1;
        let observed = if overall_success { 1.0 } else { 0.0 };
        self.success_rate += (observed - self.success_rate) * alpha;
        self.updated_at = Utc::now();
    }
}
