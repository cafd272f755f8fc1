//! Workflow Recorder (spec §4.6): owns in-progress recording sessions. A
//! session is exclusively owned by the tenant that started it — the spec's
//! concurrency model (§5) rejects cross-tenant appends rather than allowing
//! them to race.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};

use crate::executor::FetchResult;
use crate::ids::{TenantId, WorkflowId};

use super::model::{Importance, StepAction, Workflow, WorkflowStatus, WorkflowStep};

pub struct Recorder {
    sessions: RwLock<HashMap<WorkflowId, Workflow>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self { sessions: RwLock::new(HashMap::new()) }
    }

    pub fn start(&self, tenant: TenantId, name: impl Into<String>, domain: impl Into<String>) -> WorkflowId {
        let workflow = Workflow::new(tenant, name, domain);
        let id = workflow.id;
        self.sessions.write().unwrap().insert(id, workflow);
        id
    }

    /// Appends a step derived from the most recent browse result. Rejects
    /// the append if `tenant` doesn't own the session (spec §5).
    pub fn record_step(&self, id: WorkflowId, tenant: &TenantId, url: &str, result: &FetchResult) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap();
        let workflow = sessions.get_mut(&id).ok_or_else(|| anyhow!("unknown recording {id}"))?;
        if &workflow.tenant_id != tenant {
            return Err(anyhow!("recording {id} is owned by a different tenant"));
        }
        if workflow.status != WorkflowStatus::Recording {
            return Err(anyhow!("recording {id} is not active"));
        }

        let step_number = workflow.steps.len() as u32 + 1;
        workflow.steps.push(WorkflowStep {
            step_number,
            action: StepAction::Navigate,
            url: Some(url.to_string()),
            selector: None,
            value: None,
            annotation: None,
            importance: Importance::Important,
            duration: result.metadata.load_time,
            tier: None,
            success: result.verification.passed,
            extracted_data: Some(serde_json::json!({
                "title": result.title,
                "markdown": result.content.markdown,
            })),
        });
        Ok(())
    }

    pub fn annotate_step(&self, id: WorkflowId, tenant: &TenantId, step_number: u32, annotation: String, importance: Importance) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap();
        let workflow = sessions.get_mut(&id).ok_or_else(|| anyhow!("unknown recording {id}"))?;
        if &workflow.tenant_id != tenant {
            return Err(anyhow!("recording {id} is owned by a different tenant"));
        }
        let step = workflow
            .steps
            .iter_mut()
            .find(|s| s.step_number == step_number)
            .ok_or_else(|| anyhow!("unknown step {step_number}"))?;
        step.annotation = Some(annotation);
        step.importance = importance;
        Ok(())
    }

    pub fn stop(&self, id: WorkflowId, tenant: &TenantId, save: bool) -> Result<Option<Workflow>> {
        let mut sessions = self.sessions.write().unwrap();
        let mut workflow = sessions.remove(&id).ok_or_else(|| anyhow!("unknown recording {id}"))?;
        if &workflow.tenant_id != tenant {
            sessions.insert(id, workflow);
            return Err(anyhow!("recording {id} is owned by a different tenant"));
        }
        workflow.status = if save { WorkflowStatus::Saved } else { WorkflowStatus::Discarded };
        Ok(if save { Some(workflow) } else { None })
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ContentResult, DecisionTrace, ResultMetadata, VerificationSummary};

    fn fake_result() -> FetchResult {
        FetchResult {
            final_url: "https://example.com".to_string(),
            title: Some("Example".to_string()),
            content: ContentResult { markdown: "# Example".to_string(), text: "Example".to_string(), html: None },
            tables: vec![],
            discovered_apis: vec![],
            verification: VerificationSummary { passed: true, errors: vec![], confidence: 1.0 },
            metadata: ResultMetadata { load_time: std::time::Duration::from_millis(100), tier: "Intelligence".to_string(), tiers_attempted: 1 },
            decision_trace: DecisionTrace::default(),
            network_log: vec![],
        }
    }

    #[test]
    fn cross_tenant_append_is_rejected() {
        let recorder = Recorder::new();
        let owner = TenantId::new("owner");
        let intruder = TenantId::new("intruder");
        let id = recorder.start(owner, "checkout flow", "example.com");

        let err = recorder.record_step(id, &intruder, "https://example.com", &fake_result()).unwrap_err();
        assert!(err.to_string().contains("different tenant"));
    }

    #[test]
    fn stop_with_save_returns_frozen_workflow() {
        let recorder = Recorder::new();
        let tenant = TenantId::new("t1");
        let id = recorder.start(tenant.clone(), "checkout flow", "example.com");
        recorder.record_step(id, &tenant, "https://example.com", &fake_result()).unwrap();

        let workflow = recorder.stop(id, &tenant, true).unwrap().unwrap();
        assert_eq!(workflow.steps.len(), 1);
        assert_eq!(workflow.status, WorkflowStatus::Saved);
    }
}
