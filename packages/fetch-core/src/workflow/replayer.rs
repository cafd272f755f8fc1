//! Workflow Replayer (spec §4.6): re-runs a saved workflow's steps,
//! substituting `{{var}}` tokens into each step's URL before invoking the
//! fetch core.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use super::model::{StepAction, Workflow};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarValue {
    String(String),
    Number(f64),
    Boolean(bool),
}

impl std::fmt::Display for VarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VarValue::String(s) => write!(f, "{s}"),
            VarValue::Number(n) => write!(f, "{n}"),
            VarValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

fn token_re() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").unwrap())
}

/// Substitutes every `{{name}}` token in `template` using `vars`. Returns an
/// error naming the first missing variable, matching the spec's "missing
/// variable = error" rule.
pub fn substitute(template: &str, vars: &HashMap<String, VarValue>) -> Result<String> {
    let mut error = None;
    let substituted = token_re().replace_all(template, |caps: &regex::Captures| {
        let name = &caps[1];
        match vars.get(name) {
            Some(value) => value.to_string(),
            None => {
                error = Some(name.to_string());
                String::new()
            }
        }
    });
    match error {
        Some(name) => Err(anyhow!("missing workflow variable '{name}'")),
        None => Ok(substituted.into_owned()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step_number: u32,
    pub success: bool,
    pub duration: Duration,
    pub tier: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayResult {
    pub workflow_id: crate::ids::WorkflowId,
    pub executed_at: chrono::DateTime<chrono::Utc>,
    pub results: Vec<StepOutcome>,
    pub overall_success: bool,
    pub total_duration: Duration,
}

/// The fetch-core entry point the Replayer drives per navigate step. Kept
/// as a trait so tests can supply a stub instead of a full Executor.
#[async_trait::async_trait]
pub trait BrowseInvoker: Send + Sync {
    async fn browse(&self, url: &str) -> Result<(bool, Duration, Option<String>)>;
}

pub struct Replayer<'a> {
    pub invoker: &'a dyn BrowseInvoker,
}

impl<'a> Replayer<'a> {
    pub fn new(invoker: &'a dyn BrowseInvoker) -> Self {
        Self { invoker }
    }

    pub async fn replay(&self, workflow: &mut Workflow, vars: &HashMap<String, VarValue>, ema_alpha: f32) -> Result<ReplayResult> {
        let overall_start = Instant::now();
        let mut results = Vec::new();

        for step in &workflow.steps {
            if step.action != StepAction::Navigate {
                results.push(StepOutcome { step_number: step.step_number, success: true, duration: Duration::ZERO, tier: None, error: None });
                continue;
            }
            let Some(template) = &step.url else {
                results.push(StepOutcome {
                    step_number: step.step_number,
                    success: false,
                    duration: Duration::ZERO,
                    tier: None,
                    error: Some("navigate step missing url".to_string()),
                });
                continue;
            };

            let url = match substitute(template, vars) {
                Ok(u) => u,
                Err(e) => {
                    results.push(StepOutcome { step_number: step.step_number, success: false, duration: Duration::ZERO, tier: None, error: Some(e.to_string()) });
                    continue;
                }
            };

            match self.invoker.browse(&url).await {
                Ok((success, duration, tier)) => {
                    results.push(StepOutcome { step_number: step.step_number, success, duration, tier, error: None });
                }
                Err(e) => {
                    results.push(StepOutcome { step_number: step.step_number, success: false, duration: Duration::ZERO, tier: None, error: Some(e.to_string()) });
                }
            }
        }

        let overall_success = results.iter().all(|r| r.success);
        workflow.record_replay_outcome(overall_success, ema_alpha);

        Ok(ReplayResult {
            workflow_id: workflow.id,
            executed_at: chrono::Utc::now(),
            results,
            overall_success,
            total_duration: overall_start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TenantId;
    use crate::workflow::model::{Importance, Workflow, WorkflowStep};

    struct StubInvoker {
        succeed: bool,
    }

    #[async_trait::async_trait]
    impl BrowseInvoker for StubInvoker {
        async fn browse(&self, _url: &str) -> Result<(bool, Duration, Option<String>)> {
            Ok((self.succeed, Duration::from_millis(10), Some("Intelligence".to_string())))
        }
    }

    #[test]
    fn substitute_replaces_known_tokens() {
        let mut vars = HashMap::new();
        vars.insert("id".to_string(), VarValue::Number(42.0));
        let out = substitute("https://example.com/users/{{id}}", &vars).unwrap();
        assert_eq!(out, "https://example.com/users/42");
    }

    #[test]
    fn substitute_errors_on_missing_variable() {
        let vars = HashMap::new();
        let err = substitute("https://example.com/users/{{id}}", &vars).unwrap_err();
        assert!(err.to_string().contains("id"));
    }

    #[tokio::test]
    async fn replay_updates_usage_and_success_rate() {
        let mut workflow = Workflow::new(TenantId::new("t1"), "flow", "example.com");
        workflow.steps.push(WorkflowStep {
            step_number: 1,
            action: StepAction::Navigate,
            url: Some("https://example.com/users/{{id}}".to_string()),
            selector: None,
            value: None,
            annotation: None,
            importance: Importance::Critical,
            duration: Duration::ZERO,
            tier: None,
            success: false,
            extracted_data: None,
        });

        let invoker = StubInvoker { succeed: true };
        let replayer = Replayer::new(&invoker);
        let mut vars = HashMap::new();
        vars.insert("id".to_string(), VarValue::Number(1.0));

        let result = replayer.replay(&mut workflow, &vars, 0.2).await.unwrap();
        assert!(result.overall_success);
        assert_eq!(workflow.usage_count, 1);
        assert!(workflow.success_rate > 0.0);
    }
}
