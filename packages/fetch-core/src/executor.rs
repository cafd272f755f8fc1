//! Executor (spec §4.2): runs a [`Plan`] to completion, producing a
//! [`FetchResult`] and a verbatim [`DecisionTrace`] even on failure.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::change_predictor::{ChangePattern, Observation};
use crate::config::Config;
use crate::error::FetchError;
use crate::ids::{ContentHash, TenantId};
use crate::pattern::{ApiPattern, PatternStore};
use crate::planner::Plan;
use crate::renderer::{RenderRequest, Renderer, SessionBlob, Tier};
use crate::verifier::{self, Check, CheckResult, ValidationOutcome};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierAttempt {
    pub tier: String,
    pub duration: Duration,
    pub success: bool,
    pub extraction_strategy: String,
    pub validation_details: Option<CheckResult>,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionTraceSummary {
    pub final_tier: Option<String>,
    pub tiers_attempted: usize,
    pub selectors_attempted: usize,
}

/// Full record of one fetch's state-machine walk (spec §3 Data Model:
/// Decision Trace). Returned verbatim even when the fetch fails.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionTrace {
    pub tier_attempts: Vec<TierAttempt>,
    pub summary: DecisionTraceSummary,
}

impl DecisionTrace {
    fn record(&mut self, attempt: TierAttempt) {
        self.summary.tiers_attempted += 1;
        if attempt.success {
            self.summary.final_tier = Some(attempt.tier.clone());
        }
        self.tier_attempts.push(attempt);
    }
}

/// A terminal [`FetchError`] paired with the [`DecisionTrace`] built before
/// it occurred. Spec §4.2/§7: "the trace is returned verbatim to callers
/// even on failure" — a bare `FetchError` has nowhere to carry it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorError {
    pub error: FetchError,
    pub trace: DecisionTrace,
}

impl std::fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for ExecutorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentResult {
    pub markdown: String,
    pub text: String,
    pub html: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub passed: bool,
    pub errors: Vec<String>,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub load_time: Duration,
    pub tier: String,
    pub tiers_attempted: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    pub final_url: String,
    pub title: Option<String>,
    pub content: ContentResult,
    pub tables: Vec<crate::renderer::TableData>,
    pub discovered_apis: Vec<ApiPattern>,
    pub verification: VerificationSummary,
    pub metadata: ResultMetadata,
    pub decision_trace: DecisionTrace,
    pub network_log: Vec<crate::renderer::CapturedRequest>,
}

pub struct ExecutorDeps<'a> {
    pub store: &'a dyn PatternStore,
    pub renderer: &'a dyn Renderer,
    pub cfg: &'a Config,
}

pub struct Executor<'a> {
    deps: ExecutorDeps<'a>,
}

impl<'a> Executor<'a> {
    pub fn new(deps: ExecutorDeps<'a>) -> Self {
        Self { deps }
    }

    /// Runs the plan to completion, bounded by the configured overall
    /// wall-clock budget (spec §5: "a per-fetch wall-clock timeout ...
    /// produces FetchTimeout without partial content").
    pub async fn execute(
        &self,
        tenant: &TenantId,
        url: &url::Url,
        plan: Plan,
        session: Option<SessionBlob>,
        checks: &[Check],
        scroll_to_load: bool,
        change_pattern: Option<&mut ChangePattern>,
        last_content_hash: Option<&ContentHash>,
    ) -> Result<FetchResult, ExecutorError> {
        let overall_timeout = self.deps.cfg.timeout_overall;
        match tokio::time::timeout(
            overall_timeout,
            self.run(tenant, url, plan, session, checks, scroll_to_load, change_pattern, last_content_hash),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ExecutorError { error: FetchError::FetchTimeout, trace: DecisionTrace::default() }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run(
        &self,
        tenant: &TenantId,
        url: &url::Url,
        plan: Plan,
        session: Option<SessionBlob>,
        checks: &[Check],
        scroll_to_load: bool,
        change_pattern: Option<&mut ChangePattern>,
        last_content_hash: Option<&ContentHash>,
    ) -> Result<FetchResult, ExecutorError> {
        if plan.tier_sequence.is_empty() {
            return Err(ExecutorError { error: FetchError::NoViableTier, trace: DecisionTrace::default() });
        }

        let overall_start = Instant::now();
        let mut trace = DecisionTrace::default();

        for (i, tier) in plan.tier_sequence.iter().enumerate() {
            let tiers_remaining = i + 1 < plan.tier_sequence.len();
            let tier_start = Instant::now();

            let outcome = if *tier == Tier::PatternInvoke {
                self.try_pattern_invoke(&plan.candidate_patterns, url, checks, tiers_remaining).await
            } else {
                self.try_render_tier(*tier, url, session.clone(), checks, scroll_to_load, tiers_remaining).await
            };

            let elapsed = tier_start.elapsed();

            match outcome {
                TierOutcome::Done(result) => {
                    trace.record(TierAttempt {
                        tier: format!("{tier:?}"),
                        duration: elapsed,
                        success: true,
                        extraction_strategy: result.strategy.clone(),
                        validation_details: Some(result.check_result.clone()),
                        failure_reason: None,
                    });

                    if *tier != Tier::PatternInvoke {
                        self.record_discovered_patterns(tenant, &result, *tier).await;
                    }

                    let new_hash = ContentHash::of(&result.markdown);
                    let changed = last_content_hash.map(|h| h != &new_hash).unwrap_or(true);
                    if let Some(cp) = change_pattern {
                        cp.observe(Observation { timestamp: Utc::now(), content_hash: new_hash, changed });
                    }

                    return Ok(FetchResult {
                        final_url: result.final_url,
                        title: result.title,
                        content: ContentResult { markdown: result.markdown, text: result.text, html: result.html },
                        tables: result.tables,
                        discovered_apis: result.discovered_patterns,
                        verification: VerificationSummary {
                            passed: result.check_result.passed,
                            errors: result.check_result.errors,
                            confidence: result.check_result.confidence,
                        },
                        metadata: ResultMetadata {
                            load_time: overall_start.elapsed(),
                            tier: format!("{tier:?}"),
                            tiers_attempted: trace.summary.tiers_attempted,
                        },
                        decision_trace: trace,
                        network_log: result.network_log,
                    });
                }
                TierOutcome::Escalate(reason) => {
                    trace.record(TierAttempt {
                        tier: format!("{tier:?}"),
                        duration: elapsed,
                        success: false,
                        extraction_strategy: "none".to_string(),
                        validation_details: None,
                        failure_reason: Some(reason),
                    });
                    continue;
                }
                TierOutcome::Fail(err) => {
                    trace.record(TierAttempt {
                        tier: format!("{tier:?}"),
                        duration: elapsed,
                        success: false,
                        extraction_strategy: "none".to_string(),
                        validation_details: None,
                        failure_reason: Some(err.to_string()),
                    });
                    return Err(ExecutorError { error: err, trace });
                }
            }
        }

        Err(ExecutorError { error: FetchError::NoViableTier, trace })
    }

    async fn try_pattern_invoke(
        &self,
        candidates: &[ApiPattern],
        url: &url::Url,
        checks: &[Check],
        tiers_remaining: bool,
    ) -> TierOutcome {
        for pattern in candidates {
            let captures: HashMap<String, String> = pattern
                .extractors
                .iter()
                .filter_map(|e| e.capture(url, &reqwest::header::HeaderMap::new()).map(|v| (e.name.clone(), v)))
                .collect();
            let endpoint = pattern.render_endpoint(&captures);

            let client = reqwest::Client::new();
            let request = client.request(pattern.method.as_reqwest(), &endpoint);
            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    return TierOutcome::Escalate(format!("pattern invoke request failed: {e}"));
                }
            };
            let status_ok = response.status().is_success();
            let body: serde_json::Value = match response.json().await {
                Ok(b) => b,
                Err(_) => continue,
            };

            if !status_ok {
                continue;
            }
            if pattern.validation.required_fields.iter().any(|f| crate::walk::walk(&body, f).is_none()) {
                continue;
            }
            let body_len = body.to_string().len();
            if body_len < pattern.validation.min_content_length {
                continue;
            }

            let title = pattern.content_mapping.title.as_deref().and_then(|p| crate::walk::walk_str(&body, p)).map(String::from);
            let markdown = pattern.content_mapping.body.as_deref().and_then(|p| crate::walk::walk_str(&body, p)).unwrap_or_default().to_string();

            let (check_result, validation_outcome) = verifier::verify(&body, checks, tiers_remaining);
            match validation_outcome {
                ValidationOutcome::Pass => {
                    return TierOutcome::Done(RenderedResult {
                        final_url: endpoint,
                        title,
                        markdown: markdown.clone(),
                        text: markdown,
                        html: None,
                        tables: vec![],
                        discovered_patterns: vec![],
                        network_log: vec![],
                        check_result,
                        strategy: "pattern-invoke".to_string(),
                    });
                }
                ValidationOutcome::Escalate => continue,
                ValidationOutcome::Fail => return TierOutcome::Fail(FetchError::ValidationFailed { checks: vec![check_result] }),
            }
        }
        TierOutcome::Escalate("no candidate pattern produced a passing response".to_string())
    }

    async fn try_render_tier(
        &self,
        tier: Tier,
        url: &url::Url,
        session: Option<SessionBlob>,
        checks: &[Check],
        scroll_to_load: bool,
        tiers_remaining: bool,
    ) -> TierOutcome {
        let timeout = tier.default_timeout(self.deps.cfg);
        let request = RenderRequest {
            url: url.clone(),
            tier,
            session,
            fingerprint: None,
            timeout,
            scroll_to_load,
        };

        let render = match tokio::time::timeout(timeout, self.deps.renderer.render(request)).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return TierOutcome::Escalate(format!("renderer error: {e}")),
            Err(_) => return TierOutcome::Fail(FetchError::FetchTimeout),
        };

        let content = serde_json::json!({
            "title": render.title,
            "markdown": render.markdown,
            "text": render.text,
        });

        let (check_result, outcome) = verifier::verify(&content, checks, tiers_remaining);
        match outcome {
            ValidationOutcome::Pass => TierOutcome::Done(RenderedResult {
                final_url: render.final_url,
                title: render.title,
                markdown: render.markdown,
                text: render.text,
                html: render.html,
                tables: render.tables,
                discovered_patterns: vec![],
                network_log: render.network_log,
                check_result,
                strategy: format!("{tier:?}"),
            }),
            ValidationOutcome::Escalate => TierOutcome::Escalate("verification failed, retryable".to_string()),
            ValidationOutcome::Fail => TierOutcome::Fail(FetchError::ValidationFailed { checks: vec![check_result] }),
        }
    }

    async fn record_discovered_patterns(&self, _tenant: &TenantId, _result: &RenderedResult, _tier: Tier) {
        // Network-log-driven pattern mining runs via `analyzer::score` against
        // captured requests from a populated `RenderOutput::network_log`; this
        // integration point is a no-op until a renderer supplies one.
    }
}

struct RenderedResult {
    final_url: String,
    title: Option<String>,
    markdown: String,
    text: String,
    html: Option<String>,
    tables: Vec<crate::renderer::TableData>,
    discovered_patterns: Vec<ApiPattern>,
    network_log: Vec<crate::renderer::CapturedRequest>,
    check_result: CheckResult,
    strategy: String,
}

enum TierOutcome {
    Done(RenderedResult),
    Escalate(String),
    Fail(FetchError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::InMemoryPatternStore;
    use crate::planner::{Confidence, ConfidenceFactors, EstimatedTime};
    use crate::renderer::EchoRenderer;

    fn trivial_plan(tier: Tier) -> Plan {
        Plan {
            tier_sequence: vec![tier],
            candidate_patterns: vec![],
            candidate_selectors: vec![],
            estimated_time: EstimatedTime { min: Duration::ZERO, expected: Duration::ZERO, max: Duration::ZERO },
            confidence: Confidence {
                overall: 0.5,
                factors: ConfidenceFactors {
                    domain_familiarity: 0.0,
                    has_learned_patterns: false,
                    api_discovered: false,
                    bot_detection_likely: false,
                },
            },
            reasoning: vec![],
        }
    }

    #[tokio::test]
    async fn echo_renderer_round_trips_through_executor() {
        let store = InMemoryPatternStore::new();
        let renderer = EchoRenderer;
        let cfg = Config::default();
        let executor = Executor::new(ExecutorDeps { store: &store, renderer: &renderer, cfg: &cfg });

        let url = url::Url::parse("https://example.com/page").unwrap();
        let result = executor
            .execute(&TenantId::new("t1"), &url, trivial_plan(Tier::Intelligence), None, &[], false, None, None)
            .await
            .unwrap();

        assert!(result.verification.passed);
        assert_eq!(result.metadata.tiers_attempted, 1);
        assert_eq!(result.decision_trace.summary.final_tier.as_deref(), Some("Intelligence"));
    }

    #[tokio::test]
    async fn empty_plan_is_no_viable_tier() {
        let store = InMemoryPatternStore::new();
        let renderer = EchoRenderer;
        let cfg = Config::default();
        let executor = Executor::new(ExecutorDeps { store: &store, renderer: &renderer, cfg: &cfg });
        let url = url::Url::parse("https://example.com/page").unwrap();
        let plan = Plan { tier_sequence: vec![], ..trivial_plan(Tier::Intelligence) };
        let err = executor
            .execute(&TenantId::new("t1"), &url, plan, None, &[], false, None, None)
            .await
            .unwrap_err();
        assert_eq!(err.error.code(), "no_viable_tier");
    }
}
