//! Planner (spec §4.1): decides which tiers to try, in what order, before
//! any I/O happens.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Config;
use crate::error::FetchError;
use crate::ids::TenantId;
use crate::pattern::{ApiPattern, PatternStore};
pub use crate::renderer::Tier;
use crate::selector::SelectorChain;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatedTime {
    pub min: Duration,
    pub expected: Duration,
    pub max: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceFactors {
    pub domain_familiarity: f32,
    pub has_learned_patterns: bool,
    pub api_discovered: bool,
    pub bot_detection_likely: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Confidence {
    pub overall: f32,
    pub factors: ConfidenceFactors,
}

#[derive(Debug, Clone, Default)]
pub struct PlanConstraints {
    pub max_latency: Option<Duration>,
    pub max_cost_tier: Option<Tier>,
}

/// Tiers ordered cheapest-first; used to apply `max_cost_tier` truncation
/// and to rank `max_latency` filtering.
fn tier_rank(tier: Tier) -> u8 {
    match tier {
        Tier::PatternInvoke => 0,
        Tier::Intelligence => 1,
        Tier::Lightweight => 2,
        Tier::Playwright => 3,
    }
}

fn tier_expected_latency(tier: Tier, cfg: &Config) -> Duration {
    match tier {
        Tier::PatternInvoke => Duration::from_millis(300),
        Tier::Intelligence => cfg.timeout_intelligence / 2,
        Tier::Lightweight => cfg.timeout_lightweight / 2,
        Tier::Playwright => cfg.timeout_playwright / 2,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub tier_sequence: Vec<Tier>,
    pub candidate_patterns: Vec<ApiPattern>,
    #[serde(skip)]
    pub candidate_selectors: Vec<SelectorChain>,
    pub estimated_time: EstimatedTime,
    pub confidence: Confidence,
    pub reasoning: Vec<String>,
}

impl Plan {
    pub fn empty(reason: impl Into<String>) -> Self {
        Self {
            tier_sequence: vec![],
            candidate_patterns: vec![],
            candidate_selectors: vec![],
            estimated_time: EstimatedTime { min: Duration::ZERO, expected: Duration::ZERO, max: Duration::ZERO },
            confidence: Confidence {
                overall: 0.0,
                factors: ConfidenceFactors {
                    domain_familiarity: 0.0,
                    has_learned_patterns: false,
                    api_discovered: false,
                    bot_detection_likely: false,
                },
            },
            reasoning: vec![reason.into()],
        }
    }
}

pub struct Planner<'a> {
    pub store: &'a dyn PatternStore,
    pub cfg: &'a Config,
}

impl<'a> Planner<'a> {
    pub fn new(store: &'a dyn PatternStore, cfg: &'a Config) -> Self {
        Self { store, cfg }
    }

    pub async fn plan(
        &self,
        tenant: &TenantId,
        url: &url::Url,
        constraints: &PlanConstraints,
        domain_in_cooldown: bool,
    ) -> Result<Plan, FetchError> {
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(FetchError::InvalidUrl(format!("unsupported scheme '{}'", url.scheme())));
        }
        let domain = crate::ids::domain_of(url).ok_or_else(|| FetchError::InvalidUrl("no host".to_string()))?;

        let mut reasoning = Vec::new();

        let intel = self
            .store
            .domain_intelligence(tenant, &domain)
            .await
            .map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        let eligible_patterns = self
            .store
            .find_matching_patterns(tenant, url)
            .await
            .map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        let high_confidence_patterns: Vec<ApiPattern> = crate::pattern::store::eligible_patterns(&eligible_patterns, self.cfg)
            .into_iter()
            .cloned()
            .collect();
        let candidate_selectors = self
            .store
            .selector_chains(tenant, &domain)
            .await
            .map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        let mut tier_sequence = vec![Tier::Intelligence, Tier::Lightweight, Tier::Playwright];

        if let Some(max_latency) = constraints.max_latency {
            tier_sequence.retain(|t| tier_expected_latency(*t, self.cfg) <= max_latency);
            reasoning.push(format!("dropped tiers exceeding max_latency={max_latency:?}"));
        }

        if let Some(max_cost_tier) = constraints.max_cost_tier {
            tier_sequence.retain(|t| tier_rank(*t) <= tier_rank(max_cost_tier));
            reasoning.push(format!("truncated at max_cost_tier={max_cost_tier:?}"));
        }

        let has_high_confidence_pattern = !high_confidence_patterns.is_empty();
        if has_high_confidence_pattern && !domain_in_cooldown {
            tier_sequence.insert(0, Tier::PatternInvoke);
            reasoning.push("prepended pattern-invoke: high-confidence pattern available".to_string());
        } else if domain_in_cooldown && has_high_confidence_pattern {
            reasoning.push("omitted pattern-invoke: domain is in discovery cooldown".to_string());
        }

        if tier_sequence.is_empty() {
            return Ok(Plan::empty("no viable tier after applying user constraints"));
        }

        let domain_familiarity = (intel.total_successes as f64 / 20.0).tanh() as f32;
        let api_discovered = intel.known_pattern_count > 0;
        let bot_detection_likely = intel.anti_bot_failure_count > 0;

        let min = tier_expected_latency(tier_sequence[0], self.cfg);
        let max: Duration = tier_sequence.iter().map(|t| tier_expected_latency(*t, self.cfg)).sum();
        let expected = tier_expected_latency(*tier_sequence.first().unwrap(), self.cfg);

        let overall = 0.5 * domain_familiarity
            + 0.3 * if api_discovered { 1.0 } else { 0.0 }
            + 0.2 * if bot_detection_likely { 0.0 } else { 1.0 };

        Ok(Plan {
            tier_sequence,
            candidate_patterns: high_confidence_patterns,
            candidate_selectors,
            estimated_time: EstimatedTime { min, expected, max },
            confidence: Confidence {
                overall: overall.clamp(0.0, 1.0),
                factors: ConfidenceFactors {
                    domain_familiarity,
                    has_learned_patterns: has_high_confidence_pattern,
                    api_discovered,
                    bot_detection_likely,
                },
            },
            reasoning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::InMemoryPatternStore;

    #[tokio::test]
    async fn rejects_urls_without_http_scheme() {
        let store = InMemoryPatternStore::new();
        let cfg = Config::default();
        let planner = Planner::new(&store, &cfg);
        let url = url::Url::parse("ftp://example.com/file").unwrap();
        let err = planner
            .plan(&TenantId::new("t1"), &url, &PlanConstraints::default(), false)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_url");
    }

    #[tokio::test]
    async fn empty_tier_sequence_when_cost_tier_too_low() {
        let store = InMemoryPatternStore::new();
        let cfg = Config::default();
        let planner = Planner::new(&store, &cfg);
        let url = url::Url::parse("https://example.com/page").unwrap();
        let constraints = PlanConstraints {
            max_latency: Some(Duration::from_millis(1)),
            max_cost_tier: None,
        };
        let plan = planner.plan(&TenantId::new("t1"), &url, &constraints, false).await.unwrap();
        assert!(plan.tier_sequence.is_empty());
    }

    #[tokio::test]
    async fn cooldown_omits_pattern_invoke_even_with_high_confidence_pattern() {
        use crate::pattern::model::*;
        let store = InMemoryPatternStore::new();
        let cfg = Config::default();
        let tenant = TenantId::new("t1");

        let mut pattern = sample_pattern_for_test(&tenant);
        pattern.metrics = PatternMetrics::new(0.95, 10);
        pattern.metrics.last_success = Some(chrono::Utc::now());
        store.upsert(pattern).await.unwrap();

        let planner = Planner::new(&store, &cfg);
        let url = url::Url::parse("https://api.example.com/users/1").unwrap();
        let plan = planner.plan(&tenant, &url, &PlanConstraints::default(), true).await.unwrap();
        assert!(!plan.tier_sequence.contains(&Tier::PatternInvoke));
    }

    fn sample_pattern_for_test(tenant: &TenantId) -> ApiPattern {
        use crate::pattern::model::*;
        ApiPattern {
            id: crate::ids::PatternId::new(),
            tenant_id: tenant.clone(),
            template_type: TemplateType::RestResource,
            url_patterns: vec![regex::Regex::new(r"^https://api\.example\.com/users/[^/]+$").unwrap()],
            endpoint_template: "https://api.example.com/users/{id}".to_string(),
            extractors: vec![],
            method: HttpMethod::Get,
            request_headers: vec![],
            response_format: ResponseFormat::Json,
            content_mapping: ContentMapping::default(),
            validation: Validation::default(),
            metrics: PatternMetrics::new(0.5, 0),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }
}
