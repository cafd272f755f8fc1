use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use crate::config::Config;
use crate::ids::{PatternId, TenantId};
use crate::selector::SelectorChain;

use super::confidence;
use super::model::ApiPattern;

/// Aggregate per-domain rollup (spec §3, Domain Intelligence).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct DomainIntelligence {
    pub known_pattern_count: usize,
    pub selector_chain_count: usize,
    pub validator_count: usize,
    pub rolling_success_rate: f32,
    pub total_successes: u64,
    pub recommended_wait_strategy: String,
    pub should_use_session: bool,
    pub anti_bot_failure_count: u32,
}

/// Exclusive owner of pattern rows (spec §3 Ownership). The Planner reads
/// through `find_matching_patterns`/`domain_intelligence`; the Executor
/// writes outcomes through `record_success`/`record_failure` — it never
/// mutates a pattern directly.
#[async_trait]
pub trait PatternStore: Send + Sync {
    async fn find_matching_patterns(&self, tenant: &TenantId, url: &url::Url) -> Result<Vec<ApiPattern>>;
    async fn upsert(&self, pattern: ApiPattern) -> Result<()>;
    async fn record_success(&self, id: PatternId, alpha: f32) -> Result<()>;
    async fn record_failure(&self, id: PatternId, beta: f32, reason: &str) -> Result<()>;
    async fn domain_intelligence(&self, tenant: &TenantId, domain: &str) -> Result<DomainIntelligence>;
    async fn selector_chains(&self, tenant: &TenantId, domain: &str) -> Result<Vec<SelectorChain>>;
    async fn record_anti_bot_failure(&self, tenant: &TenantId, domain: &str) -> Result<()>;
    /// Hard-delete patterns whose `lastSuccess` predates `cutoff` and whose
    /// confidence is below `min_confidence`. Opt-in only — never called by
    /// the fetch path (spec §9 Open Question: stale pattern GC).
    async fn gc_stale(&self, cutoff: chrono::DateTime<Utc>, min_confidence: f32) -> Result<usize>;
}

#[derive(Default)]
struct DomainBook {
    attempts: u64,
    successes: u64,
    anti_bot_failures: u32,
}

/// Tenant-partitioned in-memory store (spec §3: Pattern Store is
/// tenant-partitioned; §9: cross-tenant sharing is a deliberate non-goal).
/// Used by tests and as the default backend; `PostgresPatternStore` (behind
/// the `postgres` feature) provides the durable equivalent following
/// `intelligent-crawler`'s storage-trait-plus-adapter split.
pub struct InMemoryPatternStore {
    patterns: RwLock<HashMap<(TenantId, PatternId), ApiPattern>>,
    domains: RwLock<HashMap<(TenantId, String), DomainBook>>,
    selectors: RwLock<HashMap<(TenantId, String), Vec<SelectorChain>>>,
}

impl InMemoryPatternStore {
    pub fn new() -> Self {
        Self {
            patterns: RwLock::new(HashMap::new()),
            domains: RwLock::new(HashMap::new()),
            selectors: RwLock::new(HashMap::new()),
        }
    }

    pub fn seed_selector_chain(&self, tenant: &TenantId, domain: &str, chain: SelectorChain) {
        self.selectors
            .write()
            .unwrap()
            .entry((tenant.clone(), domain.to_string()))
            .or_default()
            .push(chain);
    }
}

impl Default for InMemoryPatternStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PatternStore for InMemoryPatternStore {
    async fn find_matching_patterns(&self, tenant: &TenantId, url: &url::Url) -> Result<Vec<ApiPattern>> {
        let patterns = self.patterns.read().unwrap();
        let mut matches: Vec<ApiPattern> = patterns
            .iter()
            .filter(|((t, _), p)| t == tenant && p.matches(url))
            .map(|(_, p)| p.clone())
            .collect();
        // spec §4.1 step 2: confidence desc, lastSuccess desc, successCount desc
        matches.sort_by(|a, b| {
            b.metrics
                .confidence
                .partial_cmp(&a.metrics.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.metrics.last_success.cmp(&a.metrics.last_success))
                .then_with(|| b.metrics.success_count.cmp(&a.metrics.success_count))
        });
        Ok(matches)
    }

    async fn upsert(&self, pattern: ApiPattern) -> Result<()> {
        let key = (pattern.tenant_id.clone(), pattern.id);
        self.patterns.write().unwrap().insert(key, pattern);
        Ok(())
    }

    async fn record_success(&self, id: PatternId, alpha: f32) -> Result<()> {
        let mut patterns = self.patterns.write().unwrap();
        if let Some((_, pattern)) = patterns.iter_mut().find(|((_, pid), _)| *pid == id) {
            confidence::on_success(&mut pattern.metrics, alpha, Utc::now());
            pattern.updated_at = Utc::now();
            for domain in pattern.metrics.source_domains.clone() {
                drop_domain_book_update(&self.domains, &pattern.tenant_id, &domain, true);
            }
        }
        Ok(())
    }

    async fn record_failure(&self, id: PatternId, beta: f32, _reason: &str) -> Result<()> {
        let mut patterns = self.patterns.write().unwrap();
        if let Some((_, pattern)) = patterns.iter_mut().find(|((_, pid), _)| *pid == id) {
            confidence::on_failure(&mut pattern.metrics, beta);
            pattern.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn domain_intelligence(&self, tenant: &TenantId, domain: &str) -> Result<DomainIntelligence> {
        let patterns = self.patterns.read().unwrap();
        let domain_patterns: Vec<&ApiPattern> = patterns
            .iter()
            .filter(|((t, _), p)| t == tenant && p.metrics.source_domains.iter().any(|d| d == domain))
            .map(|(_, p)| p)
            .collect();

        let selector_count = self
            .selectors
            .read()
            .unwrap()
            .get(&(tenant.clone(), domain.to_string()))
            .map(|v| v.len())
            .unwrap_or(0);

        let books = self.domains.read().unwrap();
        let book = books.get(&(tenant.clone(), domain.to_string()));
        let rolling_success_rate = book
            .map(|b| {
                if b.attempts == 0 {
                    0.0
                } else {
                    b.successes as f32 / b.attempts as f32
                }
            })
            .unwrap_or(0.0);
        let anti_bot_failure_count = book.map(|b| b.anti_bot_failures).unwrap_or(0);
        let total_successes = book.map(|b| b.successes).unwrap_or(0);

        Ok(DomainIntelligence {
            known_pattern_count: domain_patterns.len(),
            selector_chain_count: selector_count,
            validator_count: domain_patterns
                .iter()
                .map(|p| p.validation.required_fields.len())
                .sum(),
            rolling_success_rate,
            total_successes,
            recommended_wait_strategy: if rolling_success_rate > 0.8 {
                "none".to_string()
            } else {
                "network-idle".to_string()
            },
            should_use_session: domain_patterns.iter().any(|p| !p.request_headers.is_empty()),
            anti_bot_failure_count,
        })
    }

    async fn selector_chains(&self, tenant: &TenantId, domain: &str) -> Result<Vec<SelectorChain>> {
        Ok(self
            .selectors
            .read()
            .unwrap()
            .get(&(tenant.clone(), domain.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn record_anti_bot_failure(&self, tenant: &TenantId, domain: &str) -> Result<()> {
        self.domains
            .write()
            .unwrap()
            .entry((tenant.clone(), domain.to_string()))
            .or_default()
            .anti_bot_failures += 1;
        Ok(())
    }

    async fn gc_stale(&self, cutoff: chrono::DateTime<Utc>, min_confidence: f32) -> Result<usize> {
        let mut patterns = self.patterns.write().unwrap();
        let before = patterns.len();
        patterns.retain(|_, p| {
            let stale = p.metrics.confidence < min_confidence
                && p.metrics.last_success.map(|ts| ts < cutoff).unwrap_or(true);
            !stale
        });
        Ok(before - patterns.len())
    }
}

fn drop_domain_book_update(
    domains: &RwLock<HashMap<(TenantId, String), DomainBook>>,
    tenant: &TenantId,
    domain: &str,
    success: bool,
) {
    let mut books = domains.write().unwrap();
    let book = books.entry((tenant.clone(), domain.to_string())).or_default();
    book.attempts += 1;
    if success {
        book.successes += 1;
    }
}

/// Convenience for callers that just want the default thresholds from
/// [`Config`] applied to [`ApiPattern::is_eligible_for_bypass`].
pub fn eligible_patterns<'a>(patterns: &'a [ApiPattern], cfg: &Config) -> Vec<&'a ApiPattern> {
    let now = Utc::now();
    let recency = chrono::Duration::from_std(cfg.bypass_success_recency).unwrap_or(chrono::Duration::days(14));
    patterns
        .iter()
        .filter(|p| {
            p.is_eligible_for_bypass(
                cfg.bypass_confidence_threshold,
                cfg.bypass_min_success_count,
                recency,
                now,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::model::*;
    use regex::Regex;

    fn sample(tenant: &TenantId) -> ApiPattern {
        ApiPattern {
            id: PatternId::new(),
            tenant_id: tenant.clone(),
            template_type: TemplateType::RestResource,
            url_patterns: vec![Regex::new(r"^https://api\.example\.com/users/[^/]+$").unwrap()],
            endpoint_template: "https://api.example.com/users/{id}".to_string(),
            extractors: vec![],
            method: HttpMethod::Get,
            request_headers: vec![],
            response_format: ResponseFormat::Json,
            content_mapping: ContentMapping::default(),
            validation: Validation::default(),
            metrics: PatternMetrics::new(0.95, 50),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn find_matching_patterns_is_tenant_scoped() {
        let store = InMemoryPatternStore::new();
        let t1 = TenantId::new("t1");
        let t2 = TenantId::new("t2");
        store.upsert(sample(&t1)).await.unwrap();

        let url = url::Url::parse("https://api.example.com/users/42").unwrap();
        assert_eq!(store.find_matching_patterns(&t1, &url).await.unwrap().len(), 1);
        assert_eq!(store.find_matching_patterns(&t2, &url).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn record_success_raises_confidence() {
        let store = InMemoryPatternStore::new();
        let t1 = TenantId::new("t1");
        let mut pattern = sample(&t1);
        pattern.metrics.confidence = 0.5;
        let id = pattern.id;
        store.upsert(pattern).await.unwrap();

        store.record_success(id, 0.1).await.unwrap();

        let url = url::Url::parse("https://api.example.com/users/42").unwrap();
        let found = store.find_matching_patterns(&t1, &url).await.unwrap();
        assert!(found[0].metrics.confidence > 0.5);
    }

    #[tokio::test]
    async fn gc_stale_removes_only_low_confidence_old_patterns() {
        let store = InMemoryPatternStore::new();
        let t1 = TenantId::new("t1");
        let mut stale = sample(&t1);
        stale.metrics.confidence = 0.1;
        stale.metrics.last_success = Some(Utc::now() - chrono::Duration::days(120));
        store.upsert(stale).await.unwrap();

        let mut healthy = sample(&t1);
        healthy.metrics.confidence = 0.9;
        healthy.metrics.last_success = Some(Utc::now());
        store.upsert(healthy).await.unwrap();

        let removed = store
            .gc_stale(Utc::now() - chrono::Duration::days(90), 0.3)
            .await
            .unwrap();
        assert_eq!(removed, 1);
    }
}
