//! Discovery Orchestrator (spec §4.4): fans a domain out across every
//! discovery source in parallel, merges and deduplicates the results, and
//! persists newly compiled patterns.

use std::collections::HashMap;
use std::time::Instant;

use crate::ids::TenantId;
use crate::pattern::{ApiPattern, PatternStore};

use super::cache::DiscoveryCache;
use super::model::{DiscoveryResult, DiscoverySource, Endpoint, ParsedSpec, PatternKey};
use super::parsers;

/// Abstracts the actual network probing so the orchestrator's merge/dedupe
/// logic can be tested without an HTTP client. A production deployment
/// supplies an implementation that issues real probes per
/// `parsers::*::PROBE_PATHS`.
#[async_trait::async_trait]
pub trait ProbeClient: Send + Sync {
    async fn probe_openapi(&self, domain: &str) -> Option<serde_json::Value>;
    async fn probe_graphql(&self, domain: &str) -> Option<serde_json::Value>;
    async fn probe_raml(&self, domain: &str) -> Option<String>;
    async fn probe_blueprint(&self, domain: &str) -> Option<String>;
    async fn probe_wadl(&self, domain: &str) -> Option<String>;
    async fn probe_links(&self, domain: &str) -> Option<(Vec<String>, serde_json::Value)>;
}

pub struct DiscoveryOrchestrator<'a> {
    pub cache: &'a DiscoveryCache,
    pub store: &'a dyn PatternStore,
    pub probes: &'a dyn ProbeClient,
}

impl<'a> DiscoveryOrchestrator<'a> {
    pub fn new(cache: &'a DiscoveryCache, store: &'a dyn PatternStore, probes: &'a dyn ProbeClient) -> Self {
        Self { cache, store, probes }
    }

    pub async fn discover(&self, tenant: &TenantId, domain: &str) -> Vec<DiscoveryResult> {
        let sources = [
            DiscoverySource::OpenApi,
            DiscoverySource::GraphQl,
            DiscoverySource::Raml,
            DiscoverySource::ApiBlueprint,
            DiscoverySource::Wadl,
            DiscoverySource::Links,
        ];

        let futures = sources.iter().map(|source| self.discover_source(tenant, domain, *source));
        let results = futures::future::join_all(futures).await;

        let merged = merge(&results);
        for pattern in &merged {
            let _ = self.store.upsert(pattern.clone()).await;
        }

        results
    }

    async fn discover_source(&self, tenant: &TenantId, domain: &str, source: DiscoverySource) -> DiscoveryResult {
        if self.cache.in_cooldown(tenant, source, domain).await {
            return DiscoveryResult::not_found(source, std::time::Duration::ZERO);
        }

        let tenant = tenant.clone();
        let domain_owned = domain.to_string();
        let tenant_for_closure = tenant.clone();
        self.cache
            .get_or_probe(&tenant, source, domain, || async move { self.probe_once(&tenant_for_closure, &domain_owned, source).await })
            .await
    }

    async fn probe_once(&self, tenant: &TenantId, domain: &str, source: DiscoverySource) -> DiscoveryResult {
        let start = Instant::now();
        let base_url = format!("https://{domain}");

        match source {
            DiscoverySource::OpenApi => match self.probes.probe_openapi(domain).await {
                Some(body) => match parsers::openapi::parse(&body) {
                    Some(spec) => {
                        let patterns = parsers::compile_endpoints(tenant, domain, spec.base_url.as_deref().unwrap_or(&base_url), &spec.endpoints, source);
                        found(source, start.elapsed(), patterns, spec)
                    }
                    None => DiscoveryResult::not_found(source, start.elapsed()),
                },
                None => DiscoveryResult::not_found(source, start.elapsed()),
            },
            DiscoverySource::GraphQl => match self.probes.probe_graphql(domain).await {
                Some(body) => match parsers::graphql::parse(&body) {
                    Some(spec) => {
                        let patterns = parsers::compile_endpoints(tenant, domain, &base_url, &spec.endpoints, source);
                        found(source, start.elapsed(), patterns, spec)
                    }
                    None => DiscoveryResult::not_found(source, start.elapsed()),
                },
                None => DiscoveryResult::not_found(source, start.elapsed()),
            },
            DiscoverySource::Raml => match self.probes.probe_raml(domain).await.as_deref().and_then(parsers::raml::parse) {
                Some(spec) => {
                    let patterns = parsers::compile_endpoints(tenant, domain, spec.base_url.as_deref().unwrap_or(&base_url), &spec.endpoints, source);
                    found(source, start.elapsed(), patterns, spec)
                }
                None => DiscoveryResult::not_found(source, start.elapsed()),
            },
            DiscoverySource::ApiBlueprint => match self.probes.probe_blueprint(domain).await.as_deref().and_then(parsers::blueprint::parse) {
                Some(spec) => {
                    let patterns = parsers::compile_endpoints(tenant, domain, spec.base_url.as_deref().unwrap_or(&base_url), &spec.endpoints, source);
                    found(source, start.elapsed(), patterns, spec)
                }
                None => DiscoveryResult::not_found(source, start.elapsed()),
            },
            DiscoverySource::Wadl => match self.probes.probe_wadl(domain).await.as_deref().and_then(parsers::wadl::parse) {
                Some(spec) => {
                    let patterns = parsers::compile_endpoints(tenant, domain, spec.base_url.as_deref().unwrap_or(&base_url), &spec.endpoints, source);
                    found(source, start.elapsed(), patterns, spec)
                }
                None => DiscoveryResult::not_found(source, start.elapsed()),
            },
            DiscoverySource::Links => match self.probes.probe_links(domain).await {
                Some((headers, _body)) if !headers.is_empty() => {
                    let endpoints: Vec<Endpoint> = headers
                        .iter()
                        .flat_map(|header| parsers::link::parse_link_header(header))
                        .filter_map(|link| {
                            let href = url::Url::parse(&link.href).ok()?;
                            Some(Endpoint {
                                method: crate::pattern::HttpMethod::Get,
                                path: href.path().to_string(),
                                path_params: vec![],
                                query_params: vec![],
                                request_content_type: None,
                                response_content_type: link.link_type,
                                response_schema: None,
                            })
                        })
                        .collect();
                    if endpoints.is_empty() {
                        DiscoveryResult::not_found(source, start.elapsed())
                    } else {
                        let spec = ParsedSpec { title: None, version: None, base_url: Some(base_url.clone()), endpoints };
                        let patterns = parsers::compile_endpoints(tenant, domain, &base_url, &spec.endpoints, source);
                        found(source, start.elapsed(), patterns, spec)
                    }
                }
                _ => DiscoveryResult::not_found(source, start.elapsed()),
            },
            DiscoverySource::AsyncApi | DiscoverySource::DocsPage | DiscoverySource::Observed => {
                DiscoveryResult::not_found(source, start.elapsed())
            }
        }
    }
}

fn found(source: DiscoverySource, elapsed: std::time::Duration, patterns: Vec<ApiPattern>, spec: super::model::ParsedSpec) -> DiscoveryResult {
    DiscoveryResult { source, confidence: source.confidence_prior(), patterns, metadata: Some(spec), discovery_time: elapsed, found: true, error: None }
}

/// Dedupe patterns across sources by `(domain, method, path-template)`,
/// highest-priority (i.e. highest confidence-prior) source wins on
/// conflict (spec §4.4: "Priority ordering for merging: same order").
fn merge(results: &[DiscoveryResult]) -> Vec<ApiPattern> {
    let mut ordered = results.to_vec();
    ordered.sort_by(|a, b| b.source.confidence_prior().partial_cmp(&a.source.confidence_prior()).unwrap());

    let mut by_key: HashMap<PatternKey, ApiPattern> = HashMap::new();
    for result in &ordered {
        if !result.found {
            continue;
        }
        for pattern in &result.patterns {
            let domain = pattern
                .url_patterns
                .first()
                .map(|r| r.as_str().to_string())
                .unwrap_or_default();
            let key = PatternKey { domain, method: pattern.method, path_template: pattern.endpoint_template.clone() };
            by_key.entry(key).or_insert_with(|| pattern.clone());
        }
    }
    by_key.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::pattern::InMemoryPatternStore;
    use serde_json::json;

    struct StubProbes;

    #[async_trait::async_trait]
    impl ProbeClient for StubProbes {
        async fn probe_openapi(&self, _domain: &str) -> Option<serde_json::Value> {
            Some(json!({
                "info": {"title": "Stub", "version": "1.0"},
                "servers": [{"url": "https://api.example.com"}],
                "paths": {"/users/{id}": {"get": {"parameters": [{"name": "id", "in": "path"}]}}}
            }))
        }
        async fn probe_graphql(&self, _domain: &str) -> Option<serde_json::Value> {
            None
        }
        async fn probe_raml(&self, _domain: &str) -> Option<String> {
            None
        }
        async fn probe_blueprint(&self, _domain: &str) -> Option<String> {
            None
        }
        async fn probe_wadl(&self, _domain: &str) -> Option<String> {
            None
        }
        async fn probe_links(&self, _domain: &str) -> Option<(Vec<String>, serde_json::Value)> {
            Some((vec![r#"<https://api.example.com/items?page=2>; rel="next""#.to_string()], serde_json::Value::Null))
        }
    }

    #[tokio::test]
    async fn discover_persists_compiled_patterns() {
        let cache = DiscoveryCache::new(Config::default());
        let store = InMemoryPatternStore::new();
        let probes = StubProbes;
        let orchestrator = DiscoveryOrchestrator::new(&cache, &store, &probes);

        let tenant = TenantId::new("t1");
        let results = orchestrator.discover(&tenant, "api.example.com").await;
        assert!(results.iter().any(|r| r.source == DiscoverySource::OpenApi && r.found));

        let url = url::Url::parse("https://api.example.com/users/1").unwrap();
        let found = store.find_matching_patterns(&tenant, &url).await.unwrap();
        assert_eq!(found.len(), 1);

        assert!(results.iter().any(|r| r.source == DiscoverySource::Links && r.found));
    }
}
