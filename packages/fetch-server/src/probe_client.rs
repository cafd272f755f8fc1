//! A real HTTP-backed implementation of `fetch_core::discovery::ProbeClient`
//! (spec §4.4: production deployments supply an implementation that issues
//! real probes per each parser's `PROBE_PATHS`).

use async_trait::async_trait;
use fetch_core::discovery::ProbeClient;

pub struct HttpProbeClient {
    client: reqwest::Client,
}

impl HttpProbeClient {
    pub fn new() -> Self {
        Self { client: reqwest::Client::builder().timeout(std::time::Duration::from_secs(5)).build().unwrap_or_default() }
    }

    async fn first_ok_body(&self, domain: &str, paths: &[&str]) -> Option<String> {
        for path in paths {
            let url = format!("https://{domain}{path}");
            if let Ok(resp) = self.client.get(&url).send().await {
                if resp.status().is_success() {
                    if let Ok(body) = resp.text().await {
                        return Some(body);
                    }
                }
            }
        }
        None
    }
}

impl Default for HttpProbeClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProbeClient for HttpProbeClient {
    async fn probe_openapi(&self, domain: &str) -> Option<serde_json::Value> {
        let body = self.first_ok_body(domain, fetch_core::discovery::parsers::openapi::PROBE_PATHS).await?;
        serde_json::from_str(&body).ok()
    }

    async fn probe_graphql(&self, domain: &str) -> Option<serde_json::Value> {
        for path in fetch_core::discovery::parsers::graphql::PROBE_PATHS {
            let url = format!("https://{domain}{path}");
            let body = serde_json::json!({ "query": fetch_core::discovery::parsers::graphql::INTROSPECTION_QUERY });
            if let Ok(resp) = self.client.post(&url).json(&body).send().await {
                if resp.status().is_success() {
                    if let Ok(json) = resp.json::<serde_json::Value>().await {
                        return Some(json);
                    }
                }
            }
        }
        None
    }

    async fn probe_raml(&self, domain: &str) -> Option<String> {
        self.first_ok_body(domain, fetch_core::discovery::parsers::raml::PROBE_PATHS).await
    }

    async fn probe_blueprint(&self, domain: &str) -> Option<String> {
        self.first_ok_body(domain, fetch_core::discovery::parsers::blueprint::PROBE_PATHS).await
    }

    async fn probe_wadl(&self, domain: &str) -> Option<String> {
        self.first_ok_body(domain, fetch_core::discovery::parsers::wadl::PROBE_PATHS).await
    }

    async fn probe_links(&self, domain: &str) -> Option<(Vec<String>, serde_json::Value)> {
        let url = format!("https://{domain}/");
        let resp = self.client.get(&url).send().await.ok()?;
        let links = resp
            .headers()
            .get_all(reqwest::header::LINK)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(String::from)
            .collect();
        Some((links, serde_json::Value::Null))
    }
}

/// Never wired into production discovery; present only so a caller without
/// a live network (tests, offline dev) can exercise the orchestrator.
pub struct NullProbeClient;

#[async_trait]
impl ProbeClient for NullProbeClient {
    async fn probe_openapi(&self, _domain: &str) -> Option<serde_json::Value> {
        None
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
        None
    }
}
