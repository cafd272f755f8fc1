//! Shared types for the discovery subsystem (spec §4.4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::pattern::ApiPattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoverySource {
    OpenApi,
    GraphQl,
    AsyncApi,
    Raml,
    ApiBlueprint,
    Wadl,
    Links,
    DocsPage,
    Observed,
}

impl DiscoverySource {
    /// Confidence prior assigned to patterns compiled from this source
    /// (spec §4.4). Also doubles as merge priority — higher prior wins.
    pub fn confidence_prior(&self) -> f32 {
        match self {
            DiscoverySource::OpenApi => 0.95,
            DiscoverySource::GraphQl => 0.90,
            DiscoverySource::AsyncApi => 0.85,
            DiscoverySource::Raml => 0.80,
            DiscoverySource::ApiBlueprint => 0.80,
            DiscoverySource::Wadl => 0.80,
            DiscoverySource::Links => 0.70,
            DiscoverySource::DocsPage => 0.60,
            DiscoverySource::Observed => 0.50,
        }
    }

    /// spec-backed initial trust: patterns compiled from a discovered spec
    /// start with this many "virtual" prior successes.
    pub fn initial_success_count(&self) -> u32 {
        50
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointParam {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub method: crate::pattern::HttpMethod,
    pub path: String,
    pub path_params: Vec<EndpointParam>,
    pub query_params: Vec<EndpointParam>,
    pub request_content_type: Option<String>,
    pub response_content_type: Option<String>,
    pub response_schema: Option<serde_json::Value>,
}

/// What a spec parser produces from a matching response body (spec §4.4,
/// "Parser contracts").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedSpec {
    pub title: Option<String>,
    pub version: Option<String>,
    pub base_url: Option<String>,
    pub endpoints: Vec<Endpoint>,
}

/// Outcome of probing one source for one domain (spec §3 Data Model:
/// Discovery Result).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub source: DiscoverySource,
    pub confidence: f32,
    pub patterns: Vec<ApiPattern>,
    pub metadata: Option<ParsedSpec>,
    pub discovery_time: Duration,
    pub found: bool,
    pub error: Option<String>,
}

impl DiscoveryResult {
    pub fn not_found(source: DiscoverySource, discovery_time: Duration) -> Self {
        Self {
            source,
            confidence: source.confidence_prior(),
            patterns: vec![],
            metadata: None,
            discovery_time,
            found: false,
            error: None,
        }
    }

    pub fn failed(source: DiscoverySource, discovery_time: Duration, error: impl Into<String>) -> Self {
        Self {
            source,
            confidence: source.confidence_prior(),
            patterns: vec![],
            metadata: None,
            discovery_time,
            found: false,
            error: Some(error.into()),
        }
    }
}

/// Dedup key for merging across sources (spec §4.4: "spec-source ∥ domain
/// ∥ method ∥ path-template").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternKey {
    pub domain: String,
    pub method: crate::pattern::HttpMethod,
    pub path_template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainDiscoveryOutcome {
    pub discovered: Vec<DiscoveryResult>,
    pub fetched_at: DateTime<Utc>,
}
