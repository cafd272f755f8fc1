//! The Renderer capability (spec §1, §4.2): an external boundary the
//! Executor calls into for the `intelligence`/`lightweight`/`playwright`
//! tiers. This crate ships no real browser/HTML-rendering backend — callers
//! provide one via this trait, matching `intelligent-crawler`'s split
//! between `PageFetcher`/`PageEvaluator` traits and their concrete adapters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::stealth::Fingerprint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    Intelligence,
    Lightweight,
    Playwright,
    PatternInvoke,
}

impl Tier {
    pub fn is_renderer_tier(&self) -> bool {
        !matches!(self, Tier::PatternInvoke)
    }

    pub fn default_timeout(&self, cfg: &crate::config::Config) -> Duration {
        match self {
            Tier::Intelligence => cfg.timeout_intelligence,
            Tier::Lightweight => cfg.timeout_lightweight,
            Tier::Playwright => cfg.timeout_playwright,
            Tier::PatternInvoke => cfg.timeout_intelligence,
        }
    }
}

/// One network request observed while rendering, shape-reduced to what the
/// API Analyzer needs (spec §4.2: "Capture networkLog always").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedRequest {
    pub url: String,
    pub method: String,
    pub status: u16,
    pub response_content_type: Option<String>,
    pub response_body_present: bool,
    pub has_auth_header: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// A renderer's output shape (spec §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderOutput {
    pub final_url: String,
    pub title: Option<String>,
    pub html: Option<String>,
    pub markdown: String,
    pub text: String,
    pub tables: Vec<TableData>,
    pub network_log: Vec<CapturedRequest>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionBlob {
    pub cookies: Vec<String>,
    pub local_storage: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub url: url::Url,
    pub tier: Tier,
    pub session: Option<SessionBlob>,
    pub fingerprint: Option<Fingerprint>,
    pub timeout: Duration,
    pub scroll_to_load: bool,
}

/// External capability the core invokes but never implements. Production
/// deployments supply a real headless-browser or HTTP-fetch backed
/// implementation; tests supply a canned one.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, request: RenderRequest) -> anyhow::Result<RenderOutput>;
}

/// Deterministic stand-in used by tests and as a development fallback —
/// never wired into a production `fetch-server` deployment.
pub struct EchoRenderer;

#[async_trait]
impl Renderer for EchoRenderer {
    async fn render(&self, request: RenderRequest) -> anyhow::Result<RenderOutput> {
        Ok(RenderOutput {
            final_url: request.url.to_string(),
            title: Some(format!("echo:{}", request.url)),
            html: Some(format!("<html><body>{}</body></html>", request.url)),
            markdown: format!("# {}", request.url),
            text: request.url.to_string(),
            tables: vec![],
            network_log: vec![],
        })
    }
}
