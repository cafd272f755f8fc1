use std::collections::HashMap;
use std::sync::RwLock;

use fetch_core::change_predictor::ChangePattern;
use fetch_core::discovery::DiscoveryCache;
use fetch_core::ids::WorkflowId;
use fetch_core::pattern::InMemoryPatternStore;
use fetch_core::renderer::Renderer;
use fetch_core::stats::Stats;
use fetch_core::workflow::{Recorder, Workflow};

use crate::config::ServerConfig;
use crate::middleware::rate_limit::RateLimiter;
use crate::probe_client::HttpProbeClient;

/// Everything a route handler needs, held behind `Arc` in axum's `State`.
/// Every field here is an owned long-lived service (spec §9: "model as
/// long-lived services passed via dependency injection"), never a
/// request-scoped value.
pub struct AppState {
    pub config: ServerConfig,
    pub pattern_store: InMemoryPatternStore,
    pub renderer: Box<dyn Renderer>,
    pub stats: Stats,
    pub recorder: Recorder,
    pub saved_workflows: RwLock<HashMap<WorkflowId, Workflow>>,
    pub change_patterns: RwLock<HashMap<(String, String), ChangePattern>>,
    pub discovery_cache: DiscoveryCache,
    pub probe_client: HttpProbeClient,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// `renderer` is the one external-boundary capability this crate cannot
    /// provide a production implementation of (spec §1: "pluggable renderer
    /// ... not specified"); callers inject whichever one they have (a
    /// headless-browser driver, a lightweight HTML/JS parser, or
    /// `EchoRenderer` for local dev) rather than this module picking for
    /// them.
    pub fn new(config: ServerConfig, renderer: Box<dyn Renderer>) -> Self {
        let discovery_cache = DiscoveryCache::new(config.core.clone());
        let rate_limiter = RateLimiter::new(config.rate_limit_per_minute);
        Self {
            config,
            pattern_store: InMemoryPatternStore::new(),
            renderer,
            stats: Stats::new(),
            recorder: Recorder::new(),
            saved_workflows: RwLock::new(HashMap::new()),
            change_patterns: RwLock::new(HashMap::new()),
            discovery_cache,
            probe_client: HttpProbeClient::new(),
            rate_limiter,
        }
    }
}
