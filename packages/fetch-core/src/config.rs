use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

/// Tunables the spec deliberately leaves to the deployment (confidence
/// smoothing, cache TTLs, cooldown backoff, stale-pattern GC). Loaded from
/// the environment the way `packages/server`'s `Config::from_env` does,
/// falling back to the spec's documented defaults when unset.
#[derive(Debug, Clone)]
pub struct Config {
    /// Confidence smoothing factor applied on a successful pattern
    /// invocation (spec §4.3, `alpha ~= 0.1`).
    pub confidence_alpha: f32,
    /// Confidence decay factor applied on a failed pattern invocation
    /// (spec §4.3, `beta ~= 0.2`).
    pub confidence_beta: f32,
    /// Minimum confidence for bypass eligibility (spec §4.3).
    pub bypass_confidence_threshold: f32,
    /// Minimum successCount for bypass eligibility (spec §4.3).
    pub bypass_min_success_count: u32,
    /// Recency window for `lastSuccess` eligibility (spec §4.3, 14 days).
    pub bypass_success_recency: Duration,

    /// Discovery cache TTL (spec §4.4, default 1h).
    pub discovery_cache_ttl: Duration,
    /// Discovery probe rate limit per domain (spec §5, default 1 per 3s).
    pub discovery_probe_interval: Duration,
    /// Discovery probe burst allowance (spec §5, default 5).
    pub discovery_probe_burst: u32,
    /// Cooldown backoff ladder on repeated discovery failure (spec §4.4).
    pub discovery_cooldown_steps: Vec<Duration>,

    /// Stale-pattern GC thresholds (spec §9 Open Question — configured,
    /// never guessed; `gc_stale` is opt-in and never called on the fetch
    /// path).
    pub stale_pattern_max_age: Duration,
    pub stale_pattern_min_confidence: f32,

    /// Per-tier and overall wall-clock timeouts (spec §5).
    pub timeout_intelligence: Duration,
    pub timeout_lightweight: Duration,
    pub timeout_playwright: Duration,
    pub timeout_overall: Duration,

    /// Workflow usage/success-rate EMA smoothing (spec §4.6, alpha=0.2).
    pub workflow_success_ema_alpha: f32,

    /// Skill generalizer eligibility and matching thresholds (spec §4.7).
    pub skill_min_success_count: u32,
    pub skill_min_success_rate: f32,
    pub skill_similarity_threshold: f32,
    pub skill_merge_threshold: f32,

    /// Optimizer promotion thresholds (spec §4.8).
    pub optimizer_promotion_min_uses: u32,
    pub optimizer_promotion_min_success_rate: f32,
    pub optimizer_min_field_coverage: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            confidence_alpha: 0.1,
            confidence_beta: 0.2,
            bypass_confidence_threshold: 0.7,
            bypass_min_success_count: 3,
            bypass_success_recency: Duration::from_secs(60 * 60 * 24 * 14),

            discovery_cache_ttl: Duration::from_secs(60 * 60),
            discovery_probe_interval: Duration::from_secs(3),
            discovery_probe_burst: 5,
            discovery_cooldown_steps: vec![
                Duration::from_secs(60),
                Duration::from_secs(5 * 60),
                Duration::from_secs(30 * 60),
                Duration::from_secs(2 * 60 * 60),
            ],

            stale_pattern_max_age: Duration::from_secs(60 * 60 * 24 * 90),
            stale_pattern_min_confidence: 0.3,

            timeout_intelligence: Duration::from_secs(5),
            timeout_lightweight: Duration::from_secs(10),
            timeout_playwright: Duration::from_secs(30),
            timeout_overall: Duration::from_secs(60),

            workflow_success_ema_alpha: 0.2,

            skill_min_success_count: 3,
            skill_min_success_rate: 0.7,
            skill_similarity_threshold: 0.65,
            skill_merge_threshold: 0.85,

            optimizer_promotion_min_uses: 5,
            optimizer_promotion_min_success_rate: 0.9,
            optimizer_min_field_coverage: 0.8,
        }
    }
}

impl Config {
    /// Load overrides from the environment, falling back to [`Default`] for
    /// anything unset. Mirrors `packages/server/src/config.rs`'s
    /// `env::var(...).context(...)` style, but every field here is optional
    /// since the whole struct already has sane defaults.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();

        if let Ok(v) = env::var("FETCH_BYPASS_CONFIDENCE_THRESHOLD") {
            cfg.bypass_confidence_threshold = v
                .parse()
                .context("FETCH_BYPASS_CONFIDENCE_THRESHOLD must be a float")?;
        }
        if let Ok(v) = env::var("FETCH_STALE_PATTERN_MAX_AGE_DAYS") {
            let days: u64 = v
                .parse()
                .context("FETCH_STALE_PATTERN_MAX_AGE_DAYS must be an integer")?;
            cfg.stale_pattern_max_age = Duration::from_secs(days * 24 * 60 * 60);
        }
        if let Ok(v) = env::var("FETCH_STALE_PATTERN_MIN_CONFIDENCE") {
            cfg.stale_pattern_min_confidence = v
                .parse()
                .context("FETCH_STALE_PATTERN_MIN_CONFIDENCE must be a float")?;
        }
        if let Ok(v) = env::var("FETCH_DISCOVERY_CACHE_TTL_SECS") {
            cfg.discovery_cache_ttl =
                Duration::from_secs(v.parse().context("FETCH_DISCOVERY_CACHE_TTL_SECS must be an integer")?);
        }
        if let Ok(v) = env::var("FETCH_TIMEOUT_OVERALL_SECS") {
            cfg.timeout_overall =
                Duration::from_secs(v.parse().context("FETCH_TIMEOUT_OVERALL_SECS must be an integer")?);
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.bypass_min_success_count, 3);
        assert_eq!(cfg.bypass_confidence_threshold, 0.7);
        assert_eq!(cfg.discovery_cache_ttl, Duration::from_secs(3600));
    }
}
