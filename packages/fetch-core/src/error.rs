use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::verifier::CheckResult;

/// Terminal errors a fetch can surface to a caller. Every variant carries a
/// stable machine code (`code()`) so the HTTP edge can map it to a status
/// without re-deriving it from the message text.
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum FetchError {
    #[error("url failed canonicalization: {0}")]
    InvalidUrl(String),

    #[error("no tier in the plan could satisfy the request's constraints")]
    NoViableTier,

    #[error("fetch exceeded its wall-clock budget")]
    FetchTimeout,

    #[error("renderer failed at every attempted tier")]
    RenderFailed { last_error: String },

    #[error("all tiers rendered but content failed verification")]
    ValidationFailed { checks: Vec<CheckResult> },

    #[error("playwright tier reported an anti-bot fingerprint page")]
    BotDetected,

    #[error("origin server rate-limited the request")]
    UpstreamRateLimited { retry_after_secs: Option<u64> },
}

impl FetchError {
    pub fn code(&self) -> &'static str {
        match self {
            FetchError::InvalidUrl(_) => "invalid_url",
            FetchError::NoViableTier => "no_viable_tier",
            FetchError::FetchTimeout => "fetch_timeout",
            FetchError::RenderFailed { .. } => "render_failed",
            FetchError::ValidationFailed { .. } => "validation_failed",
            FetchError::BotDetected => "bot_detected",
            FetchError::UpstreamRateLimited { .. } => "upstream_rate_limited",
        }
    }
}

/// Failures that never surface as a terminal [`FetchError`]; they're either
/// folded into the decision trace (pattern invocation) or logged and
/// swallowed by a side-channel (discovery). Kept as a distinct type so
/// callers can't accidentally propagate them as if they were fatal.
#[derive(Debug, Error, Clone)]
pub enum InternalError {
    #[error("pattern invocation returned non-matching content: {0}")]
    PatternInvokeFailed(String),

    #[error("discovery source failed: {0}")]
    DiscoveryError(String),
}
