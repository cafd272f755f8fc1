//! API Analyzer (spec §4.3): scores a captured network request and decides
//! whether it looks like an API call worth turning into an [`ApiPattern`].

use regex::Regex;
use std::sync::OnceLock;

use crate::renderer::CapturedRequest;

fn api_path_hint() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(/api/|/v\d+/|/graphql|\.json(?:$|\?))").unwrap())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ApiConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ApiConfidenceLevel {
    pub fn demote(self) -> Self {
        match self {
            ApiConfidenceLevel::High => ApiConfidenceLevel::Medium,
            ApiConfidenceLevel::Medium => ApiConfidenceLevel::Low,
            ApiConfidenceLevel::Low => ApiConfidenceLevel::Low,
        }
    }

    pub fn eligible_for_bypass(self) -> bool {
        matches!(self, ApiConfidenceLevel::High)
    }

    /// Maps a level back onto the continuous pattern-confidence scale used
    /// by the Pattern Store, so observed patterns start somewhere sane.
    pub fn initial_pattern_confidence(self) -> f32 {
        match self {
            ApiConfidenceLevel::High => 0.6,
            ApiConfidenceLevel::Medium => 0.4,
            ApiConfidenceLevel::Low => 0.2,
        }
    }
}

/// True if this request looks API-like: JSON content type, `/api/`, a
/// version segment, `/graphql`, or a `.json` path (spec §4.3).
pub fn is_api_like(req: &CapturedRequest) -> bool {
    let json_content_type = req
        .response_content_type
        .as_deref()
        .map(|ct| ct.contains("application/json") || ct.contains("+json"))
        .unwrap_or(false);
    json_content_type || api_path_hint().is_match(&req.url)
}

/// Sums the weighted signals from spec §4.3 and classifies the result.
pub fn score(req: &CapturedRequest) -> (u32, ApiConfidenceLevel) {
    let mut points = 0u32;

    if (200..300).contains(&req.status) {
        points += 3;
    }
    let is_json = req
        .response_content_type
        .as_deref()
        .map(|ct| ct.contains("application/json") || ct.contains("+json"))
        .unwrap_or(false);
    if is_json {
        points += 2;
    }

    let is_get = req.method.eq_ignore_ascii_case("GET");
    let is_authenticated_mutation_ok =
        !is_get && req.has_auth_header && (200..300).contains(&req.status) || req.status == 201 || req.status == 204;
    if is_get || is_authenticated_mutation_ok {
        points += 2;
    }

    if req.response_body_present {
        points += 1;
    }
    if req.has_auth_header {
        points += 1;
    }

    let level = if points >= 7 {
        ApiConfidenceLevel::High
    } else if points >= 4 {
        ApiConfidenceLevel::Medium
    } else {
        ApiConfidenceLevel::Low
    };

    (points, level)
}

/// Tier-aware degradation (spec §4.3): a capture from the lightweight tier
/// is demoted one level; from the intelligence tier, only `high` survives
/// (demoted to `medium`), everything else is dropped.
pub fn degrade_for_tier(level: ApiConfidenceLevel, tier: crate::planner::Tier) -> Option<ApiConfidenceLevel> {
    match tier {
        crate::planner::Tier::Playwright => Some(level),
        crate::planner::Tier::Lightweight => Some(level.demote()),
        crate::planner::Tier::Intelligence => {
            if level == ApiConfidenceLevel::High {
                Some(ApiConfidenceLevel::Medium)
            } else {
                None
            }
        }
        crate::planner::Tier::PatternInvoke => Some(level),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(status: u16, content_type: &str, method: &str, auth: bool, body: bool) -> CapturedRequest {
        CapturedRequest {
            url: "https://example.com/api/v1/users".to_string(),
            method: method.to_string(),
            status,
            response_content_type: Some(content_type.to_string()),
            response_body_present: body,
            has_auth_header: auth,
        }
    }

    #[test]
    fn high_confidence_get_json_with_auth() {
        let r = req(200, "application/json", "GET", true, true);
        let (points, level) = score(&r);
        assert_eq!(points, 3 + 2 + 2 + 1 + 1);
        assert_eq!(level, ApiConfidenceLevel::High);
        assert!(level.eligible_for_bypass());
    }

    #[test]
    fn low_confidence_plain_html_get() {
        let r = CapturedRequest {
            url: "https://example.com/about".to_string(),
            method: "GET".to_string(),
            status: 200,
            response_content_type: Some("text/html".to_string()),
            response_body_present: false,
            has_auth_header: false,
        };
        let (_, level) = score(&r);
        assert!(level < ApiConfidenceLevel::High);
        assert!(!level.eligible_for_bypass());
    }

    #[test]
    fn intelligence_tier_drops_everything_but_high() {
        assert_eq!(
            degrade_for_tier(ApiConfidenceLevel::High, crate::planner::Tier::Intelligence),
            Some(ApiConfidenceLevel::Medium)
        );
        assert_eq!(
            degrade_for_tier(ApiConfidenceLevel::Medium, crate::planner::Tier::Intelligence),
            None
        );
    }

    #[test]
    fn lightweight_tier_demotes_one_level() {
        assert_eq!(
            degrade_for_tier(ApiConfidenceLevel::High, crate::planner::Tier::Lightweight),
            Some(ApiConfidenceLevel::Medium)
        );
    }
}
