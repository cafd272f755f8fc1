use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ids::{PatternId, TenantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    RestResource,
    QueryApi,
    GraphQl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorSource {
    Path,
    Query,
    Header,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Json,
    Xml,
    Text,
}

/// A `(name, source, regex, group)` tuple that pulls a value out of the
/// request URL to fill the endpoint template (spec GLOSSARY: Extractor).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extractor {
    pub name: String,
    pub source: ExtractorSource,
    #[serde(with = "regex_as_str")]
    pub pattern: Regex,
    pub group: usize,
}

impl Extractor {
    /// Apply this extractor against the incoming request URL, producing the
    /// named capture value to substitute into the pattern's endpoint
    /// template.
    pub fn capture(&self, url: &url::Url, headers: &reqwest::header::HeaderMap) -> Option<String> {
        let haystack = match self.source {
            ExtractorSource::Path => url.path().to_string(),
            ExtractorSource::Query => url.query().unwrap_or("").to_string(),
            ExtractorSource::Header => headers
                .get(&self.name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string(),
        };
        self.pattern
            .captures(&haystack)
            .and_then(|c| c.get(self.group))
            .map(|m| m.as_str().to_string())
    }
}

mod regex_as_str {
    use regex::Regex;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(re: &Regex, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(re.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Regex, D::Error> {
        let raw = String::deserialize(d)?;
        Regex::new(&raw).map_err(serde::de::Error::custom)
    }
}

/// Field-paths (dotted, evaluated by [`crate::walk`]) mapping a parsed
/// response onto the shared content shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentMapping {
    pub title: Option<String>,
    pub body: Option<String>,
    pub list_items: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Validation {
    pub required_fields: Vec<String>,
    pub min_content_length: usize,
    pub allowed_content_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternMetrics {
    pub success_count: u32,
    pub failure_count: u32,
    pub confidence: f32,
    pub last_success: Option<DateTime<Utc>>,
    pub source_domains: Vec<String>,
}

impl PatternMetrics {
    pub fn new(confidence: f32, success_count: u32) -> Self {
        Self {
            success_count,
            failure_count: 0,
            confidence,
            last_success: None,
            source_domains: Vec::new(),
        }
    }
}

/// A reusable description of how to invoke an underlying API to obtain
/// content equivalent to a rendered page (spec §3 Data Model: API Pattern).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiPattern {
    pub id: PatternId,
    pub tenant_id: TenantId,
    pub template_type: TemplateType,
    #[serde(with = "regex_vec")]
    pub url_patterns: Vec<Regex>,
    pub endpoint_template: String,
    pub extractors: Vec<Extractor>,
    pub method: HttpMethod,
    pub request_headers: Vec<(String, String)>,
    pub response_format: ResponseFormat,
    pub content_mapping: ContentMapping,
    pub validation: Validation,
    pub metrics: PatternMetrics,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

mod regex_vec {
    use regex::Regex;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(res: &[Regex], s: S) -> Result<S::Ok, S::Error> {
        let raw: Vec<&str> = res.iter().map(|r| r.as_str()).collect();
        raw.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Regex>, D::Error> {
        let raw: Vec<String> = Vec::deserialize(d)?;
        raw.into_iter()
            .map(|s| Regex::new(&s).map_err(serde::de::Error::custom))
            .collect()
    }
}

impl ApiPattern {
    pub fn matches(&self, url: &url::Url) -> bool {
        self.url_patterns.iter().any(|re| re.is_match(url.as_str()))
    }

    /// Renders `{param}` placeholders in the endpoint template using the
    /// captured extractor values.
    pub fn render_endpoint(&self, captures: &std::collections::HashMap<String, String>) -> String {
        let mut out = self.endpoint_template.clone();
        for (name, value) in captures {
            out = out.replace(&format!("{{{}}}", name), value);
        }
        out
    }

    /// Eligibility gate from spec §4.3: confidence, min success count, and
    /// success recency must all hold.
    pub fn is_eligible_for_bypass(
        &self,
        threshold: f32,
        min_success_count: u32,
        recency: chrono::Duration,
        now: DateTime<Utc>,
    ) -> bool {
        self.metrics.confidence >= threshold
            && self.metrics.success_count >= min_success_count
            && self
                .metrics
                .last_success
                .map(|ts| now - ts <= recency)
                .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample_pattern() -> ApiPattern {
        ApiPattern {
            id: PatternId::new(),
            tenant_id: TenantId::new("t1"),
            template_type: TemplateType::RestResource,
            url_patterns: vec![Regex::new(r"^https://api\.example\.com/users/[^/]+$").unwrap()],
            endpoint_template: "https://api.example.com/users/{id}".to_string(),
            extractors: vec![Extractor {
                name: "id".to_string(),
                source: ExtractorSource::Path,
                pattern: Regex::new(r"users/([^/?#]+)").unwrap(),
                group: 1,
            }],
            method: HttpMethod::Get,
            request_headers: vec![],
            response_format: ResponseFormat::Json,
            content_mapping: ContentMapping {
                title: Some("name".to_string()),
                body: Some("bio".to_string()),
                list_items: None,
            },
            validation: Validation {
                required_fields: vec!["name".to_string()],
                min_content_length: 1,
                allowed_content_types: vec!["application/json".to_string()],
            },
            metrics: PatternMetrics::new(0.95, 50),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn matches_and_renders_endpoint() {
        let pattern = sample_pattern();
        let url = url::Url::parse("https://api.example.com/users/42").unwrap();
        assert!(pattern.matches(&url));

        let extractor = &pattern.extractors[0];
        let captured = extractor.capture(&url, &reqwest::header::HeaderMap::new()).unwrap();
        assert_eq!(captured, "42");

        let mut captures = HashMap::new();
        captures.insert("id".to_string(), captured);
        assert_eq!(pattern.render_endpoint(&captures), "https://api.example.com/users/42");
    }

    #[test]
    fn eligibility_requires_recent_success() {
        let mut pattern = sample_pattern();
        pattern.metrics.last_success = Some(Utc::now() - chrono::Duration::days(20));
        assert!(!pattern.is_eligible_for_bypass(0.7, 3, chrono::Duration::days(14), Utc::now()));

        pattern.metrics.last_success = Some(Utc::now() - chrono::Duration::days(1));
        assert!(pattern.is_eligible_for_bypass(0.7, 3, chrono::Duration::days(14), Utc::now()));
    }
}
