pub mod blueprint;
pub mod graphql;
pub mod link;
pub mod openapi;
pub mod raml;
pub mod wadl;

use regex::Regex;

use crate::ids::TenantId;
use crate::pattern::model::*;
use crate::pattern::ApiPattern;

use super::model::{DiscoverySource, Endpoint, ParsedSpec};

/// Compiles a parsed spec's endpoints into API Patterns (spec §4.4,
/// "Parser contracts"): URL pattern = escaped domain + templated path (with
/// `{param}` -> `[^/]+`); one extractor per path param; initial confidence =
/// source prior; initial successCount = 50.
pub fn compile_endpoints(
    tenant: &TenantId,
    domain: &str,
    base_url: &str,
    endpoints: &[Endpoint],
    source: DiscoverySource,
) -> Vec<ApiPattern> {
    endpoints
        .iter()
        .map(|ep| compile_one(tenant, domain, base_url, ep, source))
        .collect()
}

fn compile_one(tenant: &TenantId, domain: &str, base_url: &str, ep: &Endpoint, source: DiscoverySource) -> ApiPattern {
    let escaped_domain = regex::escape(domain);
    let mut pattern_path = regex::escape(&ep.path);
    for param in &ep.path_params {
        // `ep.path` has already been through `regex::escape`, so its braces
        // are backslash-escaped literals: `{id}` -> `\{id\}`.
        let escaped_token = format!("\\{{{}\\}}", param.name);
        pattern_path = pattern_path.replace(&escaped_token, "[^/]+");
    }
    let url_regex = Regex::new(&format!("^https?://{escaped_domain}{pattern_path}$"))
        .unwrap_or_else(|_| Regex::new(&format!("^https?://{escaped_domain}")).unwrap());

    let extractors = ep
        .path_params
        .iter()
        .enumerate()
        .map(|(i, p)| Extractor {
            name: p.name.clone(),
            source: ExtractorSource::Path,
            pattern: Regex::new(r"([^/?#]+)").unwrap(),
            group: i + 1,
        })
        .collect();

    ApiPattern {
        id: crate::ids::PatternId::new(),
        tenant_id: tenant.clone(),
        template_type: TemplateType::RestResource,
        url_patterns: vec![url_regex],
        endpoint_template: format!("{}{}", base_url.trim_end_matches('/'), ep.path),
        extractors,
        method: ep.method,
        request_headers: vec![],
        response_format: ResponseFormat::Json,
        content_mapping: ContentMapping::default(),
        validation: Validation::default(),
        metrics: PatternMetrics::new(source.confidence_prior(), source.initial_success_count()),
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::model::EndpointParam;

    #[test]
    fn compiles_path_param_into_regex_and_extractor() {
        let tenant = TenantId::new("t1");
        let endpoints = vec![Endpoint {
            method: HttpMethod::Get,
            path: "/users/{id}".to_string(),
            path_params: vec![EndpointParam { name: "id".to_string() }],
            query_params: vec![],
            request_content_type: None,
            response_content_type: Some("application/json".to_string()),
            response_schema: None,
        }];
        let patterns = compile_endpoints(&tenant, "api.example.com", "https://api.example.com", &endpoints, DiscoverySource::OpenApi);
        assert_eq!(patterns.len(), 1);
        let p = &patterns[0];
        assert_eq!(p.extractors.len(), 1);
        assert_eq!(p.metrics.success_count, 50);
        let url = url::Url::parse("https://api.example.com/users/42").unwrap();
        assert!(p.matches(&url));
    }
}
