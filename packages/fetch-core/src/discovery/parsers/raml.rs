//! RAML parser (spec §4.4). RAML is YAML-shaped; rather than pull in a full
//! YAML parser for one discovery source, resource/method headers are
//! line-oriented enough to scan directly — this mirrors the WADL parser's
//! preference for a small scan over heavyweight nested parsing.

use regex::Regex;

use crate::discovery::model::{Endpoint, EndpointParam, ParsedSpec};
use crate::pattern::HttpMethod;

pub const PROBE_PATHS: &[&str] = &["/api.raml", "/raml/api.raml"];

pub fn parse(document: &str) -> Option<ParsedSpec> {
    if !document.trim_start().starts_with("#%RAML") {
        return None;
    }

    let title_re = Regex::new(r"(?m)^title:\s*(.+)$").unwrap();
    let base_uri_re = Regex::new(r"(?m)^baseUri:\s*(.+)$").unwrap();
    let resource_re = Regex::new(r"(?m)^(/[a-zA-Z0-9_\-/{}]*):\s*$").unwrap();
    let method_re = Regex::new(r"(?m)^(\s+)(get|post|put|patch|delete):\s*$").unwrap();
    let param_re = Regex::new(r"\{([^}]+)\}").unwrap();

    let mut endpoints = Vec::new();
    let mut current_path: Option<String> = None;
    let mut current_indent = 0usize;

    for line in document.lines() {
        if let Some(caps) = resource_re.captures(line) {
            current_path = Some(caps[1].to_string());
            current_indent = line.len() - line.trim_start().len();
            continue;
        }
        if let Some(caps) = method_re.captures(line) {
            let indent = caps[1].len();
            if indent <= current_indent {
                continue;
            }
            let Some(path) = &current_path else { continue };
            let Some(method) = method_from_str(&caps[2]) else { continue };
            let path_params = param_re.captures_iter(path).map(|c| EndpointParam { name: c[1].to_string() }).collect();
            endpoints.push(Endpoint {
                method,
                path: path.clone(),
                path_params,
                query_params: vec![],
                request_content_type: None,
                response_content_type: Some("application/json".to_string()),
                response_schema: None,
            });
        }
    }

    Some(ParsedSpec {
        title: title_re.captures(document).map(|c| c[1].trim().to_string()),
        version: None,
        base_url: base_uri_re.captures(document).map(|c| c[1].trim().to_string()),
        endpoints,
    })
}

fn method_from_str(s: &str) -> Option<HttpMethod> {
    match s {
        "get" => Some(HttpMethod::Get),
        "post" => Some(HttpMethod::Post),
        "put" => Some(HttpMethod::Put),
        "patch" => Some(HttpMethod::Patch),
        "delete" => Some(HttpMethod::Delete),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_resource_and_method() {
        let doc = "#%RAML 1.0\ntitle: Example API\nbaseUri: https://api.example.com\n/users/{id}:\n  get:\n    description: fetch a user\n";
        let parsed = parse(doc).unwrap();
        assert_eq!(parsed.title.as_deref(), Some("Example API"));
        assert_eq!(parsed.endpoints.len(), 1);
        assert_eq!(parsed.endpoints[0].path_params[0].name, "id");
    }

    #[test]
    fn non_raml_document_returns_none() {
        assert!(parse("openapi: 3.0.0\n").is_none());
    }
}
