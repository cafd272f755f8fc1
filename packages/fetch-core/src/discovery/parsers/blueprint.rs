//! API Blueprint parser (spec §4.4). Blueprint documents are Markdown with
//! a fixed header grammar (`## Title [METHOD /path]`); scanned line by line
//! rather than parsed as full Markdown.

use regex::Regex;

use crate::discovery::model::{Endpoint, EndpointParam, ParsedSpec};
use crate::pattern::HttpMethod;

pub const PROBE_PATHS: &[&str] = &["/blueprint.apib", "/apiary.apib"];

pub fn parse(document: &str) -> Option<ParsedSpec> {
    if !document.trim_start().starts_with("FORMAT:") {
        return None;
    }

    let title_re = Regex::new(r"(?m)^#\s+(.+)$").unwrap();
    let host_re = Regex::new(r"(?m)^HOST:\s*(.+)$").unwrap();
    let action_re = Regex::new(r"(?m)^#{2,3}\s*.*\[([A-Z]+)\s+([^\]]+)\]\s*$").unwrap();
    let param_re = Regex::new(r"\{([^}]+)\}").unwrap();

    let endpoints = action_re
        .captures_iter(document)
        .filter_map(|caps| {
            let method = method_from_str(&caps[1])?;
            let path = caps[2].trim().to_string();
            let path_params = param_re.captures_iter(&path).map(|c| EndpointParam { name: c[1].to_string() }).collect();
            Some(Endpoint {
                method,
                path,
                path_params,
                query_params: vec![],
                request_content_type: None,
                response_content_type: Some("application/json".to_string()),
                response_schema: None,
            })
        })
        .collect();

    Some(ParsedSpec {
        title: title_re.captures(document).map(|c| c[1].trim().to_string()),
        version: None,
        base_url: host_re.captures(document).map(|c| c[1].trim().to_string()),
        endpoints,
    })
}

fn method_from_str(s: &str) -> Option<HttpMethod> {
    match s {
        "GET" => Some(HttpMethod::Get),
        "POST" => Some(HttpMethod::Post),
        "PUT" => Some(HttpMethod::Put),
        "PATCH" => Some(HttpMethod::Patch),
        "DELETE" => Some(HttpMethod::Delete),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_action_header_into_endpoint() {
        let doc = "FORMAT: 1A\nHOST: https://api.example.com\n\n# Example API\n\n## User [GET /users/{id}]\n\n+ Response 200\n";
        let parsed = parse(doc).unwrap();
        assert_eq!(parsed.title.as_deref(), Some("Example API"));
        assert_eq!(parsed.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(parsed.endpoints.len(), 1);
        assert_eq!(parsed.endpoints[0].path, "/users/{id}");
    }

    #[test]
    fn non_blueprint_document_returns_none() {
        assert!(parse("# just markdown\n").is_none());
    }
}
