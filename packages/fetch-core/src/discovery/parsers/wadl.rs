//! WADL parser (spec §9 Design Notes): a small state machine over
//! `<resource>`/`</resource>` tags with self-closing handling, deliberately
//! not nested-regex capture, to avoid catastrophic backtracking on
//! attacker-controlled documents.

use regex::Regex;

use crate::discovery::model::{Endpoint, EndpointParam, ParsedSpec};
use crate::pattern::HttpMethod;

pub const PROBE_PATHS: &[&str] = &["/application.wadl", "/wadl"];

#[derive(Debug, Clone)]
struct ResourceFrame {
    path: String,
}

/// One scan over the document; tracks a stack of open `<resource path="…">`
/// frames to build the full nested path, and records a `<method name="…">`
/// against the frame on top of the stack.
pub fn parse(document: &str) -> Option<ParsedSpec> {
    if !document.contains("<application") {
        return None;
    }

    let base_url = Regex::new(r#"<resources\s+base="([^"]*)""#)
        .ok()
        .and_then(|re| re.captures(document))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    let tag_re = Regex::new(r"<(/?)([a-zA-Z]+)([^>]*?)(/?)>").unwrap();
    let attr_re = Regex::new(r#"([a-zA-Z]+)="([^"]*)""#).unwrap();

    let mut stack: Vec<ResourceFrame> = Vec::new();
    let mut endpoints = Vec::new();

    for cap in tag_re.captures_iter(document) {
        let closing = &cap[1] == "/";
        let tag_name = &cap[2];
        let attrs_raw = &cap[3];
        let self_closing = &cap[4] == "/";

        let attrs: std::collections::HashMap<&str, &str> =
            attr_re.captures_iter(attrs_raw).map(|a| (a.get(1).unwrap().as_str(), a.get(2).unwrap().as_str())).collect();

        match tag_name {
            "resource" if !closing => {
                let segment = attrs.get("path").copied().unwrap_or("");
                let parent = stack.last().map(|f| f.path.clone()).unwrap_or_default();
                let full_path = join_path(&parent, segment);
                if !self_closing {
                    stack.push(ResourceFrame { path: full_path });
                }
            }
            "resource" if closing => {
                stack.pop();
            }
            "method" if !closing => {
                let Some(frame) = stack.last() else { continue };
                let Some(method) = attrs.get("name").and_then(|m| method_from_str(m)) else { continue };
                let path_params = extract_path_params(&frame.path);
                endpoints.push(Endpoint {
                    method,
                    path: frame.path.clone(),
                    path_params,
                    query_params: vec![],
                    request_content_type: None,
                    response_content_type: None,
                    response_schema: None,
                });
            }
            _ => {}
        }
    }

    Some(ParsedSpec { title: None, version: None, base_url, endpoints })
}

fn join_path(parent: &str, segment: &str) -> String {
    let parent = parent.trim_end_matches('/');
    let segment = segment.trim_start_matches('/');
    if parent.is_empty() {
        format!("/{segment}")
    } else {
        format!("{parent}/{segment}")
    }
}

fn extract_path_params(path: &str) -> Vec<EndpointParam> {
    let re = Regex::new(r"\{([^}]+)\}").unwrap();
    re.captures_iter(path).map(|c| EndpointParam { name: c[1].to_string() }).collect()
}

fn method_from_str(s: &str) -> Option<HttpMethod> {
    match s.to_ascii_uppercase().as_str() {
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
    fn builds_nested_resource_path() {
        let doc = r#"
            <application>
              <resources base="https://api.example.com">
                <resource path="users">
                  <resource path="{id}">
                    <method name="GET"/>
                  </resource>
                </resource>
              </resources>
            </application>
        "#;
        let parsed = parse(doc).unwrap();
        assert_eq!(parsed.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(parsed.endpoints.len(), 1);
        assert_eq!(parsed.endpoints[0].path, "/users/{id}");
        assert_eq!(parsed.endpoints[0].path_params[0].name, "id");
    }

    #[test]
    fn non_wadl_document_returns_none() {
        assert!(parse("<html></html>").is_none());
    }
}
