//! OpenAPI/Swagger document parser (spec §4.4).

use serde_json::Value;

use crate::discovery::model::{Endpoint, EndpointParam, ParsedSpec};
use crate::pattern::HttpMethod;

pub const PROBE_PATHS: &[&str] = &["/openapi.json", "/swagger.json", "/.well-known/openapi", "/v2/api-docs", "/api/openapi.json"];

pub fn parse(body: &Value) -> Option<ParsedSpec> {
    let paths = body.get("paths")?.as_object()?;
    let info = body.get("info");
    let base_url = body
        .get("servers")
        .and_then(|s| s.as_array())
        .and_then(|arr| arr.first())
        .and_then(|s| s.get("url"))
        .and_then(|u| u.as_str())
        .map(String::from);

    let mut endpoints = Vec::new();
    for (path, methods) in paths {
        let Some(methods) = methods.as_object() else { continue };
        for (method_str, operation) in methods {
            let Some(method) = method_from_str(method_str) else { continue };
            let path_params: Vec<EndpointParam> = operation
                .get("parameters")
                .and_then(|p| p.as_array())
                .map(|params| {
                    params
                        .iter()
                        .filter(|p| p.get("in").and_then(|v| v.as_str()) == Some("path"))
                        .filter_map(|p| p.get("name").and_then(|n| n.as_str()).map(|n| EndpointParam { name: n.to_string() }))
                        .collect()
                })
                .unwrap_or_default();
            let query_params: Vec<EndpointParam> = operation
                .get("parameters")
                .and_then(|p| p.as_array())
                .map(|params| {
                    params
                        .iter()
                        .filter(|p| p.get("in").and_then(|v| v.as_str()) == Some("query"))
                        .filter_map(|p| p.get("name").and_then(|n| n.as_str()).map(|n| EndpointParam { name: n.to_string() }))
                        .collect()
                })
                .unwrap_or_default();

            endpoints.push(Endpoint {
                method,
                path: path.clone(),
                path_params,
                query_params,
                request_content_type: Some("application/json".to_string()),
                response_content_type: Some("application/json".to_string()),
                response_schema: operation
                    .pointer("/responses/200/content/application~1json/schema")
                    .cloned(),
            });
        }
    }

    Some(ParsedSpec {
        title: info.and_then(|i| i.get("title")).and_then(|t| t.as_str()).map(String::from),
        version: info.and_then(|i| i.get("version")).and_then(|v| v.as_str()).map(String::from),
        base_url,
        endpoints,
    })
}

fn method_from_str(s: &str) -> Option<HttpMethod> {
    match s.to_ascii_lowercase().as_str() {
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
    use serde_json::json;

    #[test]
    fn parses_paths_and_path_params() {
        let doc = json!({
            "info": {"title": "Example API", "version": "1.0"},
            "servers": [{"url": "https://api.example.com"}],
            "paths": {
                "/users/{id}": {
                    "get": {
                        "parameters": [{"name": "id", "in": "path"}]
                    }
                }
            }
        });
        let parsed = parse(&doc).unwrap();
        assert_eq!(parsed.title.as_deref(), Some("Example API"));
        assert_eq!(parsed.endpoints.len(), 1);
        assert_eq!(parsed.endpoints[0].path_params[0].name, "id");
    }

    #[test]
    fn non_openapi_body_returns_none() {
        let doc = json!({"hello": "world"});
        assert!(parse(&doc).is_none());
    }
}
