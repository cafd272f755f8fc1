//! RFC 8288 `Link` header parsing plus hypermedia-format fingerprinting
//! (spec §4.4).

use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRelation {
    pub href: String,
    pub rel: String,
    pub link_type: Option<String>,
}

/// Parses a `Link:` header value, respecting RFC 8288's balanced
/// angle-bracket and escaped-quote rules. Multiple comma-separated link
/// values are supported; commas inside quoted parameter values don't split.
pub fn parse_link_header(value: &str) -> Vec<LinkRelation> {
    let mut out = Vec::new();
    for raw in split_top_level_commas(value) {
        let raw = raw.trim();
        let Some(href_end) = raw.find('>') else { continue };
        if !raw.starts_with('<') {
            continue;
        }
        let href = raw[1..href_end].to_string();
        let params_str = &raw[href_end + 1..];

        let mut rel = String::new();
        let mut link_type = None;
        for param in params_str.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            if let Some((key, val)) = param.split_once('=') {
                let val = val.trim().trim_matches('"').replace("\\\"", "\"");
                match key.trim() {
                    "rel" => rel = val,
                    "type" => link_type = Some(val),
                    _ => {}
                }
            }
        }
        if !rel.is_empty() {
            out.push(LinkRelation { href, rel: normalize_rel(&rel), link_type });
        }
    }
    out
}

fn normalize_rel(rel: &str) -> String {
    // spec §4.4: "previous" -> "prev"
    if rel == "previous" {
        "prev".to_string()
    } else {
        rel.to_string()
    }
}

fn split_top_level_commas(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_quotes = false;
    let mut start = 0usize;
    let bytes = value.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'<' if !in_quotes => depth += 1,
            b'>' if !in_quotes => depth -= 1,
            b'"' => in_quotes = !in_quotes,
            b',' if depth == 0 && !in_quotes => {
                parts.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HypermediaFormat {
    Hal,
    JsonApi,
    Siren,
    CollectionPlusJson,
    Hydra,
    Unknown,
}

/// Fingerprints a JSON body to detect which hypermedia convention it uses
/// (spec §4.4).
pub fn fingerprint(body: &Value) -> HypermediaFormat {
    if body.get("_links").is_some() {
        return HypermediaFormat::Hal;
    }
    if let Some(data) = body.get("data") {
        let has_type_and_id = |v: &Value| v.get("type").is_some() && v.get("id").is_some();
        let matches = match data {
            Value::Object(_) => has_type_and_id(data),
            Value::Array(arr) => arr.first().map(has_type_and_id).unwrap_or(false),
            _ => false,
        };
        if matches {
            return HypermediaFormat::JsonApi;
        }
    }
    if body.get("class").is_some() && body.get("links").and_then(|l| l.as_array()).is_some() {
        return HypermediaFormat::Siren;
    }
    if body.pointer("/collection/href").is_some() {
        return HypermediaFormat::CollectionPlusJson;
    }
    if body
        .get("@context")
        .and_then(|c| c.as_str())
        .map(|c| c.to_lowercase().contains("hydra"))
        .unwrap_or(false)
    {
        return HypermediaFormat::Hydra;
    }
    HypermediaFormat::Unknown
}

pub fn pagination_rels(links: &[LinkRelation]) -> HashMap<String, &LinkRelation> {
    links
        .iter()
        .filter(|l| matches!(l.rel.as_str(), "next" | "prev" | "first" | "last"))
        .map(|l| (l.rel.clone(), l))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_multiple_links_with_quoted_params() {
        let header = r#"<https://api.example.com/items?page=2>; rel="next", <https://api.example.com/items?page=1>; rel="previous""#;
        let links = parse_link_header(header);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].rel, "next");
        assert_eq!(links[1].rel, "prev");
    }

    #[test]
    fn fingerprints_hal() {
        let body = json!({"_links": {"self": {"href": "/x"}}});
        assert_eq!(fingerprint(&body), HypermediaFormat::Hal);
    }

    #[test]
    fn fingerprints_json_api() {
        let body = json!({"data": {"type": "articles", "id": "1"}});
        assert_eq!(fingerprint(&body), HypermediaFormat::JsonApi);
    }

    #[test]
    fn fingerprints_hydra() {
        let body = json!({"@context": "http://www.w3.org/ns/hydra/context.jsonld"});
        assert_eq!(fingerprint(&body), HypermediaFormat::Hydra);
    }
}
