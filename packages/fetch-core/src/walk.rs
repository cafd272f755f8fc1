//! Typed traversal over `serde_json::Value`, replacing the source's
//! free-form map access (spec §9 Design Notes). Every content-mapping
//! selector (`ApiPattern::content_mapping`, `Extraction`'s field paths) is a
//! dotted path evaluated here. Unknown paths resolve to `None`, never an
//! error — a missing field in one response shape must not poison an
//! otherwise-successful extraction.

use serde_json::Value;

/// Evaluate a dotted path (`"data.user.name"`) against a JSON value.
/// Array indices are supported as numeric segments (`"items.0.title"`).
pub fn walk<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(arr) => {
                let idx: usize = segment.parse().ok()?;
                arr.get(idx)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Like [`walk`] but coerces the result to a string for content-mapping
/// fields (`title`, `body`) that are declared as strings in the schema.
pub fn walk_str<'a>(value: &'a Value, path: &str) -> Option<&'a str> {
    walk(value, path)?.as_str()
}

/// Walk a path expected to hold an array (`listItems`), returning an empty
/// slice rather than `None` for anything other than a present array so
/// callers can iterate unconditionally.
pub fn walk_array<'a>(value: &'a Value, path: &str) -> &'a [Value] {
    match walk(value, path) {
        Some(Value::Array(arr)) => arr,
        _ => &[],
    }
}

/// Recursively collect every object key name down to `max_depth`, used by
/// the Workflow Optimizer's field-coverage computation (spec §4.8).
pub fn field_names(value: &Value, max_depth: usize) -> std::collections::HashSet<String> {
    let mut out = std::collections::HashSet::new();
    collect_field_names(value, max_depth, &mut out);
    out
}

fn collect_field_names(value: &Value, depth_remaining: usize, out: &mut std::collections::HashSet<String>) {
    if depth_remaining == 0 {
        return;
    }
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                out.insert(k.clone());
                collect_field_names(v, depth_remaining - 1, out);
            }
        }
        Value::Array(arr) => {
            for v in arr {
                collect_field_names(v, depth_remaining, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn walks_nested_paths() {
        let v = json!({"data": {"user": {"name": "Ada"}}});
        assert_eq!(walk_str(&v, "data.user.name"), Some("Ada"));
    }

    #[test]
    fn unknown_path_is_none_not_error() {
        let v = json!({"data": {}});
        assert_eq!(walk(&v, "data.user.name"), None);
        assert_eq!(walk(&v, "totally.missing"), None);
    }

    #[test]
    fn walks_array_indices() {
        let v = json!({"items": [{"title": "a"}, {"title": "b"}]});
        assert_eq!(walk_str(&v, "items.1.title"), Some("b"));
    }

    #[test]
    fn field_names_respects_depth() {
        let v = json!({"a": {"b": {"c": 1}}});
        let names = field_names(&v, 2);
        assert!(names.contains("a"));
        assert!(names.contains("b"));
        assert!(!names.contains("c"));
    }
}
