//! GraphQL introspection parser (spec §4.4): classifies types as entity vs
//! connection, emits one pattern-shaped endpoint per query field.

use serde_json::Value;

use crate::discovery::model::{Endpoint, EndpointParam, ParsedSpec};
use crate::pattern::HttpMethod;

pub const INTROSPECTION_QUERY: &str = r#"query IntrospectionQuery { __schema { queryType { name fields { name args { name } } } } }"#;

pub const PROBE_PATHS: &[&str] = &["/graphql", "/api/graphql", "/query", "/gql"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldShape {
    Entity,
    Connection,
}

pub fn classify_field(field: &Value) -> FieldShape {
    let type_name = field
        .pointer("/type/name")
        .or_else(|| field.pointer("/type/ofType/name"))
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if type_name.ends_with("Connection") {
        FieldShape::Connection
    } else {
        FieldShape::Entity
    }
}

/// Parses a standard introspection response into query-field endpoints,
/// one pattern per field, `templateType = query-api` (the caller sets that
/// on the compiled `ApiPattern`).
pub fn parse(introspection_response: &Value) -> Option<ParsedSpec> {
    let fields = introspection_response.pointer("/data/__schema/queryType/fields")?.as_array()?;

    let endpoints = fields
        .iter()
        .filter_map(|field| {
            let name = field.get("name")?.as_str()?;
            let path_params = field
                .get("args")
                .and_then(|a| a.as_array())
                .map(|args| {
                    args.iter()
                        .filter_map(|a| a.get("name").and_then(|n| n.as_str()).map(|n| EndpointParam { name: n.to_string() }))
                        .collect()
                })
                .unwrap_or_default();
            Some(Endpoint {
                method: HttpMethod::Post,
                path: format!("#{name}"),
                path_params: vec![],
                query_params: path_params,
                request_content_type: Some("application/json".to_string()),
                response_content_type: Some("application/json".to_string()),
                response_schema: None,
            })
        })
        .collect();

    Some(ParsedSpec { title: Some("graphql".to_string()), version: None, base_url: None, endpoints })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_connection_vs_entity() {
        let entity_field = json!({"name": "user", "type": {"name": "User"}});
        let conn_field = json!({"name": "users", "type": {"name": "UserConnection"}});
        assert_eq!(classify_field(&entity_field), FieldShape::Entity);
        assert_eq!(classify_field(&conn_field), FieldShape::Connection);
    }

    #[test]
    fn parses_introspection_fields_into_endpoints() {
        let response = json!({
            "data": {
                "__schema": {
                    "queryType": {
                        "name": "Query",
                        "fields": [{"name": "user", "args": [{"name": "id"}], "type": {"name": "User"}}]
                    }
                }
            }
        });
        let parsed = parse(&response).unwrap();
        assert_eq!(parsed.endpoints.len(), 1);
        assert_eq!(parsed.endpoints[0].query_params[0].name, "id");
    }
}
