//! graphql types
//!
//! wrappers for graphql responses and errors. responses keep any additional
//! top-level fields added by a server response hook.

use serde::{Deserialize, Serialize};

/// graphql response wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQlResponse<T> {
    /// response data as returned by the server (may be null)
    pub data: Option<T>,
    /// graphql errors array
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQlError>,
    /// user-defined additional fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl<T> GraphQlResponse<T> {
    /// true if the response contains graphql errors
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// graphql error entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQlError {
    /// error message
    pub message: String,
    /// error locations in the query
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<GraphQlLocation>,
    /// response path
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<serde_json::Value>,
    /// optional extensions payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

impl std::fmt::Display for GraphQlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// graphql error location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQlLocation {
    /// line number (1-based)
    pub line: i64,
    /// column number (1-based)
    pub column: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_errors() {
        let ok: GraphQlResponse<serde_json::Value> =
            serde_json::from_value(serde_json::json!({"data": {"ok": true}})).unwrap();
        assert!(!ok.has_errors());

        let err: GraphQlResponse<serde_json::Value> = serde_json::from_value(serde_json::json!({
            "data": null,
            "errors": [{"message": "x", "path": ["y"]}]
        }))
        .unwrap();
        assert!(err.has_errors());
        assert!(err.data.is_none());
        assert_eq!(err.errors[0].path, vec![serde_json::json!("y")]);
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: String,
    }

    #[test]
    fn test_typed_data_without_default() {
        let response: GraphQlResponse<User> =
            serde_json::from_value(serde_json::json!({"data": {"id": "1"}})).unwrap();
        assert_eq!(
            response.data,
            Some(User {
                id: "1".to_string()
            })
        );

        let missing: GraphQlResponse<User> =
            serde_json::from_value(serde_json::json!({"errors": [{"message": "x"}]})).unwrap();
        assert!(missing.data.is_none());
        assert!(missing.has_errors());
    }

    #[test]
    fn test_extra_fields_survive() {
        let response: GraphQlResponse<serde_json::Value> =
            serde_json::from_value(serde_json::json!({
                "data": {"ok": true},
                "__cacheTags": ["user:1"]
            }))
            .unwrap();
        assert_eq!(
            response.extra.get("__cacheTags"),
            Some(&serde_json::json!(["user:1"]))
        );

        let back = serde_json::to_value(&response).unwrap();
        assert_eq!(back["__cacheTags"], serde_json::json!(["user:1"]));
        assert!(back.get("errors").is_none());
    }
}
