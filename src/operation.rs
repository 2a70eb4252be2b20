//! operation kinds and the typed operation contract
//!
//! [`OperationKind`] is shared by the build pipeline and the runtime client.
//! [`TypedOperation`] is implemented by generated bindings so that the
//! operation name is checked by the compiler, not at runtime.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// graphql operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    /// every kind, in output order
    pub const ALL: [OperationKind; 3] = [
        OperationKind::Query,
        OperationKind::Mutation,
        OperationKind::Subscription,
    ];

    /// lowercase keyword as used in documents and endpoint paths
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
            OperationKind::Subscription => "subscription",
        }
    }

    /// suffix appended to generated type names
    pub fn type_suffix(&self) -> &'static str {
        match self {
            OperationKind::Query => "Query",
            OperationKind::Mutation => "Mutation",
            OperationKind::Subscription => "Subscription",
        }
    }

    /// parse an endpoint path segment
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "query" => Some(OperationKind::Query),
            "mutation" => Some(OperationKind::Mutation),
            "subscription" => Some(OperationKind::Subscription),
            _ => None,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// build the endpoint path for an operation, e.g. `/api/mw/query/getUser`
pub fn endpoint_path(prefix: &str, kind: OperationKind, name: &str) -> String {
    format!("{}/{}/{}", prefix.trim_end_matches('/'), kind.as_str(), name)
}

/// graphql operation contract for generated bindings
pub trait TypedOperation {
    /// operation name as written in the document
    const NAME: &'static str;
    /// operation kind
    const KIND: OperationKind;
    /// variables payload
    type Variables: Serialize;
    /// response payload type
    type Response: DeserializeOwned;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_path() {
        assert_eq!(
            endpoint_path("/api/mw", OperationKind::Query, "getUser"),
            "/api/mw/query/getUser"
        );
        assert_eq!(
            endpoint_path("/api/mw/", OperationKind::Mutation, "createUser"),
            "/api/mw/mutation/createUser"
        );
    }

    #[test]
    fn test_segment_round_trip() {
        for kind in OperationKind::ALL {
            assert_eq!(OperationKind::from_segment(kind.as_str()), Some(kind));
        }
        assert_eq!(OperationKind::from_segment("fragment"), None);
    }
}
