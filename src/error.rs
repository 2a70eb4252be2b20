//! error types
//!
//! structured errors for configuration, document analysis, transport, and
//! json handling. build errors are fatal for the whole pass; runtime errors
//! are scoped to the call that raised them.

use crate::operation::OperationKind;

/// library result type
pub type Result<T> = std::result::Result<T, Error>;

/// message returned to callers for every transport-level failure
pub const SERVER_ERROR_MESSAGE: &str = "Server Error";

/// error type for codegen, client, and server helpers
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url error: {0}")]
    Url(#[from] url::ParseError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse graphql document {path}: {message}")]
    Parse {
        /// document path, relative to the project root
        path: String,
        /// parser message
        message: String,
    },

    #[error("anonymous operation in {path}: every query, mutation, and subscription must be named")]
    AnonymousOperation { path: String },

    #[error("duplicate {kind} \"{name}\" in {first} and {second}")]
    DuplicateOperation {
        kind: OperationKind,
        name: String,
        first: String,
        second: String,
    },

    #[error("{kind} \"{name}\" and \"{other}\" both generate the type name {type_name}")]
    TypeNameCollision {
        kind: OperationKind,
        name: String,
        other: String,
        type_name: String,
    },

    #[error("fragments \"{name}\" and \"{other}\" both generate the type name {type_name}")]
    FragmentTypeNameCollision {
        name: String,
        other: String,
        type_name: String,
    },

    #[error("duplicate fragment \"{name}\" in {first} and {second}")]
    DuplicateFragment {
        name: String,
        first: String,
        second: String,
    },

    #[error("validation error in {path}: {message}")]
    Validation { path: String, message: String },

    /// uniform transport failure; the upstream detail is only logged
    #[error("{}", SERVER_ERROR_MESSAGE)]
    Server {
        /// http status if the upstream answered at all
        status: Option<u16>,
    },
}

impl Error {
    pub(crate) fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// true if the error aborts a generation pass
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::Parse { .. }
                | Error::AnonymousOperation { .. }
                | Error::DuplicateOperation { .. }
                | Error::TypeNameCollision { .. }
                | Error::FragmentTypeNameCollision { .. }
                | Error::DuplicateFragment { .. }
                | Error::Validation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_hides_detail() {
        let err = Error::Server { status: Some(502) };
        assert_eq!(err.to_string(), "Server Error");
        assert!(!err.is_build_error());
    }

    #[test]
    fn test_duplicate_operation_message() {
        let err = Error::DuplicateOperation {
            kind: OperationKind::Query,
            name: "getUser".to_string(),
            first: "a.graphql".to_string(),
            second: "b.graphql".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "duplicate query \"getUser\" in a.graphql and b.graphql"
        );
        assert!(err.is_build_error());
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = Error::Parse {
            path: "queries/broken.graphql".to_string(),
            message: "unexpected end of input".to_string(),
        };
        assert!(err.to_string().contains("queries/broken.graphql"));
    }
}
