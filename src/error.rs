//! Unified error type.

use thiserror::Error as ThisError;

/// The error type returned by route-schema's fallible operations.
///
/// Request-level failures (a body that does not match its schema, an
/// unknown route) are expressed as HTTP [`Response`](crate::Response)
/// values, not as `Error`s. This type surfaces setup problems: bad route
/// patterns, schemas that do not compile, and infrastructure failures such
/// as binding to a port.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{0}`")]
    InvalidAddr(String),

    #[error("invalid route `{route}`: {source}")]
    InvalidRoute {
        route: String,
        #[source]
        source: matchit::InsertError,
    },

    #[error("invalid method `{0}`")]
    InvalidMethod(String),

    /// A schema field held a string that is not valid JSON.
    ///
    /// Only raised when strict schema loading is enabled; otherwise the
    /// schema is treated as absent.
    #[error("malformed schema for route `{route}`: {source}")]
    MalformedSchema {
        route: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("schema for route `{route}` does not compile: {reason}")]
    SchemaCompile { route: String, reason: String },

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}
