//! Error types for the Clio server.

use std::path::PathBuf;

use clio_config::ConfigError;
use clio_core::DefinitionError;
use thiserror::Error;

/// Errors raised while compiling the report catalog into a route table.
///
/// All of them are fatal: the server refuses to start rather than serve a
/// partial catalog.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A report entry is malformed.
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// A report route collides with a built-in endpoint.
    #[error("report '{report}' uses reserved path '{path}'")]
    ReservedPath {
        /// Report name.
        report: String,
        /// The reserved path.
        path: String,
    },

    /// Two reports register the same method and path.
    #[error("route {method} {path} is registered by both '{first}' and '{second}'")]
    DuplicateRoute {
        /// HTTP method.
        method: String,
        /// Concrete path.
        path: String,
        /// Report that registered the route first.
        first: String,
        /// Report that tried to register it again.
        second: String,
    },

    /// The report file does not exist, even after base-directory resolution.
    #[error("report '{report}': file not found: {}", .path.display())]
    ReportFileNotFound {
        /// Report name.
        report: String,
        /// The path as configured.
        path: PathBuf,
    },
}

/// Errors raised while running the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: std::net::SocketAddr,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration cannot be turned into a server.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The OpenAPI document could not be serialized.
    #[error("failed to build OpenAPI document: {0}")]
    OpenApi(#[from] serde_json::Error),

    /// The rendering service client could not be built.
    #[error("failed to create rendering service client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Result type for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_route_display() {
        let err = CompileError::DuplicateRoute {
            method: "GET".into(),
            path: "/sales.pdf".into(),
            first: "Sales".into(),
            second: "Sales Copy".into(),
        };
        assert_eq!(
            err.to_string(),
            "route GET /sales.pdf is registered by both 'Sales' and 'Sales Copy'"
        );
    }

    #[test]
    fn test_definition_error_is_transparent() {
        let err = CompileError::from(DefinitionError::EmptyName);
        assert_eq!(err.to_string(), DefinitionError::EmptyName.to_string());
    }
}
