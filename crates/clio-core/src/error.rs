//! Error types for catalog entries and per-request outcomes.
//!
//! Two channels are kept apart:
//!
//! - [`DefinitionError`] describes a catalog entry that cannot be built. It is
//!   fatal at startup and never reaches a client.
//! - [`RequestError`] is the expected failure of one request. Every variant has
//!   an HTTP status and a client-safe message, rendered through [`ErrorEnvelope`].

use std::collections::BTreeSet;
use std::path::PathBuf;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::format::{describe_formats, OutputFormat};
use crate::parameter::ParameterType;

/// Result alias for per-request operations.
pub type RequestResult<T> = Result<T, RequestError>;

/// A report definition or resource that violates its invariants.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// Report name is empty.
    #[error("report name must not be empty")]
    EmptyName,

    /// Two parameters share a name.
    #[error("report '{report}' declares parameter '{parameter}' more than once")]
    DuplicateParameter {
        /// Report name.
        report: String,
        /// Duplicated parameter name.
        parameter: String,
    },

    /// The report file does not exist.
    #[error("report '{report}': file not found: {}", .path.display())]
    FileNotFound {
        /// Report name.
        report: String,
        /// Path that was checked.
        path: PathBuf,
    },

    /// Neither GET nor POST is enabled.
    #[error("report '{report}' must enable at least one of GET or POST")]
    NoMethods {
        /// Report name.
        report: String,
    },

    /// No output format is configured.
    #[error("report '{report}' must support at least one output format")]
    NoFormats {
        /// Report name.
        report: String,
    },

    /// The route path is not usable.
    #[error("report '{report}' has an invalid route path '{path}': {reason}")]
    InvalidRoutePath {
        /// Report name.
        report: String,
        /// Offending path.
        path: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Message returned to clients for any generation failure.
pub const GENERATION_FAILED_MESSAGE: &str =
    "Failed to generate report. Please contact the System Administrator.";

/// A per-request failure.
///
/// The `Display` output of each variant is the exact message sent to the
/// client. Underlying causes (engine errors, file paths) stay in the `source`
/// chain and are only logged.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The negotiated format is not offered by the resource.
    #[error("Unsupported output type. This report only supports: {}", describe_formats(.supported))]
    UnsupportedOutputType {
        /// What negotiation produced; `None` if nothing was recognised.
        requested: Option<OutputFormat>,
        /// Formats the resource offers.
        supported: BTreeSet<OutputFormat>,
    },

    /// One or more mandatory parameters were not supplied.
    #[error(
        "Please provide all required parameters. The following required parameters not provided: {}",
        .missing.join(",")
    )]
    MissingRequiredParameters {
        /// Missing names, sorted.
        missing: Vec<String>,
    },

    /// A supplied value does not parse as its declared type.
    #[error("Invalid value for parameter '{name}': expected {expected}")]
    ParameterCoercion {
        /// Parameter name.
        name: String,
        /// Declared type.
        expected: ParameterType,
        /// Rejected raw value (logged, not echoed).
        value: String,
    },

    /// The query string or form body could not be decoded.
    #[error("Malformed request parameters")]
    MalformedParameters {
        /// Decoder error.
        #[source]
        source: serde_urlencoded::de::Error,
    },

    /// The request body could not be read.
    #[error("Failed to read request body")]
    BodyRead {
        /// Transport detail (logged, not echoed).
        message: String,
    },

    /// The request body is larger than the server accepts.
    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge {
        /// Accepted size in bytes.
        limit: usize,
    },

    /// The rendering engine or an output sink failed.
    #[error("{}", GENERATION_FAILED_MESSAGE)]
    Generation {
        /// Underlying cause.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Credentials missing or rejected.
    #[error("Not Authorized to access this report")]
    Unauthorized,

    /// No route matches the path.
    #[error("Resource not found: {path}")]
    NotFound {
        /// Request path.
        path: String,
    },

    /// The path exists but not for this method.
    #[error("Method {method} not allowed for {path}")]
    MethodNotAllowed {
        /// Request method.
        method: String,
        /// Request path.
        path: String,
        /// Methods registered for the path.
        allowed: Vec<String>,
    },

    /// The request exceeded the configured timeout.
    #[error("Request timed out")]
    Timeout,
}

impl RequestError {
    /// Wraps a generation failure.
    pub fn generation(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Generation {
            source: source.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Returns the HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnsupportedOutputType { .. }
            | Self::MissingRequiredParameters { .. }
            | Self::ParameterCoercion { .. }
            | Self::MalformedParameters { .. }
            | Self::BodyRead { .. } => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Generation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Returns a short, stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedOutputType { .. } => "unsupported_output_type",
            Self::MissingRequiredParameters { .. } => "missing_required_parameters",
            Self::ParameterCoercion { .. } => "parameter_coercion",
            Self::MalformedParameters { .. } => "malformed_parameters",
            Self::BodyRead { .. } => "body_read",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::Generation { .. } => "generation",
            Self::Unauthorized => "unauthorized",
            Self::NotFound { .. } => "not_found",
            Self::MethodNotAllowed { .. } => "method_not_allowed",
            Self::Timeout => "timeout",
        }
    }

    /// Builds the JSON envelope sent to the client.
    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope::new(self.to_string())
    }
}

/// JSON body of every error response: `{"message": "...", "error": true}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Client-facing message.
    pub message: String,
    /// Always `true`.
    pub error: bool,
}

impl ErrorEnvelope {
    /// Creates an error envelope.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_unsupported_output_type_message() {
        let err = RequestError::UnsupportedOutputType {
            requested: Some(OutputFormat::Pdf),
            supported: [OutputFormat::Html].into_iter().collect(),
        };
        assert_eq!(
            err.to_string(),
            "Unsupported output type. This report only supports: [HTML]"
        );
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_missing_parameters_message() {
        let err = RequestError::MissingRequiredParameters {
            missing: vec!["report_id".into(), "subreport_1".into()],
        };
        assert!(err
            .to_string()
            .ends_with("not provided: report_id,subreport_1"));
    }

    #[test]
    fn test_generation_message_hides_cause() {
        let cause = io::Error::new(io::ErrorKind::AlreadyExists, "/var/backups/1-sales.pdf");
        let err = RequestError::generation(cause);

        assert_eq!(err.to_string(), GENERATION_FAILED_MESSAGE);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.envelope().message.contains("/var/backups"));
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("/var/backups"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(RequestError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            RequestError::not_found("/x").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(RequestError::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);

        let err = RequestError::BodyRead {
            message: "connection reset".into(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.kind(), "body_read");
        assert_eq!(err.to_string(), "Failed to read request body");

        let err = RequestError::PayloadTooLarge { limit: 1024 };
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.kind(), "payload_too_large");
        assert_eq!(err.to_string(), "Request body exceeds 1024 bytes");
    }

    #[test]
    fn test_envelope_shape() {
        let json = serde_json::to_value(RequestError::Unauthorized.envelope()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"message": "Not Authorized to access this report", "error": true})
        );
    }
}
