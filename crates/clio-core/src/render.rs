//! The seam to the external rendering engine.
//!
//! Clio does not render reports itself. A [`Renderer`] receives a
//! [`RenderJob`] and writes the finished document into a byte sink; the
//! dispatcher supplies a [`FanOutWriter`](crate::FanOutWriter) so the same
//! bytes reach the client and the optional backup file.

use std::fmt;
use std::io::{self, Write};
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::binder::ParameterMap;
use crate::definition::ReportDefinition;
use crate::format::OutputFormat;

/// Connection settings that replace the report's own data source.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct DataSource {
    /// JDBC-style connection URI.
    pub uri: String,
    /// Database user.
    pub user: String,
    /// Database password.
    pub password: String,
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSource")
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything the engine needs to produce one document.
#[derive(Debug, Clone, Copy)]
pub struct RenderJob<'a> {
    /// The report being rendered.
    pub report: &'a ReportDefinition,
    /// Target format (never unrecognised).
    pub format: OutputFormat,
    /// Bound parameters, including undeclared pass-through keys.
    pub parameters: &'a ParameterMap,
    /// Optional data source override.
    pub data_source: Option<&'a DataSource>,
}

impl RenderJob<'_> {
    /// Returns the server-side report file.
    pub fn file(&self) -> &Path {
        self.report.file_path()
    }
}

/// Errors raised while rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Writing to the output sink failed.
    #[error("failed to write report output: {0}")]
    Io(#[from] io::Error),

    /// The engine rejected or failed the job.
    #[error("rendering engine failed: {message}")]
    Engine {
        /// Engine-provided detail.
        message: String,
    },

    /// A remote engine answered with a non-success status.
    #[error("rendering service returned HTTP {status}: {message}")]
    Upstream {
        /// HTTP status code.
        status: u16,
        /// Response detail.
        message: String,
    },

    /// The engine could not be reached.
    #[error("rendering service unavailable: {message}")]
    Unavailable {
        /// Transport detail.
        message: String,
    },
}

impl RenderError {
    /// Creates an engine error.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// A rendering engine.
///
/// Implementations must accept parameter keys they do not know about.
/// Rendering is one-shot: the dispatcher never retries a failed job.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Renders `job` into `sink`.
    async fn render(
        &self,
        job: RenderJob<'_>,
        sink: &mut (dyn Write + Send),
    ) -> Result<(), RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TypedValue;

    struct Echo;

    #[async_trait]
    impl Renderer for Echo {
        async fn render(
            &self,
            job: RenderJob<'_>,
            sink: &mut (dyn Write + Send),
        ) -> Result<(), RenderError> {
            write!(sink, "{}:{}", job.report.name(), job.format)?;
            for (key, value) in job.parameters {
                write!(sink, ";{key}={value:?}")?;
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_renderer_writes_into_sink() {
        let report = ReportDefinition::new("Sales", "sales.prpt");
        let mut parameters = ParameterMap::new();
        parameters.insert("id".into(), TypedValue::Long(3));
        let job = RenderJob {
            report: &report,
            format: OutputFormat::Txt,
            parameters: &parameters,
            data_source: None,
        };

        let mut out: Vec<u8> = Vec::new();
        Echo.render(job, &mut out).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Sales:TXT;id=Long(3)");
        assert_eq!(job.file(), Path::new("sales.prpt"));
    }

    #[test]
    fn test_data_source_debug_redacts_password() {
        let source = DataSource {
            uri: "jdbc:postgresql://db/reports".into(),
            user: "reporter".into(),
            password: "hunter2".into(),
        };
        let debug = format!("{source:?}");
        assert!(debug.contains("reporter"));
        assert!(!debug.contains("hunter2"));
    }
}
