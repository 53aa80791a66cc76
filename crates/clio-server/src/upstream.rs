//! Rendering engine reached over HTTP.
//!
//! Each job is POSTed as JSON to the configured URL; the response body is the
//! rendered document and is streamed chunk by chunk into the sink.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use clio_config::RendererConfig;
use clio_core::{DataSource, OutputFormat, ParameterMap, RenderError, RenderJob, Renderer};
use reqwest::Client;
use serde::Serialize;

use crate::error::ServerResult;

/// Body of a render request.
#[derive(Debug, Serialize)]
pub struct RenderPayload<'a> {
    /// Report name.
    pub report: &'a str,
    /// Server-side report file.
    pub file: &'a Path,
    /// Requested format.
    pub format: OutputFormat,
    /// Bound parameters.
    pub parameters: &'a ParameterMap,
    /// Data source override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<&'a DataSource>,
}

impl<'a> From<&RenderJob<'a>> for RenderPayload<'a> {
    fn from(job: &RenderJob<'a>) -> Self {
        Self {
            report: job.report.name(),
            file: job.report.file_path(),
            format: job.format,
            parameters: job.parameters,
            database: job.data_source,
        }
    }
}

/// A [`Renderer`] that forwards jobs to a rendering service.
#[derive(Debug, Clone)]
pub struct UpstreamRenderer {
    client: Client,
    url: String,
    timeout: Duration,
}

impl UpstreamRenderer {
    /// Creates a renderer for the configured service.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &RendererConfig) -> ServerResult<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            timeout,
        })
    }

    /// Returns the service URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the per-job timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Renderer for UpstreamRenderer {
    async fn render(
        &self,
        job: RenderJob<'_>,
        sink: &mut (dyn Write + Send),
    ) -> Result<(), RenderError> {
        let payload = RenderPayload::from(&job);
        tracing::debug!(url = %self.url, report = payload.report, format = %payload.format, "Sending render job");

        let mut response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RenderError::unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RenderError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| RenderError::unavailable(e.to_string()))?
        {
            sink.write_all(&chunk)?;
        }
        sink.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clio_core::{ReportDefinition, TypedValue};

    #[test]
    fn test_payload_shape() {
        let report = ReportDefinition::new("Sales", "/srv/reports/sales.prpt");
        let mut parameters = ParameterMap::new();
        parameters.insert("id".into(), TypedValue::Long(42));
        let job = RenderJob {
            report: &report,
            format: OutputFormat::Pdf,
            parameters: &parameters,
            data_source: None,
        };

        let json = serde_json::to_value(RenderPayload::from(&job)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "report": "Sales",
                "file": "/srv/reports/sales.prpt",
                "format": "PDF",
                "parameters": { "id": 42 }
            })
        );
    }

    #[test]
    fn test_payload_includes_database() {
        let report = ReportDefinition::new("Sales", "sales.prpt");
        let parameters = ParameterMap::new();
        let source = DataSource {
            uri: "jdbc:postgresql://db/reports".into(),
            user: "reporter".into(),
            password: "secret".into(),
        };
        let job = RenderJob {
            report: &report,
            format: OutputFormat::Txt,
            parameters: &parameters,
            data_source: Some(&source),
        };

        let json = serde_json::to_value(RenderPayload::from(&job)).unwrap();
        assert_eq!(json["database"]["user"], "reporter");
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let renderer = UpstreamRenderer::new(&RendererConfig {
            url: "http://127.0.0.1:9/render".into(),
            timeout_secs: 2,
        })
        .unwrap();
        let report = ReportDefinition::new("Sales", "sales.prpt");
        let parameters = ParameterMap::new();
        let job = RenderJob {
            report: &report,
            format: OutputFormat::Html,
            parameters: &parameters,
            data_source: None,
        };

        let mut out = Vec::new();
        let err = renderer.render(job, &mut out).await.unwrap_err();
        assert!(matches!(err, RenderError::Unavailable { .. }));
        assert!(out.is_empty());
    }
}
