//! Per-request report generation.
//!
//! A request moves through `routed -> negotiated -> validated -> generating ->
//! done`, and can fail at any step. Negotiation and binding failures are 400s.
//! Anything that goes wrong once generation has started is reported to the
//! client with the generic generation message; the cause is only logged.
//!
//! Generation is never retried: a failed attempt may already have written
//! part of a backup file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use clio_core::{
    bind, negotiate_for, DataSource, FanOutWriter, OutputFormat, QueryParams, RenderError,
    RenderJob, Renderer, ReportResource, RequestError, SharedBuffer,
};
use clio_telemetry::metrics::{record_backup, record_generation, Outcome};

use crate::backup::BackupTarget;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A generated report, ready to send.
#[derive(Debug, Clone)]
pub struct RenderedReport {
    /// Negotiated format.
    pub format: OutputFormat,
    /// Document bytes.
    pub body: Bytes,
    /// Backup file written alongside the response, if any.
    pub backup: Option<PathBuf>,
}

/// What the dispatcher needs from one HTTP request.
#[derive(Debug, Clone, Copy)]
pub struct ReportRequest<'a> {
    /// `Accept` header, if present.
    pub accept: Option<&'a str>,
    /// Request path, used for extension-based negotiation.
    pub path: &'a str,
    /// Query-string and form parameters.
    pub params: &'a QueryParams,
}

/// Runs negotiation, binding and rendering for report requests.
#[derive(Clone)]
pub struct Dispatcher {
    renderer: Arc<dyn Renderer>,
    backup: Option<BackupTarget>,
    data_source: Option<DataSource>,
    clock: fn() -> DateTime<Utc>,
}

impl Dispatcher {
    /// Creates a dispatcher without backups or a data source override.
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self {
            renderer,
            backup: None,
            data_source: None,
            clock: Utc::now,
        }
    }

    /// Sets the backup target.
    #[must_use]
    pub fn with_backup(mut self, backup: Option<BackupTarget>) -> Self {
        self.backup = backup;
        self
    }

    /// Sets the data source passed to the renderer.
    #[must_use]
    pub fn with_data_source(mut self, data_source: Option<DataSource>) -> Self {
        self.data_source = data_source;
        self
    }

    /// Replaces the clock used for backup file names.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the backup target, if configured.
    pub fn backup(&self) -> Option<&BackupTarget> {
        self.backup.as_ref()
    }

    /// Generates `resource` for one request.
    ///
    /// # Errors
    ///
    /// - [`RequestError::UnsupportedOutputType`] if negotiation fails
    /// - [`RequestError::MissingRequiredParameters`] or
    ///   [`RequestError::ParameterCoercion`] if binding fails
    /// - [`RequestError::Generation`] if the backup file, the renderer or an
    ///   output sink fails
    pub async fn dispatch(
        &self,
        resource: &ReportResource,
        request: ReportRequest<'_>,
    ) -> Result<RenderedReport, RequestError> {
        let report = resource.name();

        let format = negotiate_for(resource, request.accept, request.path)?;
        tracing::debug!(report, %format, "Output format negotiated");

        let parameters = bind(resource.definition(), request.params)?;
        tracing::debug!(
            report,
            parameters = ?parameters.keys().collect::<Vec<_>>(),
            "Parameters bound"
        );

        let response = SharedBuffer::new();
        let mut writer = FanOutWriter::new(Box::new(response.clone()));

        let backup = match &self.backup {
            Some(target) => match target.open(report, format, (self.clock)()) {
                Ok((path, file)) => {
                    writer = writer.with_sink(Box::new(file));
                    Some(path)
                }
                Err(err) => {
                    record_backup(Outcome::Failure);
                    tracing::error!(report, error = %err, "Failed to create backup file");
                    return Err(RequestError::generation(err));
                }
            },
            None => None,
        };

        let job = RenderJob {
            report: resource.definition(),
            format,
            parameters: &parameters,
            data_source: self.data_source.as_ref(),
        };

        let started = Instant::now();
        let rendered = self.renderer.render(job, &mut writer).await;
        // Sinks are closed even when rendering failed. Closing a backup file
        // syncs it to disk, so it runs on the blocking pool.
        let closed = match tokio::task::spawn_blocking(move || writer.close()).await {
            Ok(closed) => closed.map_err(BoxError::from),
            Err(err) => Err(BoxError::from(err)),
        };
        let elapsed = started.elapsed();

        let result = settle(report, rendered, closed);

        let outcome = Outcome::from(&result);
        record_generation(report, format.as_str(), outcome, elapsed);
        if backup.is_some() {
            record_backup(outcome);
        }

        match result {
            Ok(()) => {
                tracing::info!(
                    report,
                    %format,
                    bytes = response.len(),
                    duration_ms = elapsed.as_millis() as u64,
                    backup = ?backup,
                    "Report generated"
                );
                Ok(RenderedReport {
                    format,
                    body: response.take(),
                    backup,
                })
            }
            Err(err) => {
                let cause = std::error::Error::source(&err)
                    .map(ToString::to_string)
                    .unwrap_or_default();
                tracing::error!(
                    report,
                    %format,
                    duration_ms = elapsed.as_millis() as u64,
                    backup = ?backup,
                    error = %cause,
                    "Report generation failed"
                );
                Err(err)
            }
        }
    }
}

/// Combines the render and close outcomes. A render failure wins; a close
/// failure behind it is only logged.
fn settle(
    report: &str,
    rendered: Result<(), RenderError>,
    closed: Result<(), BoxError>,
) -> Result<(), RequestError> {
    match (rendered, closed) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(err), Ok(())) => Err(RequestError::generation(err)),
        (Err(err), Err(close_err)) => {
            tracing::warn!(
                report,
                error = %close_err,
                "Failed to close output sinks after render failure"
            );
            Err(RequestError::generation(err))
        }
        (Ok(()), Err(err)) => Err(RequestError::generation(err)),
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("backup", &self.backup)
            .field("data_source", &self.data_source)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use clio_core::{
        ParameterSchema, ParameterType, ReportDefinition, ReportMethod, GENERATION_FAILED_MESSAGE,
    };
    use std::io::Write;

    struct Fixed(&'static [u8]);

    #[async_trait]
    impl Renderer for Fixed {
        async fn render(
            &self,
            _job: RenderJob<'_>,
            sink: &mut (dyn Write + Send),
        ) -> Result<(), RenderError> {
            sink.write_all(self.0)?;
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl Renderer for Broken {
        async fn render(
            &self,
            job: RenderJob<'_>,
            sink: &mut (dyn Write + Send),
        ) -> Result<(), RenderError> {
            sink.write_all(b"partial")?;
            Err(RenderError::engine(format!(
                "cannot open {}",
                job.file().display()
            )))
        }
    }

    fn fixed_clock() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    fn resource() -> ReportResource {
        let definition = ReportDefinition::new("Sales", "/srv/reports/sales.prpt")
            .with_parameters(vec![
                ParameterSchema::new("id", ParameterType::Long).required(true)
            ])
            .unwrap();
        ReportResource::new(
            "/sales",
            [ReportMethod::Get].into_iter().collect(),
            [OutputFormat::Pdf, OutputFormat::Html].into_iter().collect(),
            definition,
        )
        .unwrap()
    }

    fn request<'a>(path: &'a str, params: &'a QueryParams) -> ReportRequest<'a> {
        ReportRequest {
            accept: None,
            path,
            params,
        }
    }

    #[tokio::test]
    async fn test_dispatch_renders_body() {
        let dispatcher = Dispatcher::new(Arc::new(Fixed(b"%PDF-1.7")));
        let params = QueryParams::parse("id=7").unwrap();

        let rendered = dispatcher
            .dispatch(&resource(), request("/sales.pdf", &params))
            .await
            .unwrap();
        assert_eq!(rendered.format, OutputFormat::Pdf);
        assert_eq!(&rendered.body[..], b"%PDF-1.7");
        assert!(rendered.backup.is_none());
    }

    #[tokio::test]
    async fn test_dispatch_fails_before_rendering() {
        let dispatcher = Dispatcher::new(Arc::new(Broken));
        let params = QueryParams::parse("id=7").unwrap();
        let err = dispatcher
            .dispatch(&resource(), request("/sales.txt", &params))
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::UnsupportedOutputType { .. }));

        let empty = QueryParams::new();
        let err = dispatcher
            .dispatch(&resource(), request("/sales.pdf", &empty))
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::MissingRequiredParameters { .. }));
    }

    #[tokio::test]
    async fn test_engine_failure_is_generic() {
        let dispatcher = Dispatcher::new(Arc::new(Broken));
        let params = QueryParams::parse("id=7").unwrap();
        let err = dispatcher
            .dispatch(&resource(), request("/sales.pdf", &params))
            .await
            .unwrap_err();

        assert!(matches!(err, RequestError::Generation { .. }));
        assert_eq!(err.to_string(), GENERATION_FAILED_MESSAGE);
        assert!(!err.envelope().message.contains("/srv/reports"));
    }

    #[tokio::test]
    async fn test_backup_written_and_collision_fails() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(Arc::new(Fixed(b"<html/>")))
            .with_backup(Some(BackupTarget::new(dir.path(), false)))
            .with_clock(fixed_clock);
        let params = QueryParams::parse("id=1").unwrap();

        let rendered = dispatcher
            .dispatch(&resource(), request("/sales.html", &params))
            .await
            .unwrap();
        let path = rendered.backup.unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "1700000000000-sales.html"
        );
        assert_eq!(std::fs::read(&path).unwrap(), b"<html/>");

        let err = dispatcher
            .dispatch(&resource(), request("/sales.html", &params))
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Generation { .. }));
        assert!(!err.to_string().contains(dir.path().to_str().unwrap()));
    }

    #[tokio::test]
    async fn test_render_failure_still_closes_backup() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(Arc::new(Broken))
            .with_backup(Some(BackupTarget::new(dir.path(), false)))
            .with_clock(fixed_clock);
        let params = QueryParams::parse("id=1").unwrap();

        let err = dispatcher
            .dispatch(&resource(), request("/sales.pdf", &params))
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Generation { .. }));
        let path = dir.path().join("1700000000000-sales.pdf");
        assert_eq!(std::fs::read(path).unwrap(), b"partial");
    }

    #[test]
    fn test_settle_prefers_render_error() {
        let closed: Result<(), BoxError> =
            Err(std::io::Error::other("backup sink closed").into());
        let err = settle("Sales", Err(RenderError::engine("engine down")), closed).unwrap_err();

        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("engine down"));

        let closed: Result<(), BoxError> =
            Err(std::io::Error::other("backup sink closed").into());
        let err = settle("Sales", Ok(()), closed).unwrap_err();
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("backup sink closed"));

        assert!(settle("Sales", Ok(()), Ok(())).is_ok());
    }
}
