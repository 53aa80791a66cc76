//! Prometheus metrics for Clio.
//!
//! Metrics are recorded through the `metrics` facade. [`install_metrics`]
//! installs a Prometheus recorder as the global recorder and returns its
//! handle; the server renders that handle on `GET /metrics`.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `clio_http_requests_total` | Counter | `method`, `status` | Total requests |
//! | `clio_http_request_duration_seconds` | Histogram | `method` | Request latency |
//! | `clio_http_requests_in_flight` | Gauge | - | Requests being handled |
//! | `clio_reports_generated_total` | Counter | `report`, `format`, `outcome` | Generation attempts |
//! | `clio_report_generation_duration_seconds` | Histogram | `report`, `format` | Generation latency |
//! | `clio_backup_writes_total` | Counter | `outcome` | Backup files written |

use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusRecorder};

use crate::error::TelemetryError;
use crate::{PrometheusHandle, TelemetryResult};

/// Total HTTP requests.
pub const HTTP_REQUESTS_TOTAL: &str = "clio_http_requests_total";
/// HTTP request latency.
pub const HTTP_REQUEST_DURATION: &str = "clio_http_request_duration_seconds";
/// Requests currently being handled.
pub const HTTP_REQUESTS_IN_FLIGHT: &str = "clio_http_requests_in_flight";
/// Report generation attempts.
pub const REPORTS_GENERATED_TOTAL: &str = "clio_reports_generated_total";
/// Report generation latency.
pub const REPORT_GENERATION_DURATION: &str = "clio_report_generation_duration_seconds";
/// Backup files written.
pub const BACKUP_WRITES_TOTAL: &str = "clio_backup_writes_total";

/// Buckets for the HTTP latency histogram: 5ms .. 60s.
const HTTP_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Buckets for report generation: rendering is slow, so they reach 5 minutes.
const GENERATION_BUCKETS: &[f64] = &[
    0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0,
];

/// Outcome label of a generation or backup attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Completed.
    Success,
    /// Failed.
    Failure,
}

impl Outcome {
    /// Returns the label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl<T, E> From<&Result<T, E>> for Outcome {
    fn from(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

/// Builds a Prometheus recorder with Clio's histogram buckets, without
/// installing it.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` if the buckets are rejected.
pub fn build_recorder() -> TelemetryResult<PrometheusRecorder> {
    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(HTTP_REQUEST_DURATION.to_string()), HTTP_BUCKETS)
        .and_then(|b| {
            b.set_buckets_for_metric(
                Matcher::Full(REPORT_GENERATION_DURATION.to_string()),
                GENERATION_BUCKETS,
            )
        })
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    Ok(builder.build_recorder())
}

/// Installs the global Prometheus recorder and returns its handle.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` if a recorder is already installed.
pub fn install_metrics() -> TelemetryResult<PrometheusHandle> {
    let recorder = build_recorder()?;
    let handle = recorder.handle();
    metrics::set_global_recorder(recorder)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    register_metric_descriptions();
    Ok(handle)
}

/// Registers descriptions for all standard metrics.
pub fn register_metric_descriptions() {
    describe_counter!(HTTP_REQUESTS_TOTAL, "Total number of HTTP requests processed");
    describe_histogram!(HTTP_REQUEST_DURATION, "HTTP request duration in seconds");
    describe_gauge!(
        HTTP_REQUESTS_IN_FLIGHT,
        "Number of HTTP requests currently being processed"
    );
    describe_counter!(REPORTS_GENERATED_TOTAL, "Report generation attempts by outcome");
    describe_histogram!(
        REPORT_GENERATION_DURATION,
        "Report generation duration in seconds"
    );
    describe_counter!(BACKUP_WRITES_TOTAL, "Backup files written by outcome");
}

/// Records a completed HTTP request.
pub fn record_http_request(method: &str, status_code: u16, duration: Duration) {
    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!(HTTP_REQUEST_DURATION, "method" => method.to_string())
        .record(duration.as_secs_f64());
}

/// Records one report generation attempt.
pub fn record_generation(report: &str, format: &str, outcome: Outcome, duration: Duration) {
    counter!(
        REPORTS_GENERATED_TOTAL,
        "report" => report.to_string(),
        "format" => format.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);

    histogram!(
        REPORT_GENERATION_DURATION,
        "report" => report.to_string(),
        "format" => format.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Records a backup file write.
pub fn record_backup(outcome: Outcome) {
    counter!(BACKUP_WRITES_TOTAL, "outcome" => outcome.as_str()).increment(1);
}

/// Guard that tracks a request in the in-flight gauge until dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Creates a new guard and increments the in-flight gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!(HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_with(f: impl FnOnce()) -> String {
        let recorder = build_recorder().unwrap();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, f);
        handle.render()
    }

    #[test]
    fn test_record_http_request() {
        let output = render_with(|| {
            record_http_request("GET", 200, Duration::from_millis(12));
            record_http_request("GET", 200, Duration::from_millis(30));
        });
        assert!(output.contains(HTTP_REQUESTS_TOTAL));
        assert!(output.contains(r#"status="200""#));
        assert!(output.contains("clio_http_request_duration_seconds_bucket"));
    }

    #[test]
    fn test_record_generation_and_backup() {
        let output = render_with(|| {
            record_generation("Sales", "PDF", Outcome::Success, Duration::from_secs(2));
            record_generation("Sales", "PDF", Outcome::Failure, Duration::from_secs(1));
            record_backup(Outcome::Success);
        });
        assert!(output.contains(r#"report="Sales""#));
        assert!(output.contains(r#"outcome="success""#));
        assert!(output.contains(r#"outcome="failure""#));
        assert!(output.contains(BACKUP_WRITES_TOTAL));
        assert!(output.contains("clio_report_generation_duration_seconds_bucket"));
    }

    #[test]
    fn test_in_flight_guard_returns_to_zero() {
        let output = render_with(|| {
            let guard = InFlightGuard::new();
            drop(guard);
        });
        let value = output
            .lines()
            .find(|line| line.starts_with("clio_http_requests_in_flight "))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|v| v.parse::<f64>().ok());
        assert_eq!(value, Some(0.0));
    }

    #[test]
    fn test_outcome_from_result() {
        let ok: Result<(), ()> = Ok(());
        let err: Result<(), ()> = Err(());
        assert_eq!(Outcome::from(&ok), Outcome::Success);
        assert_eq!(Outcome::from(&err), Outcome::Failure);
    }

    #[test]
    fn test_record_functions_without_recorder() {
        record_http_request("POST", 500, Duration::from_millis(1));
        record_backup(Outcome::Failure);
    }
}
