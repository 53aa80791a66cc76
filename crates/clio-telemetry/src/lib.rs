//! Observability for Clio.
//!
//! - **Logging**: structured JSON (or pretty) logs through `tracing-subscriber`,
//!   optionally mirrored into a log file.
//! - **Metrics**: Prometheus text exposition via the `metrics` facade. The
//!   recorder handle is returned to the caller rather than stored globally, so
//!   the server decides where `/metrics` is served.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `clio_http_requests_total` | Counter | `method`, `status` |
//! | `clio_http_request_duration_seconds` | Histogram | `method` |
//! | `clio_reports_generated_total` | Counter | `report`, `format`, `outcome` |
//! | `clio_report_generation_duration_seconds` | Histogram | `report`, `format` |
//! | `clio_backup_writes_total` | Counter | `outcome` |
//!
//! # Example
//!
//! ```rust,ignore
//! use clio_telemetry::{init_logging, install_metrics, LogConfig};
//!
//! init_logging(&LogConfig::default())?;
//! let handle = install_metrics()?;
//! println!("{}", handle.render());
//! ```

#![doc(html_root_url = "https://docs.rs/clio-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use crate::metrics::{build_recorder, install_metrics, InFlightGuard, Outcome};
pub use metrics_exporter_prometheus::PrometheusHandle;

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
