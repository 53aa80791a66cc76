//! Structured logging for Clio.
//!
//! Logs go to stdout as JSON lines (or pretty, for local runs). When a log
//! directory is configured, the same events are also written to
//! `<directory>/clio.log` without ANSI colors.
//!
//! `RUST_LOG`, when set, takes precedence over the configured level.
//!
//! # Example
//!
//! ```rust,ignore
//! use clio_telemetry::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::default())?;
//! tracing::info!(report = "Sales", format = "PDF", "report generated");
//! ```

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Name of the file written inside the log directory.
pub const LOG_FILE_NAME: &str = "clio.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Level or filter directive (e.g. `info`, `clio_server=debug,warn`).
    pub level: String,

    /// Whether to output JSON format.
    pub json_format: bool,

    /// Whether to include file/line info.
    pub file_line_info: bool,

    /// Whether to include target (module path).
    pub include_target: bool,

    /// Directory for an additional log file.
    pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            file_line_info: false,
            include_target: true,
            directory: None,
        }
    }
}

impl LogConfig {
    /// Creates a development configuration with human-readable output.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            json_format: false,
            file_line_info: true,
            ..Self::default()
        }
    }

    /// Returns the log file path, if a directory is configured.
    #[must_use]
    pub fn file_path(&self) -> Option<PathBuf> {
        self.directory.as_ref().map(|dir| dir.join(LOG_FILE_NAME))
    }
}

/// Initializes the global subscriber.
///
/// # Errors
///
/// Returns `TelemetryError::LoggingInit` if the filter is invalid or a
/// subscriber is already installed, and `TelemetryError::Io` if the log file
/// cannot be opened.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => create_env_filter(&config.level)?,
    };

    let mut layers: Vec<BoxedLayer> = vec![stdout_layer(config)];
    if let Some(path) = config.file_path() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_target(config.include_target)
                .with_writer(Arc::new(file))
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

fn stdout_layer(config: &LogConfig) -> BoxedLayer {
    if config.json_format {
        tracing_subscriber::fmt::layer()
            .json()
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .boxed()
    }
}

/// Creates an env filter from a string.
///
/// # Errors
///
/// Returns error if the filter string is invalid.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter)
        .map_err(|e| TelemetryError::LoggingInit(format!("Invalid log level: {e}")))
}

/// Field names used across Clio's log events.
pub mod fields {
    /// Request ID field name.
    pub const REQUEST_ID: &str = "request_id";

    /// HTTP method field name.
    pub const HTTP_METHOD: &str = "method";

    /// HTTP path field name.
    pub const HTTP_PATH: &str = "path";

    /// HTTP status field name.
    pub const HTTP_STATUS: &str = "status";

    /// Report name field name.
    pub const REPORT: &str = "report";

    /// Output format field name.
    pub const FORMAT: &str = "format";

    /// Duration in milliseconds field name.
    pub const DURATION_MS: &str = "duration_ms";
}
