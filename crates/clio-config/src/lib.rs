//! Typed configuration for Clio.
//!
//! This crate loads the server settings and the report catalog from a single
//! file, with support for:
//! - YAML, JSON and TOML files (chosen by extension)
//! - Environment variable overrides (`CLIO__PORT`, `CLIO__LOGGING__LEVEL`, ...)
//! - Strict validation (fails on unknown fields and unknown parameter types)
//!
//! # Example
//!
//! ```no_run
//! use clio_config::ConfigLoader;
//!
//! # fn main() -> Result<(), clio_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_file("clio.yml")?
//!     .with_env_prefix("CLIO")
//!     .load()?;
//!
//! println!("{} reports on port {}", config.reports.len(), config.port);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```yaml
//! apiRoot: /api
//! port: 4567
//! basicAuth:
//!   users:
//!     - { username: admin, password: secret }
//! backup:
//!   directory: /var/backups/reports
//!   rollingBackup: true
//! reports:
//!   - name: Daily Sales
//!     ext: [pdf, html]
//!     file: ./reports/sales.prpt
//!     parameters:
//!       - { name: branch, required: true, type: string }
//! ```

#![doc(html_root_url = "https://docs.rs/clio-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::ClioConfig;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use schema::{
    BackupConfig, BasicAuthConfig, Credential, DatabaseConfig, LogFormat, LoggingConfig,
    MethodsConfig, ParameterConfig, RendererConfig, ReportConfig,
};
