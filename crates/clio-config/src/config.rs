//! Top-level configuration.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::schema::{
    BackupConfig, BasicAuthConfig, DatabaseConfig, LoggingConfig, RendererConfig, ReportConfig,
};

/// Complete Clio configuration: server settings plus the report catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClioConfig {
    /// Prefix for every report route and the catalog listing.
    #[serde(default)]
    pub api_root: String,

    /// Bind host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds; `0` disables it.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Time allowed for in-flight connections on shutdown.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Basic authentication users.
    #[serde(default)]
    pub basic_auth: Option<BasicAuthConfig>,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Backup settings.
    #[serde(default)]
    pub backup: Option<BackupConfig>,

    /// Database override for the rendering engine.
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Rendering service settings.
    #[serde(default)]
    pub renderer: RendererConfig,

    /// The report catalog.
    #[serde(default)]
    pub reports: Vec<ReportConfig>,

    /// Directory relative report files resolve against.
    ///
    /// Set by the loader to the configuration file's directory.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Default for ClioConfig {
    fn default() -> Self {
        Self {
            api_root: String::new(),
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            basic_auth: None,
            logging: LoggingConfig::default(),
            backup: None,
            database: None,
            renderer: RendererConfig::default(),
            reports: Vec::new(),
            base_dir: PathBuf::from("."),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4567
}

fn default_request_timeout() -> u64 {
    120
}

fn default_shutdown_timeout() -> u64 {
    30
}

impl ClioConfig {
    /// Returns the API root without a trailing `/` (`""` for none).
    pub fn api_root(&self) -> String {
        let trimmed = self.api_root.trim().trim_end_matches('/');
        if trimmed.is_empty() || trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        }
    }

    /// Returns the address to bind.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|e| ConfigError::invalid_value("host", format!("{}: {e}", self.host)))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Returns the request timeout, or `None` when disabled.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    /// Returns the shutdown drain timeout.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Validates the configuration.
    ///
    /// Route-level checks (reserved paths, collisions, report file existence)
    /// happen later, when the catalog is compiled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::invalid_value("port", "must be greater than 0"));
        }
        self.socket_addr()?;

        if self.renderer.url.trim().is_empty() {
            return Err(ConfigError::invalid_value("renderer.url", "must not be empty"));
        }
        if self.renderer.timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "renderer.timeoutSecs",
                "must be greater than 0",
            ));
        }

        if let Some(auth) = &self.basic_auth {
            for (index, credential) in auth.credentials().enumerate() {
                if credential.username.trim().is_empty() {
                    return Err(ConfigError::invalid_value(
                        format!("basicAuth.users[{index}].username"),
                        "must not be empty",
                    ));
                }
                if credential.username.contains(':') {
                    return Err(ConfigError::invalid_value(
                        format!("basicAuth.users[{index}].username"),
                        "must not contain ':'",
                    ));
                }
            }
        }

        if let Some(backup) = &self.backup {
            if backup.directory.as_os_str().is_empty() {
                return Err(ConfigError::missing_field("backup.directory"));
            }
        }

        for (index, report) in self.reports.iter().enumerate() {
            let field = |name: &str| format!("reports[{index}].{name}");
            if report.name.trim().is_empty() {
                return Err(ConfigError::missing_field(field("name")));
            }
            if report.file.as_os_str().is_empty() {
                return Err(ConfigError::missing_field(field("file")));
            }
            if report.ext.is_empty() {
                return Err(ConfigError::invalid_value(
                    field("ext"),
                    "at least one of pdf, html, txt is required",
                ));
            }
            for parameter in &report.parameters {
                if parameter.name.trim().is_empty() {
                    return Err(ConfigError::missing_field(field("parameters[].name")));
                }
            }
        }

        Ok(())
    }
}
