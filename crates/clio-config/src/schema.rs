//! Configuration schema types.
//!
//! Keys are camelCase in every file format. Unknown keys are rejected.

use std::fmt;
use std::path::PathBuf;

use clio_core::{DataSource, OutputFormat, ParameterType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single basic-auth user.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credential {
    /// User name.
    pub username: String,
    /// Plain-text password.
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Basic authentication section.
///
/// Either a single `user`, a list of `users`, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BasicAuthConfig {
    /// A single user.
    #[serde(default)]
    pub user: Option<Credential>,
    /// Additional users.
    #[serde(default)]
    pub users: Vec<Credential>,
}

impl BasicAuthConfig {
    /// Iterates over every configured user.
    pub fn credentials(&self) -> impl Iterator<Item = &Credential> {
        self.user.iter().chain(self.users.iter())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

/// Logging section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoggingConfig {
    /// Level or filter directive (`info`, `clio_server=debug,warn`).
    #[serde(default = "default_log_level", alias = "rootLevel")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
    /// Directory for an additional `clio.log` file.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            directory: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Backup section: where copies of generated reports are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BackupConfig {
    /// Root directory for backups.
    pub directory: PathBuf,
    /// Write into a `YYYY-MM-DD` sub-directory per day.
    #[serde(default)]
    pub rolling_backup: bool,
}

/// Database override passed through to the rendering engine.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database user.
    pub user: String,
    /// Database password.
    pub password: String,
    /// Connection URI.
    pub uri: String,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("uri", &self.uri)
            .finish()
    }
}

impl From<&DatabaseConfig> for DataSource {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            uri: config.uri.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
        }
    }
}

/// Rendering service section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RendererConfig {
    /// Endpoint that accepts render jobs.
    #[serde(default = "default_renderer_url")]
    pub url: String,
    /// Per-job timeout in seconds.
    #[serde(default = "default_renderer_timeout")]
    pub timeout_secs: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            url: default_renderer_url(),
            timeout_secs: default_renderer_timeout(),
        }
    }
}

fn default_renderer_url() -> String {
    "http://127.0.0.1:8090/render".to_string()
}

fn default_renderer_timeout() -> u64 {
    300
}

/// Which HTTP methods a report answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodsConfig {
    /// Enable `GET`.
    #[serde(default = "default_true")]
    pub get: bool,
    /// Enable `POST`.
    #[serde(default = "default_true")]
    pub post: bool,
}

impl Default for MethodsConfig {
    fn default() -> Self {
        Self {
            get: true,
            post: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// One declared report parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterConfig {
    /// Parameter name.
    pub name: String,
    /// Whether the parameter must be supplied.
    #[serde(default)]
    pub required: bool,
    /// Declared type; unknown names fail to load.
    #[serde(rename = "type", default = "default_parameter_type")]
    pub ty: ParameterType,
    /// Declared default value.
    #[serde(default)]
    pub default: Option<Value>,
}

fn default_parameter_type() -> ParameterType {
    ParameterType::String
}

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReportConfig {
    /// Report name.
    pub name: String,
    /// Route path; derived from the name when absent.
    #[serde(default)]
    pub path: Option<String>,
    /// Enabled methods.
    #[serde(default)]
    pub methods: MethodsConfig,
    /// Supported output formats (`pdf`, `html`, `txt`).
    #[serde(default)]
    pub ext: Vec<OutputFormat>,
    /// Version string.
    #[serde(default = "default_report_version")]
    pub version: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Report file, absolute or relative to the configuration file.
    pub file: PathBuf,
    /// Declared parameters.
    #[serde(default)]
    pub parameters: Vec<ParameterConfig>,
}

fn default_report_version() -> String {
    "1.0.0".to_string()
}
