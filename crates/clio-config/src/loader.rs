//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! a file and environment variables.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{ClioConfig, ConfigError, LogFormat};

/// Configuration loader with layered approach.
///
/// The loader applies configuration in layers, with later layers overriding
/// earlier ones:
/// 1. Default values (built into the code)
/// 2. Configuration file (YAML, JSON or TOML)
/// 3. Environment variables
///
/// # Example
///
/// ```no_run
/// use clio_config::ConfigLoader;
///
/// # fn main() -> Result<(), clio_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_file("clio.yml")?
///     .with_env_prefix("CLIO")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: ClioConfig,
    env_prefix: Option<String>,
    base_dir: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader holding the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ClioConfig::default(),
            env_prefix: None,
            base_dir: None,
        }
    }

    /// Load configuration from a file.
    ///
    /// The format is chosen by extension: `.yml`/`.yaml`, `.json` or `.toml`.
    /// The file's directory becomes the base for relative report paths.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The file does not exist or cannot be read
    /// - The extension is not recognised
    /// - The content does not parse, has unknown fields or unknown parameter types
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;

        self.config = Self::parse(&content, &format)?;
        if self.base_dir.is_none() {
            self.base_dir = Some(
                path.parent()
                    .filter(|parent| !parent.as_os_str().is_empty())
                    .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
            );
        }
        Ok(self)
    }

    /// Load configuration from a string.
    ///
    /// # Arguments
    ///
    /// * `content` - Configuration content as a string
    /// * `format` - `"yaml"`, `"yml"`, `"json"` or `"toml"`
    ///
    /// # Example
    ///
    /// ```
    /// use clio_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("port: 9000\napiRoot: /api\n", "yaml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.port, 9000);
    /// assert_eq!(config.api_root(), "/api");
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = Self::parse(content, &format.to_lowercase())?;
        Ok(self)
    }

    /// Override the directory relative report paths resolve against.
    #[must_use]
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Set environment variable prefix for overrides.
    ///
    /// Environment variables use the format `PREFIX__SECTION__KEY`.
    /// For example, with prefix "CLIO":
    /// - `CLIO__PORT=9000`
    /// - `CLIO__LOGGING__LEVEL=debug`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Apply overrides from explicit `(name, value)` pairs.
    ///
    /// Same naming rules as [`with_env_prefix`](Self::with_env_prefix), but
    /// without reading the process environment.
    pub fn with_overrides<I, K, V>(mut self, prefix: &str, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let prefix = prefix.to_uppercase();
        for (key, value) in vars {
            self.apply_env_var(key.as_ref(), value.as_ref(), &prefix)?;
        }
        Ok(self)
    }

    /// Finalize and return the loaded configuration.
    ///
    /// Applies environment variable overrides (if a prefix was set) and
    /// validates the final configuration.
    pub fn load(mut self) -> Result<ClioConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars: Vec<(String, String)> = env::vars()
                .filter(|(key, _)| key.starts_with(&prefix))
                .collect();
            for (key, value) in vars {
                self.apply_env_var(&key, &value, &prefix)?;
            }
        }

        if let Some(base_dir) = self.base_dir.take() {
            self.config.base_dir = base_dir;
        }

        self.config.validate()?;
        Ok(self.config)
    }

    fn parse(content: &str, format: &str) -> Result<ClioConfig, ConfigError> {
        match format {
            "yaml" | "yml" => Ok(serde_yaml::from_str(content)?),
            "json" => Ok(serde_json::from_str(content)?),
            "toml" => Ok(toml::from_str(content)?),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    // Keys that do not belong to the prefix are ignored; unknown keys under it are errors.
    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(rest) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            return Ok(());
        };
        let parts: Vec<&str> = rest.split("__").collect();

        match parts.as_slice() {
            ["HOST"] => self.config.host = value.to_string(),
            ["PORT"] => {
                self.config.port = value
                    .parse()
                    .map_err(|_| ConfigError::env_parse_error(key, "expected port number"))?;
            }
            ["API_ROOT"] => self.config.api_root = value.to_string(),
            ["REQUEST_TIMEOUT_SECS"] => {
                self.config.request_timeout_secs = value
                    .parse()
                    .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))?;
            }
            ["SHUTDOWN_TIMEOUT_SECS"] => {
                self.config.shutdown_timeout_secs = value
                    .parse()
                    .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))?;
            }
            ["LOGGING", "LEVEL"] => self.config.logging.level = value.to_string(),
            ["LOGGING", "FORMAT"] => {
                self.config.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["LOGGING", "DIRECTORY"] => {
                self.config.logging.directory =
                    (!value.is_empty()).then(|| PathBuf::from(value));
            }
            ["BACKUP", "DIRECTORY"] => {
                let backup = self.config.backup.get_or_insert_with(|| crate::BackupConfig {
                    directory: PathBuf::new(),
                    rolling_backup: false,
                });
                backup.directory = PathBuf::from(value);
            }
            ["BACKUP", "ROLLING_BACKUP"] => {
                let rolling = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
                match self.config.backup.as_mut() {
                    Some(backup) => backup.rolling_backup = rolling,
                    None => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "backup directory is not configured",
                        ))
                    }
                }
            }
            ["RENDERER", "URL"] => self.config.renderer.url = value.to_string(),
            ["RENDERER", "TIMEOUT_SECS"] => {
                self.config.renderer.timeout_secs = value
                    .parse()
                    .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))?;
            }
            _ => return Err(ConfigError::env_parse_error(key, "unknown configuration key")),
        }

        Ok(())
    }
}

/// Parse a boolean value from a string.
///
/// Accepts: true/false, yes/no, 1/0, on/off (case-insensitive)
fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}
