//! Backup copies of generated reports.
//!
//! Each successful generation can be mirrored into a file under the backup
//! directory, optionally inside a per-day `YYYY-MM-DD` sub-directory (UTC).
//! Files are created with `create_new`: an existing file with the same name is
//! an error, never overwritten.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clio_config::BackupConfig;
use clio_core::OutputFormat;

/// Where backup files are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupTarget {
    directory: PathBuf,
    rolling: bool,
}

impl BackupTarget {
    /// Creates a backup target.
    pub fn new(directory: impl Into<PathBuf>, rolling: bool) -> Self {
        Self {
            directory: directory.into(),
            rolling,
        }
    }

    /// Creates a target from configuration, resolving a relative directory
    /// against `base_dir`.
    pub fn from_config(config: &BackupConfig, base_dir: &Path) -> Self {
        let directory = if config.directory.is_absolute() {
            config.directory.clone()
        } else {
            base_dir.join(&config.directory)
        };
        Self::new(directory, config.rolling_backup)
    }

    /// Returns the root backup directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Returns the directory a backup taken at `at` goes into.
    pub fn directory_for(&self, at: DateTime<Utc>) -> PathBuf {
        if self.rolling {
            self.directory.join(at.format("%Y-%m-%d").to_string())
        } else {
            self.directory.clone()
        }
    }

    /// Returns the backup file name: `{epochMillis}-{report}.{ext}`, lower-cased.
    ///
    /// Whitespace is removed from the report name and path separators and `:`
    /// become `_`.
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use clio_core::OutputFormat;
    /// use clio_server::BackupTarget;
    ///
    /// let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
    /// assert_eq!(
    ///     BackupTarget::file_name("Daily Sales", OutputFormat::Pdf, at),
    ///     "1700000000123-dailysales.pdf"
    /// );
    /// ```
    pub fn file_name(report: &str, format: OutputFormat, at: DateTime<Utc>) -> String {
        let name: String = report
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| match c {
                '/' | '\\' | ':' => '_',
                other => other,
            })
            .collect();
        format!("{}-{name}.{}", at.timestamp_millis(), format.extension()).to_lowercase()
    }

    /// Creates a fresh backup file.
    ///
    /// # Errors
    ///
    /// Fails with `AlreadyExists` if the file is already there, or with any
    /// error raised while creating the directory.
    pub fn open(
        &self,
        report: &str,
        format: OutputFormat,
        at: DateTime<Utc>,
    ) -> io::Result<(PathBuf, File)> {
        let directory = self.directory_for(at);
        fs::create_dir_all(&directory)?;
        let path = directory.join(Self::file_name(report, format, at));
        let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        Ok((path, file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 58).unwrap()
    }

    #[test]
    fn test_file_name_sanitized() {
        let name = BackupTarget::file_name("Q1/Q2 Report: East\\West", OutputFormat::Html, at());
        assert_eq!(name, format!("{}-q1_q2report_east_west.html", at().timestamp_millis()));
    }

    #[test]
    fn test_flat_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = BackupTarget::new(dir.path(), false);
        let (path, mut file) = target.open("Sales", OutputFormat::Pdf, at()).unwrap();
        file.write_all(b"%PDF").unwrap();

        assert_eq!(path.parent(), Some(dir.path()));
        assert_eq!(fs::read(&path).unwrap(), b"%PDF");
    }

    #[test]
    fn test_rolling_directory_uses_utc_date() {
        let dir = tempfile::tempdir().unwrap();
        let target = BackupTarget::new(dir.path().join("backups"), true);
        let (path, _) = target.open("Sales", OutputFormat::Txt, at()).unwrap();

        assert_eq!(path.parent(), Some(dir.path().join("backups/2024-03-09").as_path()));
    }

    #[test]
    fn test_collision_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = BackupTarget::new(dir.path(), false);
        let (path, mut file) = target.open("Sales", OutputFormat::Pdf, at()).unwrap();
        file.write_all(b"first").unwrap();

        let err = target.open("Sales", OutputFormat::Pdf, at()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(path).unwrap(), b"first");
    }

    #[test]
    fn test_relative_directory_resolved_against_base() {
        let config = BackupConfig {
            directory: PathBuf::from("backups"),
            rolling_backup: false,
        };
        let target = BackupTarget::from_config(&config, Path::new("/etc/clio"));
        assert_eq!(target.directory(), Path::new("/etc/clio/backups"));
    }
}
