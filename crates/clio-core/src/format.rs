//! Output formats a report can be rendered into.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An output format supported by the rendering engine.
///
/// The declaration order (PDF, HTML, TXT) is the order used whenever a set of
/// formats is listed, for example in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OutputFormat {
    /// Portable Document Format.
    Pdf,
    /// HTML page.
    Html,
    /// Plain text.
    Txt,
}

impl OutputFormat {
    /// All formats in listing order.
    pub const ALL: [Self; 3] = [Self::Pdf, Self::Html, Self::Txt];

    /// Returns the upper-case name used in JSON and messages.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Html => "HTML",
            Self::Txt => "TXT",
        }
    }

    /// Returns the URL extension (without the dot).
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Html => "html",
            Self::Txt => "txt",
        }
    }

    /// Returns the `content-type` header value for responses in this format.
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf; charset=utf-8",
            Self::Html => "text/html; charset=utf-8",
            Self::Txt => "text/plain; charset=utf-8",
        }
    }

    /// Returns the bare media type, without parameters.
    pub const fn media_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Html => "text/html",
            Self::Txt => "text/plain",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a known output format.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown output format '{0}', expected one of pdf, html, txt")]
pub struct UnknownOutputFormat(pub String);

impl FromStr for OutputFormat {
    type Err = UnknownOutputFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|format| format.extension().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownOutputFormat(s.to_string()))
    }
}

impl Serialize for OutputFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OutputFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Formats a set of output formats as `[PDF,HTML]`.
pub fn describe_formats(formats: &BTreeSet<OutputFormat>) -> String {
    let names: Vec<&str> = formats.iter().map(|f| f.as_str()).collect();
    format!("[{}]", names.join(","))
}
