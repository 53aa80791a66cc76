//! Output format negotiation.

use crate::error::RequestError;
use crate::format::OutputFormat;
use crate::resource::ReportResource;

/// Resolves the output format from the `Accept` header and the request path.
///
/// Rules are checked in order and the first match wins:
///
/// 1. header contains `pdf` or path ends in `.pdf` → PDF
/// 2. header contains `text/plain` or path ends in `.txt` → TXT
/// 3. header contains `html` or path ends in `.html` → HTML
/// 4. header is exactly `*/*` → HTML
///
/// Header matching is case-insensitive; a missing header counts as empty.
/// Returns `None` when no rule matches.
pub fn negotiate(accept: Option<&str>, path: &str) -> Option<OutputFormat> {
    let accept = accept.unwrap_or_default().to_ascii_lowercase();
    let path = path.to_ascii_lowercase();

    if accept.contains("pdf") || path.ends_with(".pdf") {
        Some(OutputFormat::Pdf)
    } else if accept.contains("text/plain") || path.ends_with(".txt") {
        Some(OutputFormat::Txt)
    } else if accept.contains("html") || path.ends_with(".html") {
        Some(OutputFormat::Html)
    } else if accept == "*/*" {
        Some(OutputFormat::Html)
    } else {
        None
    }
}

/// Negotiates a format and checks that `resource` offers it.
pub fn negotiate_for(
    resource: &ReportResource,
    accept: Option<&str>,
    path: &str,
) -> Result<OutputFormat, RequestError> {
    match negotiate(accept, path) {
        Some(format) if resource.supports(format) => Ok(format),
        requested => Err(RequestError::UnsupportedOutputType {
            requested,
            supported: resource.formats().clone(),
        }),
    }
}
