//! Report resources and their public, path-free views.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::definition::ReportDefinition;
use crate::error::DefinitionError;
use crate::format::OutputFormat;
use crate::parameter::ParameterSchema;

/// HTTP methods a report can be requested with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

impl ReportMethod {
    /// Returns the method name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }

    /// Maps an HTTP method, returning `None` for anything but GET and POST.
    pub fn from_http(method: &http::Method) -> Option<Self> {
        if method == http::Method::GET {
            Some(Self::Get)
        } else if method == http::Method::POST {
            Some(Self::Post)
        } else {
            None
        }
    }
}

impl fmt::Display for ReportMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A report definition bound to a route path, methods and output formats.
///
/// The route path is relative to the API root and always starts with `/`.
/// Construction enforces that methods and formats are non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportResource {
    route_path: String,
    methods: BTreeSet<ReportMethod>,
    formats: BTreeSet<OutputFormat>,
    definition: ReportDefinition,
}

impl ReportResource {
    /// Creates a resource, prepending `/` to the route path when missing.
    ///
    /// # Example
    ///
    /// ```
    /// use clio_core::{OutputFormat, ReportDefinition, ReportMethod, ReportResource};
    ///
    /// let resource = ReportResource::new(
    ///     "sales",
    ///     [ReportMethod::Get].into_iter().collect(),
    ///     [OutputFormat::Pdf].into_iter().collect(),
    ///     ReportDefinition::new("Sales", "sales.prpt"),
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(resource.route_path(), "/sales");
    /// ```
    pub fn new(
        route_path: impl Into<String>,
        methods: BTreeSet<ReportMethod>,
        formats: BTreeSet<OutputFormat>,
        definition: ReportDefinition,
    ) -> Result<Self, DefinitionError> {
        let report = definition.name().to_string();
        if methods.is_empty() {
            return Err(DefinitionError::NoMethods { report });
        }
        if formats.is_empty() {
            return Err(DefinitionError::NoFormats { report });
        }

        let route_path = normalize_route_path(&report, route_path.into())?;
        Ok(Self {
            route_path,
            methods,
            formats,
            definition,
        })
    }

    /// Returns the default route path for a report name: lower-cased,
    /// spaces replaced by `_`, with a leading `/`.
    ///
    /// ```
    /// use clio_core::ReportResource;
    ///
    /// assert_eq!(ReportResource::default_route_path("Daily Sales Report"), "/daily_sales_report");
    /// ```
    pub fn default_route_path(report_name: &str) -> String {
        let slug = report_name.trim().to_lowercase().replace(' ', "_");
        format!("/{slug}")
    }

    /// Returns the route path relative to the API root.
    pub fn route_path(&self) -> &str {
        &self.route_path
    }

    /// Returns the enabled HTTP methods.
    pub fn methods(&self) -> &BTreeSet<ReportMethod> {
        &self.methods
    }

    /// Returns the supported output formats.
    pub fn formats(&self) -> &BTreeSet<OutputFormat> {
        &self.formats
    }

    /// Returns `true` if `format` is offered.
    pub fn supports(&self, format: OutputFormat) -> bool {
        self.formats.contains(&format)
    }

    /// Returns the bound definition.
    pub fn definition(&self) -> &ReportDefinition {
        &self.definition
    }

    /// Returns the report name.
    pub fn name(&self) -> &str {
        self.definition.name()
    }
}

fn normalize_route_path(report: &str, path: String) -> Result<String, DefinitionError> {
    let invalid = |reason: &str| DefinitionError::InvalidRoutePath {
        report: report.to_string(),
        path: path.clone(),
        reason: reason.to_string(),
    };

    let trimmed = path.trim();
    if trimmed.chars().any(|c| c.is_whitespace() || matches!(c, '?' | '#' | '%')) {
        return Err(invalid("must not contain whitespace, '?', '#' or '%'"));
    }

    let mut normalized = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    };
    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }

    if normalized == "/" {
        return Err(invalid("must name a path below the API root"));
    }
    if normalized.contains("//") {
        return Err(invalid("must not contain empty segments"));
    }
    Ok(normalized)
}

/// A report definition as exposed over HTTP: no file location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicDefinition {
    /// Report name.
    pub name: String,
    /// Version string.
    pub version: String,
    /// Description.
    pub description: String,
    /// Parameters in declaration order.
    pub parameters: Vec<ParameterSchema>,
}

impl From<&ReportDefinition> for PublicDefinition {
    fn from(definition: &ReportDefinition) -> Self {
        Self {
            name: definition.name().to_string(),
            version: definition.version().to_string(),
            description: definition.description().to_string(),
            parameters: definition.parameters().to_vec(),
        }
    }
}

/// A report resource as listed by the catalog endpoint: no file location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicResource {
    /// Route path relative to the API root.
    pub route_path: String,
    /// Enabled methods.
    pub methods: BTreeSet<ReportMethod>,
    /// Supported output formats.
    pub output_formats: BTreeSet<OutputFormat>,
    /// The definition without its file location.
    #[serde(flatten)]
    pub definition: PublicDefinition,
}

/// Returns a copy of `resource` with every server-side file location removed.
pub fn strip_file_paths(resource: &ReportResource) -> PublicResource {
    PublicResource {
        route_path: resource.route_path.clone(),
        methods: resource.methods.clone(),
        output_formats: resource.formats.clone(),
        definition: PublicDefinition::from(&resource.definition),
    }
}
