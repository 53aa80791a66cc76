//! Report definitions.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use crate::error::DefinitionError;
use crate::parameter::ParameterSchema;

const DEFAULT_VERSION: &str = "1.0.0";

/// A named report: source file, version, description and parameters.
///
/// Two definitions are equal when their name and file path match; version,
/// description and parameters do not take part in equality.
///
/// # Example
///
/// ```
/// use clio_core::{ParameterSchema, ParameterType, ReportDefinition};
///
/// let definition = ReportDefinition::new("Daily Sales", "reports/sales.prpt")
///     .with_description("Sales per branch")
///     .with_parameters(vec![ParameterSchema::new("branch", ParameterType::String)])
///     .unwrap();
///
/// assert_eq!(definition.version(), "1.0.0");
/// assert!(definition.has_parameters());
/// ```
#[derive(Debug, Clone)]
pub struct ReportDefinition {
    name: String,
    file_path: PathBuf,
    version: String,
    description: String,
    parameters: Vec<ParameterSchema>,
}

impl ReportDefinition {
    /// Creates a definition with version `1.0.0`, no description and no parameters.
    pub fn new(name: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            file_path: file_path.into(),
            version: DEFAULT_VERSION.to_string(),
            description: String::new(),
            parameters: Vec::new(),
        }
    }

    /// Sets the version string.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the human-readable description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Replaces the parameter list, keeping declaration order.
    ///
    /// Fails with [`DefinitionError::DuplicateParameter`] if two schemas
    /// share a name.
    pub fn with_parameters(
        mut self,
        parameters: Vec<ParameterSchema>,
    ) -> Result<Self, DefinitionError> {
        let mut seen = HashSet::with_capacity(parameters.len());
        for parameter in &parameters {
            if !seen.insert(parameter.name()) {
                return Err(DefinitionError::DuplicateParameter {
                    report: self.name.clone(),
                    parameter: parameter.name().to_string(),
                });
            }
        }
        self.parameters = parameters;
        Ok(self)
    }

    /// Replaces the file path, typically after resolving it against a base directory.
    pub fn with_file_path(mut self, file_path: impl Into<PathBuf>) -> Self {
        self.file_path = file_path.into();
        self
    }

    /// Checks that the name is non-empty and the report file exists.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.name.trim().is_empty() {
            return Err(DefinitionError::EmptyName);
        }
        if !self.file_path.is_file() {
            return Err(DefinitionError::FileNotFound {
                report: self.name.clone(),
                path: self.file_path.clone(),
            });
        }
        Ok(())
    }

    /// Returns the report name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the server-side report file path.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Returns the version string.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the parameters in declaration order.
    pub fn parameters(&self) -> &[ParameterSchema] {
        &self.parameters
    }

    /// Returns `true` if at least one parameter is declared.
    pub fn has_parameters(&self) -> bool {
        !self.parameters.is_empty()
    }

    /// Looks up a parameter by exact name.
    pub fn parameter(&self, name: &str) -> Option<&ParameterSchema> {
        self.parameters.iter().find(|p| p.name() == name)
    }

    /// Iterates over the mandatory parameters.
    pub fn required_parameters(&self) -> impl Iterator<Item = &ParameterSchema> {
        self.parameters.iter().filter(|p| p.is_required())
    }
}

impl PartialEq for ReportDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.file_path == other.file_path
    }
}

impl Eq for ReportDefinition {}

impl Hash for ReportDefinition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.file_path.hash(state);
    }
}
