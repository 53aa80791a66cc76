//! Parameter schemas declared by report definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Semantic type of a report parameter.
///
/// The type decides how the raw query string value is coerced before it is
/// handed to the rendering engine (see [`TypedValue::coerce`](crate::TypedValue::coerce)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterType {
    /// Free text, passed through unchanged.
    String,
    /// 32-bit signed integer.
    Integer,
    /// 64-bit signed integer.
    Long,
    /// `true` / `false`.
    Boolean,
    /// Calendar date (`YYYY-MM-DD`), normalised to midnight UTC.
    Date,
    /// Instant in time (`YYYY-MM-DD` or RFC 3339).
    Timestamp,
    /// Numeric value, bound as a 32-bit integer.
    Number,
    /// List value, passed through as raw text.
    List,
    /// Anything else, passed through as raw text.
    Object,
}

impl ParameterType {
    /// Returns the canonical lower-case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
            Self::Number => "number",
            Self::List => "list",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for a parameter type name outside the closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown parameter type '{0}'")]
pub struct UnknownParameterType(pub String);

impl FromStr for ParameterType {
    type Err = UnknownParameterType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        // Catalogs generated from report files carry qualified class names.
        let short = lowered
            .strip_prefix("java.lang.")
            .or_else(|| lowered.strip_prefix("java.util."))
            .or_else(|| lowered.strip_prefix("java.sql."))
            .unwrap_or(&lowered);

        let ty = match short {
            "string" | "text" => Self::String,
            "integer" | "int" => Self::Integer,
            "long" => Self::Long,
            "boolean" | "bool" => Self::Boolean,
            "date" => Self::Date,
            "timestamp" => Self::Timestamp,
            "number" => Self::Number,
            "list" | "array" => Self::List,
            "object" => Self::Object,
            _ => return Err(UnknownParameterType(s.to_string())),
        };
        Ok(ty)
    }
}

impl Serialize for ParameterType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ParameterType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Typed description of one input a report accepts.
///
/// Equality covers all four fields. Instances are immutable once built.
///
/// # Example
///
/// ```
/// use clio_core::{ParameterSchema, ParameterType};
///
/// let schema = ParameterSchema::new("report_id", ParameterType::Long).required(true);
/// assert!(schema.is_required());
/// assert_eq!(schema.parameter_type(), ParameterType::Long);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSchema {
    name: String,
    #[serde(default)]
    required: bool,
    #[serde(rename = "type")]
    ty: ParameterType,
    #[serde(default)]
    default: Option<Value>,
}

impl ParameterSchema {
    /// Creates an optional parameter without a default value.
    pub fn new(name: impl Into<String>, ty: ParameterType) -> Self {
        Self {
            name: name.into(),
            required: false,
            ty,
            default: None,
        }
    }

    /// Sets whether the parameter must be supplied.
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Sets the declared default value.
    pub fn with_default(mut self, default: Option<Value>) -> Self {
        self.default = default;
        self
    }

    /// Returns the parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the parameter must be supplied.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the declared type.
    pub fn parameter_type(&self) -> ParameterType {
        self.ty
    }

    /// Returns the declared default, if any.
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_aliases() {
        assert_eq!("text".parse::<ParameterType>().unwrap(), ParameterType::String);
        assert_eq!("INT".parse::<ParameterType>().unwrap(), ParameterType::Integer);
        assert_eq!("bool".parse::<ParameterType>().unwrap(), ParameterType::Boolean);
        assert_eq!("array".parse::<ParameterType>().unwrap(), ParameterType::List);
        assert_eq!("Timestamp".parse::<ParameterType>().unwrap(), ParameterType::Timestamp);
    }

    #[test]
    fn test_qualified_names() {
        assert_eq!(
            "java.lang.Long".parse::<ParameterType>().unwrap(),
            ParameterType::Long
        );
        assert_eq!(
            "java.util.Date".parse::<ParameterType>().unwrap(),
            ParameterType::Date
        );
        assert_eq!(
            "java.sql.Timestamp".parse::<ParameterType>().unwrap(),
            ParameterType::Timestamp
        );
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let err = "uuid".parse::<ParameterType>().unwrap_err();
        assert_eq!(err.to_string(), "unknown parameter type 'uuid'");
    }

    #[test]
    fn test_equality_covers_all_fields() {
        let a = ParameterSchema::new("id", ParameterType::Long).required(true);
        let b = ParameterSchema::new("id", ParameterType::Long).required(true);
        let c = ParameterSchema::new("id", ParameterType::Long);
        let d = ParameterSchema::new("id", ParameterType::Long)
            .required(true)
            .with_default(Some(Value::from(1)));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_schema_json_shape() {
        let schema = ParameterSchema::new("from", ParameterType::Date).required(true);
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["name"], "from");
        assert_eq!(json["required"], true);
        assert_eq!(json["type"], "date");
        assert!(json["default"].is_null());
    }
}
