//! Typed parameter values handed to the rendering engine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::parameter::ParameterType;

/// A query parameter value after coercion to its declared type.
///
/// Serialises untagged, so a map of values becomes a plain JSON object
/// (`{"id": 42, "from": "2024-01-31T00:00:00Z"}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    /// Raw text.
    Text(String),
    /// 32-bit integer (`Integer` and `Number`).
    Integer(i32),
    /// 64-bit integer.
    Long(i64),
    /// Boolean flag.
    Boolean(bool),
    /// Start of a calendar day, UTC.
    Date(DateTime<Utc>),
    /// Precise instant, UTC.
    Timestamp(DateTime<Utc>),
}

/// A raw value that could not be coerced to its declared type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{value}' is not a valid {expected}")]
pub struct CoercionError {
    /// The declared type.
    pub expected: ParameterType,
    /// The rejected raw value.
    pub value: String,
}

impl TypedValue {
    /// Coerces a raw query value according to `ty`.
    ///
    /// `String`, `List` and `Object` never fail; they keep the raw text.
    ///
    /// # Example
    ///
    /// ```
    /// use clio_core::{ParameterType, TypedValue};
    ///
    /// assert_eq!(TypedValue::coerce(ParameterType::Long, "42").unwrap(), TypedValue::Long(42));
    /// assert!(TypedValue::coerce(ParameterType::Integer, "4x2").is_err());
    /// ```
    pub fn coerce(ty: ParameterType, raw: &str) -> Result<Self, CoercionError> {
        let fail = || CoercionError {
            expected: ty,
            value: raw.to_string(),
        };
        let trimmed = raw.trim();

        match ty {
            ParameterType::Long => trimmed.parse().map(Self::Long).map_err(|_| fail()),
            ParameterType::Integer | ParameterType::Number => {
                trimmed.parse().map(Self::Integer).map_err(|_| fail())
            }
            ParameterType::Boolean => {
                if trimmed.eq_ignore_ascii_case("true") {
                    Ok(Self::Boolean(true))
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Ok(Self::Boolean(false))
                } else {
                    Err(fail())
                }
            }
            ParameterType::Date => parse_day(trimmed).map(Self::Date).ok_or_else(fail),
            ParameterType::Timestamp => DateTime::parse_from_rfc3339(trimmed)
                .map(|instant| instant.with_timezone(&Utc))
                .ok()
                .or_else(|| parse_day(trimmed))
                .map(Self::Timestamp)
                .ok_or_else(fail),
            ParameterType::String | ParameterType::List | ParameterType::Object => {
                Ok(Self::Text(raw.to_string()))
            }
        }
    }
}

fn parse_day(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(
            TypedValue::coerce(ParameterType::Long, "9000000000").unwrap(),
            TypedValue::Long(9_000_000_000)
        );
        assert_eq!(
            TypedValue::coerce(ParameterType::Number, " 12 ").unwrap(),
            TypedValue::Integer(12)
        );
        assert!(TypedValue::coerce(ParameterType::Integer, "9000000000").is_err());
        assert!(TypedValue::coerce(ParameterType::Long, "").is_err());
    }

    #[test]
    fn test_boolean_coercion() {
        assert_eq!(
            TypedValue::coerce(ParameterType::Boolean, "TRUE").unwrap(),
            TypedValue::Boolean(true)
        );
        assert_eq!(
            TypedValue::coerce(ParameterType::Boolean, "false").unwrap(),
            TypedValue::Boolean(false)
        );
        let err = TypedValue::coerce(ParameterType::Boolean, "yes").unwrap_err();
        assert_eq!(err.expected, ParameterType::Boolean);
        assert_eq!(err.value, "yes");
    }

    #[test]
    fn test_date_is_start_of_day_utc() {
        let TypedValue::Date(day) = TypedValue::coerce(ParameterType::Date, "2024-02-29").unwrap()
        else {
            panic!("expected a date");
        };
        assert_eq!((day.year(), day.month(), day.day()), (2024, 2, 29));
        assert_eq!((day.hour(), day.minute(), day.second()), (0, 0, 0));
        assert!(TypedValue::coerce(ParameterType::Date, "2023-02-29").is_err());
        assert!(TypedValue::coerce(ParameterType::Date, "29/02/2024").is_err());
    }

    #[test]
    fn test_timestamp_keeps_precision() {
        let value = TypedValue::coerce(ParameterType::Timestamp, "2024-03-01T10:15:30+02:00").unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 8, 15, 30).unwrap();
        assert_eq!(value, TypedValue::Timestamp(expected));

        let day_only = TypedValue::coerce(ParameterType::Timestamp, "2024-03-01").unwrap();
        let midnight = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(day_only, TypedValue::Timestamp(midnight));
    }

    #[test]
    fn test_text_types_pass_through() {
        for ty in [ParameterType::String, ParameterType::List, ParameterType::Object] {
            assert_eq!(
                TypedValue::coerce(ty, " a,b ").unwrap(),
                TypedValue::Text(" a,b ".to_string())
            );
        }
    }

    #[test]
    fn test_untagged_serialization() {
        let json = serde_json::to_value(TypedValue::Long(7)).unwrap();
        assert_eq!(json, serde_json::json!(7));
        let day = TypedValue::coerce(ParameterType::Date, "2024-01-31").unwrap();
        assert_eq!(serde_json::to_value(day).unwrap(), "2024-01-31T00:00:00Z");
    }
}
