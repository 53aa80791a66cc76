//! Binding request parameters to a report's parameter schemas.

use indexmap::IndexMap;

use crate::definition::ReportDefinition;
use crate::error::RequestError;
use crate::value::TypedValue;

/// Typed parameters handed to the rendering engine, in request order.
pub type ParameterMap = IndexMap<String, TypedValue>;

/// Decoded request parameters: each key maps to every value supplied for it.
///
/// Keys keep the order of first appearance.
///
/// # Example
///
/// ```
/// use clio_core::QueryParams;
///
/// let params = QueryParams::parse("id=7&tag=a&tag=b").unwrap();
/// assert_eq!(params.first("id"), Some("7"));
/// assert_eq!(params.all("tag"), &["a".to_string(), "b".to_string()]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: IndexMap<String, Vec<String>>,
}

impl QueryParams {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes an `application/x-www-form-urlencoded` string (query or body).
    pub fn parse(encoded: &str) -> Result<Self, RequestError> {
        let mut params = Self::new();
        params.extend_encoded(encoded)?;
        Ok(params)
    }

    /// Decodes more pairs and appends them after the existing ones.
    pub fn extend_encoded(&mut self, encoded: &str) -> Result<(), RequestError> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(encoded)
            .map_err(|source| RequestError::MalformedParameters { source })?;
        for (key, value) in pairs {
            self.insert(key, value);
        }
        Ok(())
    }

    /// Adds one value for `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.entry(key.into()).or_default().push(value.into());
    }

    /// Returns `true` if `key` was supplied at least once.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the first value supplied for `key`.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns every value supplied for `key`.
    pub fn all(&self, key: &str) -> &[String] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Iterates over keys with their first value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|(key, values)| {
            values.first().map(|value| (key.as_str(), value.as_str()))
        })
    }

    /// Returns the number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no parameters were supplied.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// Binds request parameters against `definition`.
///
/// - A definition without parameters binds to an empty map whatever was sent.
/// - If any mandatory parameter is absent, fails with
///   [`RequestError::MissingRequiredParameters`] listing every absent one, sorted.
/// - Declared parameters are coerced to their type (first value wins); a bad
///   value fails with [`RequestError::ParameterCoercion`].
/// - Undeclared keys are passed through as text.
pub fn bind(definition: &ReportDefinition, params: &QueryParams) -> Result<ParameterMap, RequestError> {
    if !definition.has_parameters() {
        return Ok(ParameterMap::new());
    }

    let mut missing: Vec<String> = definition
        .required_parameters()
        .filter(|schema| !params.contains_key(schema.name()))
        .map(|schema| schema.name().to_string())
        .collect();
    if !missing.is_empty() {
        missing.sort();
        return Err(RequestError::MissingRequiredParameters { missing });
    }

    let mut bound = ParameterMap::with_capacity(params.len());
    for (key, raw) in params.iter() {
        let value = match definition.parameter(key) {
            Some(schema) => TypedValue::coerce(schema.parameter_type(), raw).map_err(|err| {
                RequestError::ParameterCoercion {
                    name: key.to_string(),
                    expected: err.expected,
                    value: err.value,
                }
            })?,
            None => TypedValue::Text(raw.to_string()),
        };
        bound.insert(key.to_string(), value);
    }
    Ok(bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::{ParameterSchema, ParameterType};

    fn two_required() -> ReportDefinition {
        ReportDefinition::new("Statement", "statement.prpt")
            .with_parameters(vec![
                ParameterSchema::new("subreport_1", ParameterType::String).required(true),
                ParameterSchema::new("report_id", ParameterType::Long).required(true),
                ParameterSchema::new("verbose", ParameterType::Boolean),
            ])
            .unwrap()
    }

    fn missing_of(result: Result<ParameterMap, RequestError>) -> Vec<String> {
        match result {
            Err(RequestError::MissingRequiredParameters { missing }) => missing,
            other => panic!("expected missing parameters, got {other:?}"),
        }
    }

    #[test]
    fn test_no_parameters_binds_nothing() {
        let definition = ReportDefinition::new("Plain", "plain.prpt");
        let params: QueryParams = [("anything", "goes")].into_iter().collect();
        assert!(bind(&definition, &params).unwrap().is_empty());
    }

    #[test]
    fn test_none_supplied_lists_all_sorted() {
        let missing = missing_of(bind(&two_required(), &QueryParams::new()));
        assert_eq!(missing, vec!["report_id", "subreport_1"]);
    }

    #[test]
    fn test_one_of_two_supplied_lists_the_other() {
        let params: QueryParams = [("report_id", "12")].into_iter().collect();
        let missing = missing_of(bind(&two_required(), &params));
        assert_eq!(missing, vec!["subreport_1"]);
    }

    #[test]
    fn test_missing_message() {
        let err = bind(&two_required(), &QueryParams::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Please provide all required parameters. The following required parameters not provided: report_id,subreport_1"
        );
    }

    #[test]
    fn test_both_supplied_binds_typed_values() {
        let params = QueryParams::parse("report_id=12&subreport_1=summary&verbose=TRUE").unwrap();
        let bound = bind(&two_required(), &params).unwrap();

        assert_eq!(bound["report_id"], TypedValue::Long(12));
        assert_eq!(bound["subreport_1"], TypedValue::Text("summary".into()));
        assert_eq!(bound["verbose"], TypedValue::Boolean(true));
    }

    #[test]
    fn test_unknown_keys_pass_through() {
        let params = QueryParams::parse("report_id=1&subreport_1=s&locale=en_GB").unwrap();
        let bound = bind(&two_required(), &params).unwrap();
        assert_eq!(bound["locale"], TypedValue::Text("en_GB".into()));
        assert_eq!(bound.len(), 3);
    }

    #[test]
    fn test_malformed_value_is_coercion_error() {
        let params = QueryParams::parse("report_id=abc&subreport_1=s").unwrap();
        let err = bind(&two_required(), &params).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for parameter 'report_id': expected long");
        assert_eq!(err.status_code(), http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_first_value_wins() {
        let params = QueryParams::parse("report_id=1&report_id=2&subreport_1=s").unwrap();
        let bound = bind(&two_required(), &params).unwrap();
        assert_eq!(bound["report_id"], TypedValue::Long(1));
    }

    #[test]
    fn test_parse_decodes_percent_and_plus() {
        let params = QueryParams::parse("name=Jane+Doe&city=S%C3%A3o%20Paulo").unwrap();
        assert_eq!(params.first("name"), Some("Jane Doe"));
        assert_eq!(params.first("city"), Some("São Paulo"));
    }
}
