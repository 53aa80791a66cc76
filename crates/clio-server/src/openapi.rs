//! OpenAPI 3.0 document describing the compiled catalog.
//!
//! The document is generated once from the [`RouteTable`] at startup and
//! served from memory.

use bytes::Bytes;
use clio_core::{OutputFormat, ParameterSchema, ParameterType, ReportMethod, ReportResource};
use serde_json::{json, Map, Value};

use crate::routes::{RouteKind, RouteTable};

/// OpenAPI version emitted.
pub const OPENAPI_VERSION: &str = "3.0.3";

/// A pre-serialized OpenAPI document.
#[derive(Debug, Clone)]
pub struct OpenApiDocument {
    json: Bytes,
}

impl OpenApiDocument {
    /// Generates and serializes the document for `table`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn from_routes(table: &RouteTable) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_vec(&generate(table))?;
        Ok(Self {
            json: Bytes::from(json),
        })
    }

    /// Returns the serialized document.
    pub fn bytes(&self) -> Bytes {
        self.json.clone()
    }
}

/// Builds the OpenAPI document as a JSON value.
pub fn generate(table: &RouteTable) -> Value {
    let mut paths = Map::new();

    for (method, path, target) in table.routes() {
        let resource = target.resource();
        let mut operation = match target.kind() {
            RouteKind::Report { extension } => {
                let formats: Vec<_> = match extension {
                    Some(format) => vec![format],
                    None => resource.formats().iter().copied().collect(),
                };
                report_operation(resource, &formats)
            }
            RouteKind::Info => info_operation(resource),
        };

        if let Value::Object(fields) = &mut operation {
            fields.insert("operationId".to_string(), json!(operation_id(method, path)));
        }

        let item = paths
            .entry(path.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(item) = item {
            item.insert(method.as_str().to_lowercase(), operation);
        }
    }

    paths.insert(
        table.listing_path(),
        json!({
            "get": {
                "summary": "List all reports",
                "operationId": "listReports",
                "tags": ["catalog"],
                "responses": {
                    "200": {
                        "description": "Every report with its routes, methods and formats",
                        "content": { "application/json": { "schema": { "type": "array", "items": { "type": "object" } } } }
                    }
                }
            }
        }),
    );

    json!({
        "openapi": OPENAPI_VERSION,
        "info": {
            "title": "Clio Reports",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "paths": paths,
        "components": {
            "schemas": {
                "Error": {
                    "type": "object",
                    "required": ["message", "error"],
                    "properties": {
                        "message": { "type": "string" },
                        "error": { "type": "boolean" }
                    }
                }
            },
            "securitySchemes": {
                "basicAuth": { "type": "http", "scheme": "basic" }
            }
        }
    })
}

fn report_operation(resource: &ReportResource, formats: &[OutputFormat]) -> Value {
    let definition = resource.definition();
    let content: Map<String, Value> = formats
        .iter()
        .map(|f| {
            (
                f.media_type().to_string(),
                json!({ "schema": { "type": "string", "format": "binary" } }),
            )
        })
        .collect();

    json!({
        "summary": definition.name(),
        "description": definition.description(),
        "tags": ["reports"],
        "parameters": definition.parameters().iter().map(parameter).collect::<Vec<_>>(),
        "responses": {
            "200": { "description": "The generated report", "content": content },
            "400": error_response("Unsupported output type or invalid parameters"),
            "401": error_response("Missing or invalid credentials"),
            "500": error_response("Report generation failed")
        }
    })
}

fn info_operation(resource: &ReportResource) -> Value {
    json!({
        "summary": format!("Describe {}", resource.name()),
        "tags": ["catalog"],
        "responses": {
            "200": {
                "description": "Report name, version, description and parameters",
                "content": { "application/json": { "schema": { "type": "object" } } }
            },
            "401": error_response("Missing or invalid credentials")
        }
    })
}

fn parameter(schema: &ParameterSchema) -> Value {
    let mut value = json!({
        "name": schema.name(),
        "in": "query",
        "required": schema.is_required(),
        "schema": schema_for(schema.parameter_type()),
    });
    if let (Some(default), Some(Value::Object(inner))) =
        (schema.default_value(), value.get_mut("schema"))
    {
        inner.insert("default".to_string(), default.clone());
    }
    value
}

fn schema_for(ty: ParameterType) -> Value {
    match ty {
        ParameterType::String | ParameterType::Object => json!({ "type": "string" }),
        ParameterType::Integer | ParameterType::Number => {
            json!({ "type": "integer", "format": "int32" })
        }
        ParameterType::Long => json!({ "type": "integer", "format": "int64" }),
        ParameterType::Boolean => json!({ "type": "boolean" }),
        ParameterType::Date => json!({ "type": "string", "format": "date" }),
        ParameterType::Timestamp => json!({ "type": "string", "format": "date-time" }),
        ParameterType::List => json!({ "type": "array", "items": { "type": "string" } }),
    }
}

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Error" } } }
    })
}

/// `GET /api/daily_sales.pdf` becomes `getApiDailySalesPdf`.
fn operation_id(method: ReportMethod, path: &str) -> String {
    format!("{}{}", method.as_str().to_lowercase(), capitalize(&camel_case(path)))
}

fn camel_case(name: &str) -> String {
    let mut out = String::new();
    let mut upper = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if upper && !out.is_empty() {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c.to_ascii_lowercase());
            }
            upper = false;
        } else {
            upper = true;
        }
    }
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars
        .next()
        .map(|first| first.to_ascii_uppercase().to_string() + chars.as_str())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ResourceCompiler;
    use clio_config::ConfigLoader;

    fn table() -> (tempfile::TempDir, RouteTable) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sales.prpt"), b"").unwrap();
        let config = ConfigLoader::new()
            .with_string(
                r#"
apiRoot: /api
reports:
  - name: Daily Sales
    methods: { post: false }
    ext: [pdf, html]
    file: sales.prpt
    parameters:
      - { name: id, required: true, type: long }
      - { name: region, default: EU }
"#,
                "yaml",
            )
            .unwrap()
            .load()
            .unwrap();
        let table = ResourceCompiler::new(config.api_root(), dir.path())
            .compile(&config.reports)
            .unwrap();
        (dir, table)
    }

    #[test]
    fn test_document_lists_every_route() {
        let (_dir, table) = table();
        let doc = generate(&table);

        assert_eq!(doc["openapi"], OPENAPI_VERSION);
        let paths = doc["paths"].as_object().unwrap();
        for path in [
            "/api/daily_sales",
            "/api/daily_sales.pdf",
            "/api/daily_sales.html",
            "/api/daily_sales/info",
            "/api/reports.json",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }
        assert!(paths["/api/daily_sales"].get("post").is_none());
    }

    #[test]
    fn test_report_operation_shape() {
        let (_dir, table) = table();
        let doc = generate(&table);
        let get = &doc["paths"]["/api/daily_sales"]["get"];

        assert_eq!(get["operationId"], "getApiDailySales");
        let content = get["responses"]["200"]["content"].as_object().unwrap();
        assert!(content.contains_key("application/pdf"));
        assert!(content.contains_key("text/html"));

        let params = get["parameters"].as_array().unwrap();
        assert_eq!(params[0]["name"], "id");
        assert_eq!(params[0]["required"], true);
        assert_eq!(params[0]["schema"]["format"], "int64");
        assert_eq!(params[1]["schema"]["default"], "EU");

        let pdf = &doc["paths"]["/api/daily_sales.pdf"]["get"];
        assert_eq!(pdf["operationId"], "getApiDailySalesPdf");
        assert_eq!(pdf["responses"]["200"]["content"].as_object().unwrap().len(), 1);
    }

    #[test]
    fn test_document_has_no_file_paths() {
        let (dir, table) = table();
        let doc = OpenApiDocument::from_routes(&table).unwrap();
        let text = String::from_utf8(doc.bytes().to_vec()).unwrap();
        assert!(!text.contains("sales.prpt"));
        assert!(!text.contains(dir.path().to_str().unwrap()));
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("/api/daily_sales.pdf"), "apiDailySalesPdf");
        assert_eq!(capitalize("x"), "X");
        assert_eq!(capitalize(""), "");
    }
}
