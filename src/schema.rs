//! Declarative API contract.
//!
//! The contract is a JSON document of the form
//! `{"API": {<function>: {"properties": {"method": {"enum": [..]}, "args": <schema>}}}}`.
//! It is consumed as static configuration. Only the subset of JSON-Schema
//! keywords the bundled contract uses is checked: `type`, `required`,
//! `enum`, `properties`, `items`, `minItems` and `maxItems`. Everything else
//! is ignored.

use std::path::Path;

use serde_json::Value as Json;

use crate::dispatch::Method;
use crate::error::ValidationError;
use crate::value::Document;

const BUNDLED: &str = include_str!("../schemas/api.json");

/// A loaded API contract.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiContract {
    document: Json,
}

impl ApiContract {
    /// The contract shipped with the crate.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidField` if the bundled document is
    /// malformed.
    pub fn bundled() -> Result<Self, ValidationError> {
        Self::from_str(BUNDLED)
    }

    /// Parses a contract from JSON text.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidField` for malformed JSON or a
    /// document without an `API` object.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> Result<Self, ValidationError> {
        let document: Json = serde_json::from_str(text).map_err(|e| ValidationError::InvalidField {
            field: "contract".to_string(),
            reason: format!("malformed JSON: {e}"),
        })?;
        Self::from_json(document)
    }

    /// Reads a contract file.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidField` if the file cannot be read or
    /// parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ValidationError::InvalidField {
            field: "contract".to_string(),
            reason: format!("{}: {e}", path.display()),
        })?;
        Self::from_str(&text)
    }

    /// Wraps an already-parsed contract document.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidField` if `document.API` is not an
    /// object or a declared method is not one of invoke/query/deploy.
    pub fn from_json(document: Json) -> Result<Self, ValidationError> {
        if !document.get("API").is_some_and(Json::is_object) {
            return Err(ValidationError::InvalidField {
                field: "contract.API".to_string(),
                reason: "expected an object of function declarations".to_string(),
            });
        }
        let contract = Self { document };
        for function in contract.functions() {
            if let Some(declared) = contract.declared_method(function) {
                declared.parse::<Method>().map_err(|reason| ValidationError::InvalidField {
                    field: format!("contract.API.{function}.method"),
                    reason,
                })?;
            }
        }
        Ok(contract)
    }

    /// The full contract document, as returned by `readAssetSchemas`.
    #[must_use]
    pub fn document(&self) -> &Json {
        &self.document
    }

    /// Names of all declared functions, sorted.
    pub fn functions(&self) -> impl Iterator<Item = &str> {
        self.api().into_iter().flat_map(|api| api.keys().map(String::as_str))
    }

    /// True if the contract declares `function`.
    #[must_use]
    pub fn declares(&self, function: &str) -> bool {
        self.declaration(function).is_some()
    }

    /// Declared method of `function`, if any.
    #[must_use]
    pub fn method_of(&self, function: &str) -> Option<Method> {
        self.declared_method(function).and_then(|m| m.parse().ok())
    }

    /// Checks call arguments against the declared `args` schema. Functions
    /// the contract does not declare are accepted as-is.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::SchemaViolation` naming the first offending
    /// location, e.g. `args[0].asset.assetID`.
    pub fn validate_args(&self, function: &str, args: &[Document]) -> Result<(), ValidationError> {
        let Some(schema) = self
            .declaration(function)
            .and_then(|d| d.pointer("/properties/args"))
        else {
            return Ok(());
        };
        let value = Json::Array(args.iter().map(Document::to_json).collect());
        check(schema, &value, "args").map_err(|(path, reason)| ValidationError::SchemaViolation {
            function: function.to_string(),
            path,
            reason,
        })
    }

    fn api(&self) -> Option<&serde_json::Map<String, Json>> {
        self.document.get("API").and_then(Json::as_object)
    }

    fn declaration(&self, function: &str) -> Option<&Json> {
        self.api().and_then(|api| api.get(function))
    }

    fn declared_method(&self, function: &str) -> Option<&str> {
        self.declaration(function)?
            .pointer("/properties/method/enum/0")
            .and_then(Json::as_str)
    }
}

fn type_matches(expected: &str, value: &Json) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn check(schema: &Json, value: &Json, path: &str) -> Result<(), (String, String)> {
    let fail = |reason: String| Err((path.to_string(), reason));

    if let Some(expected) = schema.get("type").and_then(Json::as_str) {
        if !type_matches(expected, value) {
            return fail(format!("expected {expected}, got {}", json_type(value)));
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Json::as_array) {
        if !allowed.contains(value) {
            return fail(format!("{value} is not one of {}", Json::Array(allowed.clone())));
        }
    }

    if let Some(items) = value.as_array() {
        let len = items.len() as u64;
        if let Some(min) = schema.get("minItems").and_then(Json::as_u64) {
            if len < min {
                return fail(format!("expected at least {min} item(s), got {len}"));
            }
        }
        if let Some(max) = schema.get("maxItems").and_then(Json::as_u64) {
            if len > max {
                return fail(format!("expected at most {max} item(s), got {len}"));
            }
        }
        if let Some(item_schema) = schema.get("items") {
            for (i, item) in items.iter().enumerate() {
                check(item_schema, item, &format!("{path}[{i}]"))?;
            }
        }
    }

    if let Some(fields) = value.as_object() {
        if let Some(required) = schema.get("required").and_then(Json::as_array) {
            for name in required.iter().filter_map(Json::as_str) {
                if !fields.contains_key(name) {
                    return Err((format!("{path}.{name}"), "required property is missing".to_string()));
                }
            }
        }
        if let Some(props) = schema.get("properties").and_then(Json::as_object) {
            for (name, prop_schema) in props {
                if let Some(field) = fields.get(name) {
                    check(prop_schema, field, &format!("{path}.{name}"))?;
                }
            }
        }
    }

    Ok(())
}
