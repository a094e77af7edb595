//! Dynamic document values.
//!
//! Events, states, filters and rule definitions are all schema-less JSON-like
//! documents. They are represented as a tagged variant rather than through
//! reflection, and the qualified-path accessor operates generically over it.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A single value inside a [`Document`].
///
/// # Examples
///
/// ```
/// use assetledger::Value;
///
/// let v = Value::from(5);
/// assert!(v.is_number());
/// assert_eq!(v.stringify(), "5");
/// assert_eq!(Value::from(true).stringify(), "true");
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    /// JSON `null`.
    #[default]
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON number, kept at full precision.
    Number(serde_json::Number),
    /// JSON string.
    String(String),
    /// Ordered list of values.
    Array(Vec<Value>),
    /// Nested document.
    Object(Document),
}

impl Value {
    /// Returns true for `null`.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true for booleans.
    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    /// Returns true for numbers.
    pub const fn is_number(&self) -> bool {
        matches!(self, Self::Number(_))
    }

    /// Returns true for strings.
    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    /// Returns true for arrays.
    pub const fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// Returns true for nested documents.
    pub const fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    /// Boolean payload, if any.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of the value. Strings holding a number are accepted too,
    /// since device payloads frequently carry numbers as text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            Self::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    /// Unsigned integer payload; no string coercion.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    /// String payload, without coercion.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Array elements, if this is an array.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Nested document, if this is an object.
    pub const fn as_object(&self) -> Option<&Document> {
        match self {
            Self::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Mutable nested document.
    pub fn as_object_mut(&mut self) -> Option<&mut Document> {
        match self {
            Self::Object(v) => Some(v),
            _ => None,
        }
    }

    /// String form used for filter comparison.
    ///
    /// Strings yield their raw text, numbers and booleans their JSON text, and
    /// arrays/objects their compact JSON encoding.
    #[must_use]
    pub fn stringify(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(v) => v.to_string(),
            Self::Number(n) => n.to_string(),
            Self::String(s) => s.clone(),
            Self::Array(_) | Self::Object(_) => serde_json::Value::from(self.clone()).to_string(),
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", serde_json::Value::from(self.clone()))
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            serde_json::Value::Object(map) => Self::Object(Document(
                map.into_iter().map(|(k, v)| (k, Self::from(v))).collect(),
            )),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(doc) => doc.into(),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Number(serde_json::Number::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Number(serde_json::Number::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Number(serde_json::Number::from(v))
    }
}

impl From<f64> for Value {
    /// Non-finite floats have no JSON form and become `Null`.
    fn from(v: f64) -> Self {
        serde_json::Number::from_f64(v).map_or(Self::Null, Self::Number)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Self::Object(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::Array(v.into_iter().map(Into::into).collect())
    }
}

/// A key-ordered mapping from property names to values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(BTreeMap<String, Value>);

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a JSON object into a document.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidField` if `value` is not an object.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ValidationError> {
        match Value::from(value) {
            Value::Object(doc) => Ok(doc),
            other => Err(ValidationError::InvalidField {
                field: "document".to_string(),
                reason: format!("expected object, got {}", other.type_name()),
            }),
        }
    }

    /// Parses a JSON text into a document.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidField` on malformed JSON or a non-object root.
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| ValidationError::InvalidField {
                field: "document".to_string(),
                reason: format!("malformed JSON: {e}"),
            })?;
        Self::from_json(value)
    }

    /// Encodes any serializable value as a document.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidField` if `value` does not serialize to an object.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self, ValidationError> {
        let json = serde_json::to_value(value).map_err(|e| ValidationError::InvalidField {
            field: "document".to_string(),
            reason: format!("serialize: {e}"),
        })?;
        Self::from_json(json)
    }

    /// Decodes this document into a typed value.
    ///
    /// # Errors
    ///
    /// Returns the serde error message when the shape does not match `T`.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T, String> {
        serde_json::from_value(self.to_json()).map_err(|e| e.to_string())
    }

    /// JSON form of this document.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        self.clone().into()
    }

    /// Top-level entry for `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Mutable top-level entry for `key`.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    /// Inserts a top-level entry, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Removes a top-level entry.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Returns true if `key` is a top-level entry.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns the entry for `key`, for in-place construction of nested values.
    pub fn entry(&mut self, key: impl Into<String>) -> std::collections::btree_map::Entry<'_, String, Value> {
        self.0.entry(key.into())
    }

    /// Number of top-level entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for `{}`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Top-level keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }
}

impl From<Document> for serde_json::Value {
    fn from(doc: Document) -> Self {
        Self::Object(doc.0.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}
