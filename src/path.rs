//! Qualified-path access into nested documents.
//!
//! A qualified path is a dot-separated sequence of property names such as
//! `common.location.latitude`. Paths address object properties only; there is
//! no array-index syntax and arrays are treated as whole values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::value::{Document, Value};

/// A parsed, validated qualified property path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QualifiedPath {
    raw: String,
    segments: Vec<String>,
}

impl QualifiedPath {
    /// Parses a dotted path.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidPath` if the path is empty or contains
    /// an empty segment (`a..b`, `.a`, `a.`).
    ///
    /// # Examples
    ///
    /// ```
    /// use assetledger::QualifiedPath;
    ///
    /// let p = QualifiedPath::parse("common.location.latitude").unwrap();
    /// assert_eq!(p.segments().len(), 3);
    /// assert!(QualifiedPath::parse("common..latitude").is_err());
    /// ```
    pub fn parse(path: &str) -> Result<Self, ValidationError> {
        let raw = path.trim();
        if raw.is_empty() {
            return Err(ValidationError::InvalidPath {
                path: path.to_string(),
                reason: "path is empty".to_string(),
            });
        }

        let mut segments = Vec::new();
        for segment in raw.split('.') {
            let segment = segment.trim();
            if segment.is_empty() {
                return Err(ValidationError::InvalidPath {
                    path: path.to_string(),
                    reason: "path contains an empty segment".to_string(),
                });
            }
            segments.push(segment.to_string());
        }

        Ok(Self {
            raw: segments.join("."),
            segments,
        })
    }

    /// Canonical dotted form.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Trimmed, non-empty segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns true if `self` equals `other` or is one of its ancestors.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.segments.len() <= other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a == b)
    }

    /// Looks up the value at this path.
    pub fn get<'a>(&self, doc: &'a Document) -> Option<&'a Value> {
        get(doc, self)
    }
}

impl fmt::Display for QualifiedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for QualifiedPath {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for QualifiedPath {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<QualifiedPath> for String {
    fn from(path: QualifiedPath) -> Self {
        path.raw
    }
}

/// Returns the value addressed by `path`, or `None` if any segment is absent
/// or an intermediate value is not a document.
pub fn get<'a>(doc: &'a Document, path: &QualifiedPath) -> Option<&'a Value> {
    let (last, parents) = path.segments.split_last()?;
    let mut current = doc;
    for segment in parents {
        current = current.get(segment)?.as_object()?;
    }
    current.get(last)
}

/// Sets the value at `path`, creating intermediate documents as needed.
///
/// An intermediate that exists but is not a document is replaced by one, so
/// `get(set(d, p, v), p) == v` holds for every document.
pub fn set(doc: &mut Document, path: &QualifiedPath, value: impl Into<Value>) {
    let Some((last, parents)) = path.segments.split_last() else {
        return;
    };

    let mut current = doc;
    for segment in parents {
        let slot = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Document::new()));
        if !slot.is_object() {
            *slot = Value::Object(Document::new());
        }
        let Value::Object(inner) = slot else {
            return;
        };
        current = inner;
    }
    current.insert(last.clone(), value);
}

/// Removes the value at `path`, returning it if it was present.
///
/// Emptied parent documents are left in place.
pub fn delete(doc: &mut Document, path: &QualifiedPath) -> Option<Value> {
    let (last, parents) = path.segments.split_last()?;
    let mut current = doc;
    for segment in parents {
        current = current.get_mut(segment)?.as_object_mut()?;
    }
    current.remove(last)
}
