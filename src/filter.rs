//! Generic filtering of documents by qualified-property selectors.
//!
//! A filter combines a match policy with an ordered list of selectors. It is
//! used both by collection reads (`readAll*`, history) and as the trigger of
//! every rule. Properties are compared through their string form; ordering
//! operators compare numerically.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;
use crate::path::QualifiedPath;
use crate::value::{Document, Value};

const REGEX_CACHE_MAX: usize = 1024;

static REGEX_CACHE: OnceLock<RwLock<HashMap<String, Regex>>> = OnceLock::new();

fn cached_regex(pattern: &str) -> Result<Regex, ValidationError> {
    let cache = REGEX_CACHE.get_or_init(|| RwLock::new(HashMap::new()));

    if let Ok(guard) = cache.read() {
        if let Some(re) = guard.get(pattern) {
            return Ok(re.clone());
        }
    }

    let compiled = Regex::new(pattern).map_err(|e| ValidationError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;

    // A poisoned cache only costs a recompile next time.
    if let Ok(mut guard) = cache.write() {
        if guard.len() >= REGEX_CACHE_MAX {
            guard.clear();
        }
        guard
            .entry(pattern.to_string())
            .or_insert_with(|| compiled.clone());
    }
    Ok(compiled)
}

/// How the selectors of a filter combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MatchPolicy {
    /// Filtering disabled: everything matches.
    #[default]
    #[serde(rename = "n/a")]
    NotApplicable,
    /// Every selector must match.
    #[serde(rename = "all")]
    All,
    /// At least one selector must match.
    #[serde(rename = "any")]
    Any,
    /// No selector may match.
    #[serde(rename = "none")]
    None,
}

/// Comparison applied by a single selector.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    #[default]
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Regex,
}

impl Comparison {
    const fn is_eq(&self) -> bool {
        matches!(self, Self::Eq)
    }

    const fn is_ordering(self) -> bool {
        matches!(self, Self::Lt | Self::Le | Self::Gt | Self::Ge)
    }
}

fn scalar_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Array(_) | Value::Object(_) => Err(serde::de::Error::custom(
            "selector value must be a string, number or boolean",
        )),
        other => Ok(other.stringify()),
    }
}

/// A qualified property and the value it is compared against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selector {
    /// Property to compare, e.g. `asset.carrier`.
    pub qprop: QualifiedPath,
    /// Comparison operand, always held in string form.
    #[serde(deserialize_with = "scalar_as_string")]
    pub value: String,
    /// Comparison operator; equality when omitted.
    #[serde(default, skip_serializing_if = "Comparison::is_eq")]
    pub op: Comparison,
}

impl Selector {
    /// Creates a selector with an explicit comparison.
    #[must_use]
    pub fn new(qprop: QualifiedPath, op: Comparison, value: impl Into<String>) -> Self {
        Self {
            qprop,
            value: value.into(),
            op,
        }
    }

    /// Creates an equality selector.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidPath` if `qprop` is malformed.
    pub fn eq(qprop: &str, value: impl Into<String>) -> Result<Self, ValidationError> {
        Ok(Self::new(QualifiedPath::parse(qprop)?, Comparison::Eq, value))
    }

    /// Creates a selector with the given comparison.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidPath` if `qprop` is malformed.
    pub fn compare(
        qprop: &str,
        op: Comparison,
        value: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Ok(Self::new(QualifiedPath::parse(qprop)?, op, value))
    }

    /// Checks operand well-formedness for the chosen comparison.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPattern` for a bad regex and `InvalidField` for a
    /// non-numeric ordering operand.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.op {
            Comparison::Regex => cached_regex(&self.value).map(|_| ()),
            op if op.is_ordering() && self.value.trim().parse::<f64>().is_err() => {
                Err(ValidationError::InvalidField {
                    field: format!("select[{}].value", self.qprop),
                    reason: format!("'{}' is not numeric", self.value),
                })
            }
            _ => Ok(()),
        }
    }

    /// Tests this selector against `doc`. An absent property never matches.
    #[must_use]
    pub fn test(&self, doc: &Document) -> bool {
        let Some(actual) = self.qprop.get(doc) else {
            return false;
        };

        match self.op {
            Comparison::Eq => actual.stringify() == self.value,
            Comparison::Ne => actual.stringify() != self.value,
            Comparison::Regex => {
                cached_regex(&self.value).is_ok_and(|re| re.is_match(&actual.stringify()))
            }
            op => {
                let (Some(lhs), Ok(rhs)) = (actual.as_f64(), self.value.trim().parse::<f64>()) else {
                    return false;
                };
                let Some(ord) = lhs.partial_cmp(&rhs) else {
                    return false;
                };
                match op {
                    Comparison::Lt => ord == Ordering::Less,
                    Comparison::Le => ord != Ordering::Greater,
                    Comparison::Gt => ord == Ordering::Greater,
                    Comparison::Ge => ord != Ordering::Less,
                    _ => false,
                }
            }
        }
    }
}

/// A match policy plus ordered selectors.
///
/// `n/a` or an empty `select` matches everything.
///
/// # Examples
///
/// ```
/// use assetledger::{Document, Filter, Selector};
///
/// let state = Document::parse(r#"{"asset":{"carrier":"UPS"}}"#).unwrap();
/// let ups = Filter::all(vec![Selector::eq("asset.carrier", "UPS").unwrap()]);
/// assert!(ups.matches(&state));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Filter {
    /// How selectors combine.
    #[serde(rename = "match", default)]
    pub policy: MatchPolicy,
    /// Ordered selectors.
    #[serde(default)]
    pub select: Vec<Selector>,
}

impl Filter {
    /// A filter that matches every document.
    #[must_use]
    pub fn match_everything() -> Self {
        Self::default()
    }

    /// Matches when every selector matches.
    #[must_use]
    pub fn all(select: Vec<Selector>) -> Self {
        Self {
            policy: MatchPolicy::All,
            select,
        }
    }

    /// Matches when at least one selector matches.
    #[must_use]
    pub fn any(select: Vec<Selector>) -> Self {
        Self {
            policy: MatchPolicy::Any,
            select,
        }
    }

    /// Matches when no selector matches.
    #[must_use]
    pub fn none(select: Vec<Selector>) -> Self {
        Self {
            policy: MatchPolicy::None,
            select,
        }
    }

    /// Decodes a filter from a caller-supplied document.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidField` if the document is not a valid
    /// filter, or any selector fails [`Selector::validate`].
    pub fn from_document(doc: &Document) -> Result<Self, ValidationError> {
        let filter: Self = doc
            .deserialize_into()
            .map_err(|reason| ValidationError::InvalidField {
                field: "filter".to_string(),
                reason,
            })?;
        filter.validate()?;
        Ok(filter)
    }

    /// Validates every selector.
    ///
    /// # Errors
    ///
    /// See [`Selector::validate`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.select.iter().try_for_each(Selector::validate)
    }

    /// Returns true if this filter is disabled and matches everything.
    #[must_use]
    pub fn is_pass_through(&self) -> bool {
        self.policy == MatchPolicy::NotApplicable || self.select.is_empty()
    }

    /// Evaluates the filter against `doc`.
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        if self.is_pass_through() {
            return true;
        }

        match self.policy {
            MatchPolicy::NotApplicable => true,
            MatchPolicy::All => self.select.iter().all(|s| s.test(doc)),
            MatchPolicy::Any => self.select.iter().any(|s| s.test(doc)),
            MatchPolicy::None => !self.select.iter().any(|s| s.test(doc)),
        }
    }
}
