//! Date ranges used to slice asset history.
//!
//! History ranges are closed intervals: both `begin` and `end` are inclusive,
//! and either side may be left open.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::value::{Document, Value};

/// Wall-clock format accepted alongside RFC 3339, interpreted as UTC.
pub const WALL_CLOCK_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// An inclusive range `[begin, end]` of recording times.
///
/// # Examples
///
/// ```
/// use assetledger::DateRange;
///
/// let range = DateRange::parse(Some("2026-01-01 00:00:00"), Some("2026-01-31T23:59:59Z")).unwrap();
/// assert!(range.contains(range.begin.unwrap()));
/// assert!(range.contains(range.end.unwrap()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DateRange {
    /// Earliest included time. None means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin: Option<DateTime<Utc>>,

    /// Latest included time. None means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Creates a range, rejecting `begin > end`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidTimeRange` if both bounds are set and
    /// `begin` is after `end`.
    pub fn new(begin: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<Self, ValidationError> {
        if let (Some(begin), Some(end)) = (begin, end) {
            if begin > end {
                return Err(ValidationError::InvalidTimeRange { begin, end });
            }
        }
        Ok(Self { begin, end })
    }

    /// Parses optional textual bounds. Empty strings count as absent.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidField` for an unparseable bound and
    /// `ValidationError::InvalidTimeRange` for an inverted range.
    pub fn parse(begin: Option<&str>, end: Option<&str>) -> Result<Self, ValidationError> {
        let begin = begin.map(|s| parse_timestamp("begin", s)).transpose()?.flatten();
        let end = end.map(|s| parse_timestamp("end", s)).transpose()?.flatten();
        Self::new(begin, end)
    }

    /// Decodes `{begin?, end?}` from a caller document.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidField` if a bound is not a string, plus
    /// any error from [`DateRange::parse`].
    pub fn from_document(doc: &Document) -> Result<Self, ValidationError> {
        let bound = |field: &str| -> Result<Option<&str>, ValidationError> {
            match doc.get(field) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) => Ok(Some(s.as_str())),
                Some(other) => Err(ValidationError::InvalidField {
                    field: field.to_string(),
                    reason: format!("expected date string, got {}", other.type_name()),
                }),
            }
        };
        Self::parse(bound("begin")?, bound("end")?)
    }

    /// Check if a timestamp falls within `[begin, end]`.
    #[must_use]
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.begin.map_or(true, |b| time >= b) && self.end.map_or(true, |e| time <= e)
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let side = |t: Option<DateTime<Utc>>| t.map_or_else(|| "*".to_string(), |t| t.to_rfc3339());
        write!(f, "[{}, {}]", side(self.begin), side(self.end))
    }
}

/// Parses RFC 3339 or `yyyy-mm-dd hh:mm:ss` (UTC). Blank input yields `None`.
///
/// # Errors
///
/// Returns `ValidationError::InvalidField` naming `field` if neither format
/// matches.
pub fn parse_timestamp(field: &str, text: &str) -> Result<Option<DateTime<Utc>>, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Ok(Some(t.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(text, WALL_CLOCK_FORMAT)
        .map(|naive| Some(Utc.from_utc_datetime(&naive)))
        .map_err(|e| ValidationError::InvalidField {
            field: field.to_string(),
            reason: format!("'{text}' is neither RFC 3339 nor '{WALL_CLOCK_FORMAT}': {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn at(s: &str) -> DateTime<Utc> {
        parse_timestamp("t", s).unwrap().unwrap()
    }

    #[test]
    fn test_parse_both_formats() {
        assert_eq!(at("2026-03-01 12:30:00"), at("2026-03-01T12:30:00Z"));
        assert_eq!(at("2026-03-01T14:30:00+02:00"), at("2026-03-01 12:30:00"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_timestamp("begin", "yesterday").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { ref field, .. } if field == "begin"));
    }

    #[test]
    fn test_blank_bounds_are_open() {
        let range = DateRange::parse(Some(""), None).unwrap();
        assert_eq!(range, DateRange::default());
        assert!(range.contains(Utc::now()));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let begin = at("2026-01-01 00:00:00");
        let end = at("2026-01-02 00:00:00");
        let range = DateRange::new(Some(begin), Some(end)).unwrap();
        assert!(range.contains(begin));
        assert!(range.contains(end));
        assert!(!range.contains(end + Duration::seconds(1)));
        assert!(!range.contains(begin - Duration::seconds(1)));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let err = DateRange::parse(Some("2026-02-01 00:00:00"), Some("2026-01-01 00:00:00")).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidTimeRange { .. }));
    }

    #[test]
    fn test_single_instant_range() {
        let t = at("2026-05-05 05:05:05");
        let range = DateRange::new(Some(t), Some(t)).unwrap();
        assert!(range.contains(t));
    }

    #[test]
    fn test_from_document() {
        let doc = Document::from_json(json!({"begin": "2026-01-01 00:00:00"})).unwrap();
        let range = DateRange::from_document(&doc).unwrap();
        assert!(range.begin.is_some());
        assert!(range.end.is_none());

        let bad = Document::from_json(json!({"end": 17})).unwrap();
        assert!(DateRange::from_document(&bad).is_err());
    }
}
