//! Deep merge of partial events into asset state.
//!
//! Every incoming event is a sparse patch: documents merge recursively,
//! anything else (scalars, arrays) is replaced by the incoming value, and
//! properties only present in the existing state are preserved.

use crate::value::{Document, Value};

/// Merges `incoming` over `existing`, returning the combined document.
///
/// An absent `existing` yields `incoming` unchanged (first write acts as create).
///
/// # Examples
///
/// ```
/// use assetledger::{merge, Document};
///
/// let existing = Document::parse(r#"{"asset":{"assetID":"A1","carrier":"UPS"}}"#).unwrap();
/// let event = Document::parse(r#"{"asset":{"assetID":"A1","temperature":4}}"#).unwrap();
/// let merged = merge(Some(&existing), &event);
/// assert_eq!(
///     merged.to_json(),
///     serde_json::json!({"asset":{"assetID":"A1","carrier":"UPS","temperature":4}})
/// );
/// ```
#[must_use]
pub fn merge(existing: Option<&Document>, incoming: &Document) -> Document {
    match existing {
        None => incoming.clone(),
        Some(existing) => {
            let mut out = existing.clone();
            merge_into(&mut out, incoming);
            out
        }
    }
}

/// In-place form of [`merge`].
pub fn merge_into(target: &mut Document, incoming: &Document) {
    for (key, value) in incoming.iter() {
        if let (Some(Value::Object(existing)), Value::Object(patch)) = (target.get_mut(key), value) {
            merge_into(existing, patch);
            continue;
        }
        target.insert(key.clone(), value.clone());
    }
}
