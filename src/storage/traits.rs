//! Abstract storage traits for AssetLedger.
//!
//! A ledger is a key-value store with two keyspaces: the current world state
//! and an append-only history per key. Implementations must be safe to share
//! across threads; the engine itself never spawns any.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time::DateRange;
use crate::value::Document;

/// Errors that can occur during storage operations.
///
/// Every storage error is fatal to the enclosing transaction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Backend error.
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// One immutable history record of an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Per-key sequence number, strictly increasing and never reused.
    pub sequence: u64,
    /// Transaction timestamp of the write that produced this entry.
    pub recorded_at: DateTime<Utc>,
    /// Full asset state as persisted by that write.
    pub document: Document,
}

/// Lazy iterator over `(key, document)` pairs of a prefix scan.
pub type PrefixIter<'a> = Box<dyn Iterator<Item = (String, Document)> + 'a>;

/// Storage trait for the asset ledger.
///
/// # Ordering
/// - `iterate_prefix` yields keys in ascending lexical order
/// - `get_history` yields entries in ascending sequence order
pub trait LedgerStore: Send + Sync {
    /// Get the current document under `key`.
    fn get_current(&self, key: &str) -> Result<Option<Document>, StorageError>;

    /// Insert or overwrite the current document under `key`.
    fn put_current(&self, key: &str, doc: Document) -> Result<(), StorageError>;

    /// Remove the current document under `key`. Returns whether it existed.
    /// History is untouched.
    fn delete_current(&self, key: &str) -> Result<bool, StorageError>;

    /// Append a history entry for `key` and return its sequence number.
    fn append_history(
        &self,
        key: &str,
        recorded_at: DateTime<Utc>,
        doc: Document,
    ) -> Result<u64, StorageError>;

    /// History of `key`, optionally restricted to an inclusive date range.
    fn get_history(
        &self,
        key: &str,
        range: Option<&DateRange>,
    ) -> Result<Vec<HistoryEntry>, StorageError>;

    /// Iterate current documents whose key starts with `prefix`.
    fn iterate_prefix(&self, prefix: &str) -> Result<PrefixIter<'_>, StorageError>;

    /// Drop all history of `key`, returning the number of removed entries.
    /// Later appends continue the sequence where it left off.
    fn delete_history(&self, key: &str) -> Result<usize, StorageError>;

    /// Remove every current document and every history entry.
    fn clear_all(&self) -> Result<(), StorageError>;
}
