//! In-memory storage backend.
//!
//! This module provides a thread-safe in-memory implementation of
//! [`LedgerStore`]. It is intended for embedded usage, tests, and as a
//! reference implementation of the key layout in [`keys`].

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::storage::keys;
use crate::storage::traits::{HistoryEntry, LedgerStore, PrefixIter, StorageError};
use crate::time::DateRange;
use crate::value::Document;

fn lock_err(context: &'static str) -> StorageError {
    StorageError::Backend(format!("poisoned lock: {context}"))
}

/// Sequence encoded in a history key, if `hist_key` belongs to `prefix`.
fn sequence_of(hist_key: &str, prefix: &str) -> Option<u64> {
    let tail = hist_key.strip_prefix(prefix)?;
    if tail.len() != 20 || !tail.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    tail.parse().ok()
}

#[derive(Debug, Default)]
struct LedgerState {
    current: BTreeMap<String, Document>,
    history: BTreeMap<String, HistoryEntry>,
    // Last issued sequence per key; survives history deletion.
    sequences: HashMap<String, u64>,
}

impl LedgerState {
    fn history_keys(&self, key: &str) -> Vec<String> {
        let prefix = keys::history_prefix(key);
        self.history
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| sequence_of(k, &prefix).is_some())
            .map(|(k, _)| k.clone())
            .collect()
    }
}

/// Thread-safe in-memory ledger.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    /// Create a new empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of current-state keys, system keys included.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Backend` if the lock is poisoned.
    pub fn current_len(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("ledger.current_len"))?;
        Ok(state.current.len())
    }

    /// Number of history entries across all keys.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Backend` if the lock is poisoned.
    pub fn history_len(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("ledger.history_len"))?;
        Ok(state.history.len())
    }
}

impl LedgerStore for InMemoryLedger {
    fn get_current(&self, key: &str) -> Result<Option<Document>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("ledger.get_current"))?;
        Ok(state.current.get(key).cloned())
    }

    fn put_current(&self, key: &str, doc: Document) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("ledger.put_current"))?;
        state.current.insert(key.to_string(), doc);
        Ok(())
    }

    fn delete_current(&self, key: &str) -> Result<bool, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("ledger.delete_current"))?;
        Ok(state.current.remove(key).is_some())
    }

    fn append_history(
        &self,
        key: &str,
        recorded_at: DateTime<Utc>,
        doc: Document,
    ) -> Result<u64, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("ledger.append_history"))?;
        let last = state.sequences.get(key).copied().unwrap_or(0);
        let sequence = last.checked_add(1).ok_or_else(|| {
            StorageError::Backend(format!("history sequence exhausted for '{key}'"))
        })?;
        state.sequences.insert(key.to_string(), sequence);
        state.history.insert(
            keys::history_key(key, sequence),
            HistoryEntry {
                sequence,
                recorded_at,
                document: doc,
            },
        );
        Ok(sequence)
    }

    fn get_history(
        &self,
        key: &str,
        range: Option<&DateRange>,
    ) -> Result<Vec<HistoryEntry>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("ledger.get_history"))?;
        let prefix = keys::history_prefix(key);
        Ok(state
            .history
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| sequence_of(k, &prefix).is_some())
            .map(|(_, entry)| entry)
            .filter(|entry| range.map_or(true, |r| r.contains(entry.recorded_at)))
            .cloned()
            .collect())
    }

    fn iterate_prefix(&self, prefix: &str) -> Result<PrefixIter<'_>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("ledger.iterate_prefix"))?;
        // Snapshot under the read lock; the guard cannot outlive this call.
        let snapshot: Vec<(String, Document)> = state
            .current
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Box::new(snapshot.into_iter()))
    }

    fn delete_history(&self, key: &str) -> Result<usize, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("ledger.delete_history"))?;
        let doomed = state.history_keys(key);
        for k in &doomed {
            state.history.remove(k);
        }
        Ok(doomed.len())
    }

    fn clear_all(&self) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("ledger.clear_all"))?;
        state.current.clear();
        state.history.clear();
        Ok(())
    }
}
