//! Per-invocation transaction handle.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::storage::traits::LedgerStore;

/// An open transaction: the ledger plus the identity and timestamp of the
/// invocation.
///
/// Commit and rollback belong to the hosting ledger; the engine only reads
/// and writes through the handle.
#[derive(Clone, Copy)]
pub struct Transaction<'a> {
    ledger: &'a dyn LedgerStore,
    txid: &'a str,
    timestamp: DateTime<Utc>,
}

impl<'a> Transaction<'a> {
    /// Opens a handle with a caller-supplied ID and timestamp.
    #[must_use]
    pub fn new(ledger: &'a dyn LedgerStore, txid: &'a str, timestamp: DateTime<Utc>) -> Self {
        Self {
            ledger,
            txid,
            timestamp,
        }
    }

    /// Ledger this transaction writes to.
    pub fn ledger(&self) -> &'a dyn LedgerStore {
        self.ledger
    }

    /// Caller-supplied transaction ID.
    pub fn txid(&self) -> &'a str {
        self.txid
    }

    /// Transaction timestamp; stamps every history entry.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("txid", &self.txid)
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}

/// A fresh random transaction ID for hosts that do not supply one.
#[must_use]
pub fn generate_txid() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryLedger;

    #[test]
    fn handle_exposes_identity() {
        let ledger = InMemoryLedger::new();
        let now = Utc::now();
        let txid = generate_txid();
        let txn = Transaction::new(&ledger, &txid, now);
        assert_eq!(txn.txid(), txid);
        assert_eq!(txn.timestamp(), now);
        assert!(txn.ledger().get_current("missing").unwrap().is_none());
        assert!(format!("{txn:?}").contains(&txid));
    }

    #[test]
    fn generated_ids_are_unique_uuids() {
        let a = generate_txid();
        assert_ne!(a, generate_txid());
        assert!(Uuid::parse_str(&a).is_ok());
    }
}
