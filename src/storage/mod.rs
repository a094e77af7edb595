//! Ledger adapter for AssetLedger.
//!
//! The engine talks to the ledger only through the [`LedgerStore`] trait.
//! [`InMemoryLedger`] is the embedded backend used by tests and the replay
//! binary; ledger-backed deployments provide their own implementation.

pub mod keys;
mod memory;
mod traits;
mod transaction;

pub use memory::InMemoryLedger;
pub use traits::{HistoryEntry, LedgerStore, PrefixIter, StorageError};
pub use transaction::{generate_txid, Transaction};
