//! # AssetLedger - schema-driven asset state on a key-value ledger
//!
//! AssetLedger tracks physical or logical assets (shipments, devices,
//! sensors) whose lifecycle arrives as a stream of partial-state events.
//! Every event is deep-merged into the asset's durable state, class rules
//! raise and clear named alerts, and the resulting state is persisted with
//! an append-only history.
//!
//! ## Core Concepts
//!
//! - **Document**: key-ordered JSON-like value tree used for events, states and filters
//! - **QualifiedPath**: dotted property address such as `asset.common.location`
//! - **AssetClass**: key prefix plus primary-key path, e.g. `AST.` / `asset.assetID`
//! - **Rule**: filter trigger plus alert name and raise/clear polarity
//! - **Route**: function name and method mapped to an engine operation
//!
//! ## Usage
//!
//! ```rust
//! use assetledger::{Document, EngineConfig, InMemoryLedger, Method, Transaction};
//!
//! let config = EngineConfig::from_json_str(r#"{
//!     "classes": [{"name": "asset", "prefix": "AST.", "assetidpath": "asset.assetID"}]
//! }"#).unwrap();
//! let engine = config.build().unwrap();
//!
//! let ledger = InMemoryLedger::new();
//! let txn = Transaction::new(&ledger, "tx-1", chrono::Utc::now());
//! let event = Document::parse(r#"{"asset":{"assetID":"A1","carrier":"UPS"}}"#).unwrap();
//!
//! let outcome = engine.invoke(&txn, "createAsset", Method::Invoke, &[event]).unwrap();
//! assert!(outcome.is_ok());
//! assert_eq!(outcome.payload["compliant"], true);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Documents and the pure engine core
pub mod error;
pub mod filter;
pub mod merge;
pub mod path;
pub mod rules;
pub mod time;
pub mod value;

// Registry, ledger and execution
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod registry;
pub mod schema;
pub mod state;
pub mod storage;

// Re-export primary types at crate root for convenience
pub use config::{ClassConfig, EngineConfig, EngineSettings};
pub use dispatch::{InvokeOutcome, Method, Operation, Route, RouteClass, Router};
pub use engine::{global, install_global, AssetEngine};
pub use error::{
    AssetError, AssetResult, ErrorKind, ExecutionError, RegistryError, ValidationError,
};
pub use filter::{Comparison, Filter, MatchPolicy, Selector};
pub use merge::{merge, merge_into};
pub use path::QualifiedPath;
pub use registry::{AssetClass, ClassRegistry, RegistryBuilder};
pub use rules::{evaluate, evaluate_from, AlertEvaluation, Polarity, Rule};
pub use schema::ApiContract;
pub use state::{AssetState, EventOut, Status, INVOKE_RESULT_EVENT};
pub use storage::{HistoryEntry, InMemoryLedger, LedgerStore, StorageError, Transaction};
pub use time::DateRange;
pub use value::{Document, Value};
