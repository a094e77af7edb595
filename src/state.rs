//! Persisted asset state and the result event emitted by every invocation.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;
use crate::registry::AssetClass;
use crate::rules::AlertEvaluation;
use crate::storage::StorageError;
use crate::value::Document;

/// Name of the result event attached to every invocation.
pub const INVOKE_RESULT_EVENT: &str = "EVT.IOTCP.INVOKE.RESULT";

/// Outcome status of an invocation.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ERROR")]
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("OK"),
            Self::Error => f.write_str("ERROR"),
        }
    }
}

/// `{status, message?}` block of a result event.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeResult {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Payload of the result event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    /// Absent only in events decoded from older payloads.
    #[serde(rename = "invokeresult")]
    pub invoke_result: Option<InvokeResult>,
    /// Alerts active after this invocation.
    #[serde(default)]
    pub active_alerts: BTreeSet<String>,
    /// Alerts that became active with this invocation.
    #[serde(default)]
    pub alerts_raised: BTreeSet<String>,
    /// Alerts that this invocation cleared.
    #[serde(default)]
    pub alerts_cleared: BTreeSet<String>,
}

/// Structured result event, `{name, payload}`.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOut {
    pub name: String,
    pub payload: EventPayload,
}

impl EventOut {
    /// Successful result carrying the alert diff of a rule evaluation.
    #[must_use]
    pub fn ok(alerts: &AlertEvaluation) -> Self {
        Self {
            name: INVOKE_RESULT_EVENT.to_string(),
            payload: EventPayload {
                invoke_result: Some(InvokeResult {
                    status: Status::Ok,
                    message: None,
                }),
                active_alerts: alerts.active.clone(),
                alerts_raised: alerts.raised.clone(),
                alerts_cleared: alerts.cleared.clone(),
            },
        }
    }

    /// Failed result with a caller-facing message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            name: INVOKE_RESULT_EVENT.to_string(),
            payload: EventPayload {
                invoke_result: Some(InvokeResult {
                    status: Status::Error,
                    message: Some(message.into()),
                }),
                ..EventPayload::default()
            },
        }
    }

    /// Status of the embedded invoke result.
    #[must_use]
    pub fn status(&self) -> Option<Status> {
        self.payload.invoke_result.as_ref().map(|r| r.status)
    }
}

/// The durable state of one asset as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetState {
    /// Primary key of the asset.
    #[serde(rename = "assetID")]
    pub asset_id: String,
    /// Owning class.
    pub class: AssetClass,
    /// Merged state document.
    pub state: Document,
    /// The event that produced this state.
    #[serde(rename = "eventin")]
    pub event_in: Document,
    /// Result event of the producing invocation.
    #[serde(rename = "eventout")]
    pub event_out: EventOut,
    /// Active alerts.
    pub alerts: BTreeSet<String>,
    /// True iff `alerts` is empty.
    pub compliant: bool,
    /// ID of the transaction that wrote this state.
    #[serde(rename = "txnid")]
    pub txn_id: String,
    /// Timestamp of that transaction.
    #[serde(rename = "txnts")]
    pub txn_ts: DateTime<Utc>,
}

impl AssetState {
    /// Builds a state record; `compliant` is derived from the evaluation.
    #[must_use]
    pub fn new(
        class: &AssetClass,
        asset_id: impl Into<String>,
        state: Document,
        event_in: Document,
        evaluation: &AlertEvaluation,
        txn_id: impl Into<String>,
        txn_ts: DateTime<Utc>,
    ) -> Self {
        Self {
            asset_id: asset_id.into(),
            class: class.clone(),
            state,
            event_in,
            event_out: EventOut::ok(evaluation),
            alerts: evaluation.active.clone(),
            compliant: evaluation.compliant(),
            txn_id: txn_id.into(),
            txn_ts,
        }
    }

    /// Encodes the record for the ledger.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the record cannot be encoded.
    pub fn encode(&self) -> Result<Document, StorageError> {
        Document::from_serializable(self).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// Decodes a ledger record stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::CorruptState` if the record does not have the
    /// expected shape or its `compliant` flag disagrees with its alerts.
    pub fn decode(key: &str, doc: &Document) -> Result<Self, ExecutionError> {
        let state: Self = doc
            .deserialize_into()
            .map_err(|reason| ExecutionError::CorruptState {
                key: key.to_string(),
                reason,
            })?;
        if state.compliant != state.alerts.is_empty() {
            return Err(ExecutionError::CorruptState {
                key: key.to_string(),
                reason: format!(
                    "compliant={} with {} active alert(s)",
                    state.compliant,
                    state.alerts.len()
                ),
            });
        }
        Ok(state)
    }

    /// Decodes a record that must belong to `class`.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::CorruptState` for anything [`AssetState::decode`]
    /// rejects, or if the record was written by another class.
    pub fn decode_for(class: &AssetClass, key: &str, doc: &Document) -> Result<Self, ExecutionError> {
        let state = Self::decode(key, doc)?;
        if state.class.name != class.name {
            return Err(ExecutionError::CorruptState {
                key: key.to_string(),
                reason: format!("record belongs to class '{}', expected '{}'", state.class.name, class.name),
            });
        }
        Ok(state)
    }
}
