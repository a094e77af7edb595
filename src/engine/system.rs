//! System routes: contract identity, settings and ledger-wide views.

use serde_json::{json, Map, Value as Json};
use tracing::{debug, info, warn};

use super::{first_arg, to_json, AssetEngine};
use crate::error::{AssetResult, ValidationError};
use crate::state::AssetState;
use crate::storage::{keys, Transaction};
use crate::value::{Document, Value};

/// Nickname stored by `initContract` when the caller gives none.
pub const DEFAULT_NICKNAME: &str = "IOT Contract Platform";

const CREATE_ON_FIRST_UPDATE: &str = "createOnFirstUpdate";

/// Optional non-negative integer property of the first argument.
fn index_arg(args: &[Document], field: &str) -> Result<Option<usize>, ValidationError> {
    match args.first().and_then(|a| a.get(field)) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| ValidationError::InvalidField {
                field: field.to_string(),
                reason: format!("expected a non-negative integer, got {value}"),
            }),
    }
}

impl AssetEngine {
    /// Effective create-on-first-update switch: the ledger setting if one
    /// was stored, the configured default otherwise.
    pub(super) fn create_on_first_update(&self, txn: &Transaction<'_>) -> AssetResult<bool> {
        let stored = txn
            .ledger()
            .get_current(keys::SETTINGS_KEY)?
            .and_then(|doc| doc.get(CREATE_ON_FIRST_UPDATE).and_then(Value::as_bool));
        Ok(stored.unwrap_or(self.settings().create_on_first_update))
    }

    pub(super) fn execute_set_create_on_first_update(
        &self,
        txn: &Transaction<'_>,
        args: &[Document],
    ) -> AssetResult<Json> {
        let arg = first_arg("setCreateOnFirstUpdate", args)?;
        let enabled = arg
            .get("setCreateOnFirstUpdate")
            .and_then(Value::as_bool)
            .ok_or_else(|| ValidationError::InvalidField {
                field: "setCreateOnFirstUpdate".to_string(),
                reason: "expected a boolean".to_string(),
            })?;

        let mut settings = txn.ledger().get_current(keys::SETTINGS_KEY)?.unwrap_or_default();
        settings.insert(CREATE_ON_FIRST_UPDATE, enabled);
        txn.ledger().put_current(keys::SETTINGS_KEY, settings)?;
        info!(enabled, "create-on-first-update changed");
        Ok(json!({ "createOnFirstUpdate": enabled }))
    }

    pub(super) fn execute_init_contract(&self, txn: &Transaction<'_>, args: &[Document]) -> AssetResult<Json> {
        let arg = first_arg("initContract", args)?;
        let version = arg
            .get("version")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ValidationError::MissingProperty {
                path: "version".to_string(),
            })?;
        let nickname = arg
            .get("nickname")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_NICKNAME);

        let identity = Document::new()
            .with("version", version)
            .with("nickname", nickname)
            .with("txnid", txn.txid())
            .with("txnts", txn.timestamp().to_rfc3339());
        if txn.ledger().get_current(keys::CONTRACT_KEY)?.is_some() {
            warn!(version, "contract re-initialized");
        }
        txn.ledger().put_current(keys::CONTRACT_KEY, identity.clone())?;
        info!(version, nickname, "contract initialized");
        Ok(identity.to_json())
    }

    pub(super) fn execute_read_all_routes(&self) -> AssetResult<Json> {
        let routes: Vec<_> = self.router().routes().collect();
        to_json(&routes)
    }

    pub(super) fn execute_read_all_rules(&self) -> AssetResult<Json> {
        let rules: Vec<_> = self.registry().all_rules().collect();
        to_json(&rules)
    }

    /// Most recently written assets, newest first, sliced by `[begin, end)`.
    pub(super) fn execute_read_recent_states(
        &self,
        txn: &Transaction<'_>,
        args: &[Document],
    ) -> AssetResult<Json> {
        let begin = index_arg(args, "begin")?.unwrap_or(0);
        let end = index_arg(args, "end")?;
        if let Some(end) = end.filter(|&end| end < begin) {
            return Err(ValidationError::InvalidField {
                field: "end".to_string(),
                reason: format!("end ({end}) is before begin ({begin})"),
            }
            .into());
        }

        let mut states = Vec::new();
        for key in Self::recent_keys(txn)? {
            if let Some(state) = Self::load_state(txn, &key)? {
                states.push(state);
            }
        }
        let end = end.unwrap_or(states.len()).min(states.len());
        let window: &[AssetState] = states.get(begin..end).unwrap_or_default();
        debug!(begin, end, returned = window.len(), "recent states read");
        to_json(&window)
    }

    pub(super) fn execute_read_world_state(&self, txn: &Transaction<'_>) -> AssetResult<Json> {
        let world: Map<String, Json> = txn
            .ledger()
            .iterate_prefix("")?
            .map(|(key, doc)| (key, doc.to_json()))
            .collect();
        debug!(keys = world.len(), "world state read");
        Ok(Json::Object(world))
    }

    pub(super) fn execute_delete_world_state(&self, txn: &Transaction<'_>) -> AssetResult<Json> {
        let removed = txn.ledger().iterate_prefix("")?.count();
        txn.ledger().clear_all()?;
        warn!(removed, txid = txn.txid(), "world state deleted");
        Ok(json!({ "removed": removed }))
    }
}
