//! Per-class asset operations.

use std::collections::BTreeSet;

use serde_json::{json, Value as Json};
use tracing::{debug, info};

use super::{filter_arg, first_arg, to_json, AssetEngine};
use crate::error::{AssetError, AssetResult, ExecutionError, ValidationError};
use crate::merge::merge;
use crate::path::{self, QualifiedPath};
use crate::registry::AssetClass;
use crate::state::AssetState;
use crate::storage::Transaction;
use crate::time::DateRange;
use crate::value::{Document, Value};

fn not_found(class: &AssetClass, asset_id: impl Into<String>) -> AssetError {
    ExecutionError::AssetNotFound {
        class: class.name.clone(),
        asset_id: asset_id.into(),
    }
    .into()
}

/// Parses `qprops`. Paths not rooted at the class object (`common.location`
/// for class `asset`) are qualified with it.
fn qprops_arg(class: &AssetClass, arg: &Document) -> Result<Vec<QualifiedPath>, ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidField {
        field: "qprops".to_string(),
        reason: reason.to_string(),
    };
    let Some(items) = arg.get("qprops").and_then(Value::as_array) else {
        return Err(invalid("expected an array of qualified property names"));
    };
    if items.is_empty() {
        return Err(invalid("at least one property is required"));
    }

    let root = match class.asset_id_path.segments() {
        [root, _, ..] => Some(root.as_str()),
        _ => None,
    };

    items
        .iter()
        .map(|item| {
            let raw = item.as_str().ok_or_else(|| invalid("property names must be strings"))?;
            let path = QualifiedPath::parse(raw)?;
            match root {
                Some(root) if path.segments().first().map(String::as_str) != Some(root) => {
                    QualifiedPath::parse(&format!("{root}.{path}"))
                }
                _ => Ok(path),
            }
        })
        .collect()
}

fn daterange_arg(arg: &Document) -> Result<Option<DateRange>, ValidationError> {
    match arg.get("daterange") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(doc)) => DateRange::from_document(doc).map(Some),
        Some(other) => Err(ValidationError::InvalidField {
            field: "daterange".to_string(),
            reason: format!("expected object, got {}", other.type_name()),
        }),
    }
}

impl AssetEngine {
    /// Primary key of `doc` and the ledger key it addresses in `class`.
    fn asset_ref(&self, class: &AssetClass, doc: &Document) -> AssetResult<(String, String)> {
        let asset_id = class.asset_id_of(doc)?;
        let key = self.asset_key(class, &asset_id)?;
        Ok((asset_id, key))
    }

    fn require_state(txn: &Transaction<'_>, class: &AssetClass, key: &str, asset_id: &str) -> AssetResult<AssetState> {
        Self::load_class_state(txn, class, key)?.ok_or_else(|| not_found(class, asset_id))
    }

    /// Current states of every asset of `class`, in key order.
    ///
    /// Keys of classes with a longer, overlapping prefix are skipped.
    fn class_states(&self, txn: &Transaction<'_>, class: &AssetClass) -> AssetResult<Vec<AssetState>> {
        let mut states = Vec::new();
        for (key, doc) in txn.ledger().iterate_prefix(&class.prefix)? {
            let owned = self
                .registry()
                .resolve_class(&key)
                .is_ok_and(|(owner, _)| owner.name == class.name);
            if owned {
                states.push(AssetState::decode_for(class, &key, &doc)?);
            }
        }
        Ok(states)
    }

    pub(super) fn execute_create(
        &self,
        txn: &Transaction<'_>,
        class: &AssetClass,
        args: &[Document],
    ) -> AssetResult<Json> {
        let event = first_arg("create", args)?;
        let (asset_id, key) = self.asset_ref(class, event)?;
        if txn.ledger().get_current(&key)?.is_some() {
            return Err(ExecutionError::AssetExists {
                class: class.name.clone(),
                asset_id,
            }
            .into());
        }

        let state = merge(None, event);
        let record = self.write_state(txn, class, &key, &asset_id, state, event, &BTreeSet::new())?;
        to_json(&record)
    }

    pub(super) fn execute_read(
        &self,
        txn: &Transaction<'_>,
        class: &AssetClass,
        args: &[Document],
    ) -> AssetResult<Json> {
        let (asset_id, key) = self.asset_ref(class, first_arg("read", args)?)?;
        let record = Self::require_state(txn, class, &key, &asset_id)?;
        debug!(class = %class.name, asset_id = %asset_id, "asset read");
        to_json(&record)
    }

    pub(super) fn execute_read_all(
        &self,
        txn: &Transaction<'_>,
        class: &AssetClass,
        args: &[Document],
    ) -> AssetResult<Json> {
        let filter = filter_arg(args)?;
        let matched: Vec<AssetState> = self
            .class_states(txn, class)?
            .into_iter()
            .filter(|s| filter.matches(&s.state))
            .collect();
        debug!(class = %class.name, matched = matched.len(), "assets listed");
        to_json(&matched)
    }

    pub(super) fn execute_update(
        &self,
        txn: &Transaction<'_>,
        class: &AssetClass,
        args: &[Document],
    ) -> AssetResult<Json> {
        let event = first_arg("update", args)?;
        let (asset_id, key) = self.asset_ref(class, event)?;

        let (state, prior) = match Self::load_class_state(txn, class, &key)? {
            Some(existing) => (merge(Some(&existing.state), event), existing.alerts),
            None if self.create_on_first_update(txn)? => (merge(None, event), BTreeSet::new()),
            None => return Err(not_found(class, asset_id)),
        };

        let record = self.write_state(txn, class, &key, &asset_id, state, event, &prior)?;
        to_json(&record)
    }

    pub(super) fn execute_replace(
        &self,
        txn: &Transaction<'_>,
        class: &AssetClass,
        args: &[Document],
    ) -> AssetResult<Json> {
        let event = first_arg("replace", args)?;
        let (asset_id, key) = self.asset_ref(class, event)?;
        let existing = Self::require_state(txn, class, &key, &asset_id)?;

        let record = self.write_state(txn, class, &key, &asset_id, event.clone(), event, &existing.alerts)?;
        to_json(&record)
    }

    pub(super) fn execute_delete(
        &self,
        txn: &Transaction<'_>,
        class: &AssetClass,
        args: &[Document],
    ) -> AssetResult<Json> {
        let (asset_id, key) = self.asset_ref(class, first_arg("delete", args)?)?;
        let existing = Self::require_state(txn, class, &key, &asset_id)?;
        let recent = Self::recent_keys(txn)?;

        txn.ledger().delete_current(&key)?;
        Self::forget_recent(txn, recent, std::slice::from_ref(&key))?;
        info!(class = %class.name, asset_id = %asset_id, "asset deleted");
        to_json(&existing)
    }

    pub(super) fn execute_delete_all(
        &self,
        txn: &Transaction<'_>,
        class: &AssetClass,
        args: &[Document],
    ) -> AssetResult<Json> {
        let filter = filter_arg(args)?;
        let matched: Vec<AssetState> = self
            .class_states(txn, class)?
            .into_iter()
            .filter(|s| filter.matches(&s.state))
            .collect();
        let recent = Self::recent_keys(txn)?;

        let mut deleted = Vec::with_capacity(matched.len());
        let mut deleted_keys = Vec::with_capacity(matched.len());
        for state in matched {
            let key = class.key_for(&state.asset_id);
            txn.ledger().delete_current(&key)?;
            deleted_keys.push(key);
            deleted.push(state.asset_id);
        }
        Self::forget_recent(txn, recent, &deleted_keys)?;
        info!(class = %class.name, deleted = deleted.len(), "assets deleted");
        Ok(json!(deleted))
    }

    pub(super) fn execute_delete_state_history(
        &self,
        txn: &Transaction<'_>,
        class: &AssetClass,
        args: &[Document],
    ) -> AssetResult<Json> {
        let (asset_id, key) = self.asset_ref(class, first_arg("deleteStateHistory", args)?)?;
        let removed = txn.ledger().delete_history(&key)?;
        info!(class = %class.name, asset_id = %asset_id, removed, "asset history deleted");
        Ok(json!({"assetID": asset_id, "removed": removed}))
    }

    pub(super) fn execute_delete_properties(
        &self,
        txn: &Transaction<'_>,
        class: &AssetClass,
        args: &[Document],
    ) -> AssetResult<Json> {
        let arg = first_arg("deleteProperties", args)?;
        let (asset_id, key) = self.asset_ref(class, arg)?;
        let qprops = qprops_arg(class, arg)?;
        if let Some(protected) = qprops.iter().find(|p| p.is_prefix_of(&class.asset_id_path)) {
            return Err(ValidationError::ProtectedProperty {
                path: protected.to_string(),
            }
            .into());
        }

        let existing = Self::require_state(txn, class, &key, &asset_id)?;
        let mut state = existing.state;
        for qprop in &qprops {
            path::delete(&mut state, qprop);
        }

        let record = self.write_state(txn, class, &key, &asset_id, state, arg, &existing.alerts)?;
        to_json(&record)
    }

    pub(super) fn execute_read_state_history(
        &self,
        txn: &Transaction<'_>,
        class: &AssetClass,
        args: &[Document],
    ) -> AssetResult<Json> {
        let arg = first_arg("readStateHistory", args)?;
        let (asset_id, key) = self.asset_ref(class, arg)?;
        let range = daterange_arg(arg)?;
        let filter = filter_arg(args)?;

        let entries = txn.ledger().get_history(&key, range.as_ref())?;
        if entries.is_empty()
            && txn.ledger().get_current(&key)?.is_none()
            && txn.ledger().get_history(&key, None)?.is_empty()
        {
            return Err(not_found(class, asset_id));
        }

        let mut states = Vec::with_capacity(entries.len());
        for entry in entries {
            let state = AssetState::decode_for(class, &key, &entry.document)?;
            if filter.matches(&state.state) {
                states.push(state);
            }
        }
        debug!(class = %class.name, asset_id = %asset_id, entries = states.len(), "asset history read");
        to_json(&states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Method;
    use crate::engine::test_support::{arg, engine};
    use crate::error::ErrorKind;
    use crate::storage::InMemoryLedger;
    use chrono::{Duration, Utc};

    fn call(engine: &AssetEngine, ledger: &InMemoryLedger, function: &str, method: Method, a: Json) -> Json {
        let txn = Transaction::new(ledger, "tx", Utc::now());
        let outcome = engine.invoke(&txn, function, method, &arg(a)).unwrap();
        assert!(outcome.is_ok(), "{function}: {:?}", outcome.message);
        outcome.payload
    }

    fn failure(engine: &AssetEngine, ledger: &InMemoryLedger, function: &str, method: Method, a: Json) -> ErrorKind {
        let txn = Transaction::new(ledger, "tx", Utc::now());
        let outcome = engine.invoke(&txn, function, method, &arg(a)).unwrap();
        assert!(!outcome.is_ok(), "{function} unexpectedly succeeded");
        outcome.kind.unwrap()
    }

    #[test]
    fn create_then_duplicate_create_fails() {
        let (e, l) = (engine(false), InMemoryLedger::new());
        let out = call(&e, &l, "createAsset", Method::Invoke, json!({"asset": {"assetID": "A1", "temperature": 4}}));
        assert_eq!(out["assetID"], "A1");
        assert_eq!(out["compliant"], true);
        assert_eq!(out["txnid"], "tx");

        let kind = failure(&e, &l, "createAsset", Method::Invoke, json!({"asset": {"assetID": "A1"}}));
        assert_eq!(kind, ErrorKind::AlreadyExists);
    }

    #[test]
    fn missing_primary_key_is_a_validation_error() {
        let (e, l) = (engine(true), InMemoryLedger::new());
        let kind = failure(&e, &l, "updateAsset", Method::Invoke, json!({"asset": {"carrier": "UPS"}}));
        assert_eq!(kind, ErrorKind::Validation);
    }

    #[test]
    fn update_merges_and_carries_alerts() {
        let (e, l) = (engine(false), InMemoryLedger::new());
        call(&e, &l, "createAsset", Method::Invoke, json!({"asset": {"assetID": "A1", "carrier": "UPS"}}));

        let out = call(&e, &l, "updateAsset", Method::Invoke, json!({"asset": {"assetID": "A1", "temperature": -4}}));
        assert_eq!(out["state"]["asset"]["carrier"], "UPS");
        assert_eq!(out["alerts"], json!(["cold"]));
        assert_eq!(out["eventout"]["payload"]["alertsRaised"], json!(["cold"]));

        // No temperature in the event: merged state is still cold, nothing new raised.
        let out = call(&e, &l, "updateAsset", Method::Invoke, json!({"asset": {"assetID": "A1", "carrier": "DHL"}}));
        assert_eq!(out["alerts"], json!(["cold"]));
        assert_eq!(out["eventout"]["payload"]["alertsRaised"], json!([]));

        let out = call(&e, &l, "updateAsset", Method::Invoke, json!({"asset": {"assetID": "A1", "temperature": 2}}));
        assert_eq!(out["compliant"], true);
        assert_eq!(out["eventout"]["payload"]["alertsCleared"], json!(["cold"]));
    }

    #[test]
    fn replace_drops_unmentioned_properties() {
        let (e, l) = (engine(false), InMemoryLedger::new());
        call(&e, &l, "createAsset", Method::Invoke, json!({"asset": {"assetID": "A1", "carrier": "UPS"}}));
        let out = call(&e, &l, "replaceAsset", Method::Invoke, json!({"asset": {"assetID": "A1", "temperature": 9}}));
        assert_eq!(out["state"], json!({"asset": {"assetID": "A1", "temperature": 9}}));

        let kind = failure(&e, &l, "replaceAsset", Method::Invoke, json!({"asset": {"assetID": "ghost"}}));
        assert_eq!(kind, ErrorKind::NotFound);
    }

    #[test]
    fn delete_keeps_history() {
        let (e, l) = (engine(false), InMemoryLedger::new());
        call(&e, &l, "createAsset", Method::Invoke, json!({"asset": {"assetID": "A1"}}));
        call(&e, &l, "deleteAsset", Method::Invoke, json!({"asset": {"assetID": "A1"}}));

        let kind = failure(&e, &l, "readAsset", Method::Query, json!({"asset": {"assetID": "A1"}}));
        assert_eq!(kind, ErrorKind::NotFound);

        let history = call(&e, &l, "readAssetStateHistory", Method::Query, json!({"asset": {"assetID": "A1"}}));
        assert_eq!(history.as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn delete_properties_rejects_primary_key() {
        let (e, l) = (engine(false), InMemoryLedger::new());
        call(
            &e,
            &l,
            "createAsset",
            Method::Invoke,
            json!({"asset": {"assetID": "A1", "common": {"deviceID": "d", "location": {"latitude": 1}}}}),
        );

        for protected in ["asset.assetID", "asset", "assetID"] {
            let kind = failure(
                &e,
                &l,
                "deletePropertiesFromAsset",
                Method::Invoke,
                json!({"asset": {"assetID": "A1"}, "qprops": [protected]}),
            );
            assert_eq!(kind, ErrorKind::Validation, "{protected}");
        }

        let out = call(
            &e,
            &l,
            "deletePropertiesFromAsset",
            Method::Invoke,
            json!({"asset": {"assetID": "A1"}, "qprops": ["common.location"]}),
        );
        assert_eq!(out["state"], json!({"asset": {"assetID": "A1", "common": {"deviceID": "d"}}}));
    }

    #[test]
    fn delete_properties_reevaluates_rules() {
        let (e, l) = (engine(false), InMemoryLedger::new());
        call(&e, &l, "createAsset", Method::Invoke, json!({"asset": {"assetID": "A1", "temperature": -1}}));
        // Removing the reading matches neither rule, so the alert stays.
        let out = call(
            &e,
            &l,
            "deletePropertiesFromAsset",
            Method::Invoke,
            json!({"asset": {"assetID": "A1"}, "qprops": ["asset.temperature"]}),
        );
        assert_eq!(out["alerts"], json!(["cold"]));
        assert_eq!(out["compliant"], false);
    }

    #[test]
    fn history_range_and_filter() {
        let (e, l) = (engine(false), InMemoryLedger::new());
        let t0 = Utc::now() - Duration::hours(3);
        for (i, temp) in [5, -5, 7].into_iter().enumerate() {
            let txn = Transaction::new(&l, "tx", t0 + Duration::hours(i as i64));
            let function = if i == 0 { "createAsset" } else { "updateAsset" };
            let out = e
                .invoke(&txn, function, Method::Invoke, &arg(json!({"asset": {"assetID": "A1", "temperature": temp}})))
                .unwrap();
            assert!(out.is_ok());
        }

        let all = call(&e, &l, "readAssetStateHistory", Method::Query, json!({"asset": {"assetID": "A1"}}));
        let temps: Vec<_> = all.as_array().unwrap().iter().map(|s| s["state"]["asset"]["temperature"].clone()).collect();
        assert_eq!(temps, [json!(5), json!(-5), json!(7)]);

        let begin = (t0 + Duration::hours(1)).to_rfc3339();
        let ranged = call(
            &e,
            &l,
            "readAssetStateHistory",
            Method::Query,
            json!({"asset": {"assetID": "A1"}, "daterange": {"begin": begin}}),
        );
        assert_eq!(ranged.as_array().map(Vec::len), Some(2));

        let cold_only = call(
            &e,
            &l,
            "readAssetStateHistory",
            Method::Query,
            json!({"asset": {"assetID": "A1"}, "filter": {"match": "all", "select": [{"qprop": "asset.temperature", "value": "-5"}]}}),
        );
        assert_eq!(cold_only.as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn history_of_unknown_asset_is_not_found() {
        let (e, l) = (engine(false), InMemoryLedger::new());
        let kind = failure(&e, &l, "readAssetStateHistory", Method::Query, json!({"asset": {"assetID": "nope"}}));
        assert_eq!(kind, ErrorKind::NotFound);
    }

    #[test]
    fn qprops_are_qualified_with_class_root() {
        let class = AssetClass::new("asset", "AST.", "asset.assetID").unwrap();
        let arg = Document::from_json(json!({"qprops": ["common.location", "asset.carrier"]})).unwrap();
        let paths: Vec<_> = qprops_arg(&class, &arg).unwrap().iter().map(ToString::to_string).collect();
        assert_eq!(paths, ["asset.common.location", "asset.carrier"]);

        let empty = Document::from_json(json!({"qprops": []})).unwrap();
        assert!(qprops_arg(&class, &empty).is_err());
    }
}
