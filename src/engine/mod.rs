//! Execution engine for AssetLedger.
//!
//! The engine applies routed operations against a
//! [`LedgerStore`](crate::storage::LedgerStore) through a
//! [`Transaction`] handle. It is synchronous and holds no mutable state of
//! its own: classes, rules, routes and the contract are frozen at
//! construction and shared behind an `Arc`.

mod assets;
mod system;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use serde_json::Value as Json;
use tracing::info;

use crate::config::EngineSettings;
use crate::dispatch::{InvokeOutcome, Method, Operation, Route, RouteClass, Router};
use crate::error::{AssetError, AssetResult, ExecutionError, RegistryError, ValidationError};
use crate::filter::Filter;
use crate::registry::{AssetClass, ClassRegistry};
use crate::rules::evaluate_from;
use crate::schema::ApiContract;
use crate::state::AssetState;
use crate::storage::{keys, StorageError, Transaction};
use crate::value::{Document, Value};

static GLOBAL: OnceLock<AssetEngine> = OnceLock::new();

/// Installs the process-wide engine. Only the first call succeeds.
///
/// # Errors
///
/// Returns `RegistryError::AlreadyInitialized` on every later call.
pub fn install_global(engine: AssetEngine) -> Result<&'static AssetEngine, RegistryError> {
    GLOBAL
        .set(engine)
        .map_err(|_| RegistryError::AlreadyInitialized)?;
    GLOBAL.get().ok_or(RegistryError::AlreadyInitialized)
}

/// The process-wide engine, if installed.
#[must_use]
pub fn global() -> Option<&'static AssetEngine> {
    GLOBAL.get()
}

#[derive(Debug)]
struct EngineInner {
    registry: ClassRegistry,
    router: Router,
    contract: ApiContract,
    settings: EngineSettings,
}

/// AssetLedger execution engine.
#[derive(Debug, Clone)]
pub struct AssetEngine {
    inner: Arc<EngineInner>,
}

impl AssetEngine {
    /// Create a new engine and derive its route table.
    ///
    /// # Errors
    ///
    /// See [`Router::build`].
    pub fn new(
        registry: ClassRegistry,
        contract: ApiContract,
        settings: EngineSettings,
        plurals: &BTreeMap<String, String>,
    ) -> Result<Self, RegistryError> {
        let router = Router::build(&registry, &contract, plurals)?;
        Ok(Self {
            inner: Arc::new(EngineInner {
                registry,
                router,
                contract,
                settings,
            }),
        })
    }

    /// Registered classes and rules.
    #[must_use]
    pub fn registry(&self) -> &ClassRegistry {
        &self.inner.registry
    }

    /// Derived route table.
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.inner.router
    }

    /// API contract used for argument validation.
    #[must_use]
    pub fn contract(&self) -> &ApiContract {
        &self.inner.contract
    }

    /// Configured defaults.
    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    /// Dispatches a named call. See [`Router::invoke`].
    ///
    /// # Errors
    ///
    /// Returns the `StorageError` of a failed ledger operation.
    pub fn invoke(
        &self,
        txn: &Transaction<'_>,
        function: &str,
        method: Method,
        args: &[Document],
    ) -> Result<InvokeOutcome, StorageError> {
        self.router().invoke(self, txn, function, method, args)
    }

    /// Executes an already-resolved route.
    ///
    /// # Errors
    ///
    /// Returns validation, registry or execution errors for bad calls and
    /// `AssetError::Store` for ledger failures.
    pub fn execute(&self, txn: &Transaction<'_>, route: &Route, args: &[Document]) -> AssetResult<Json> {
        let class = match &route.class {
            RouteClass::Asset(name) => Some(self.registry().class(name)?),
            RouteClass::System => None,
        };

        match (route.operation, class) {
            (Operation::Create, Some(class)) => self.execute_create(txn, class, args),
            (Operation::Read, Some(class)) => self.execute_read(txn, class, args),
            (Operation::ReadAll, Some(class)) => self.execute_read_all(txn, class, args),
            (Operation::Update, Some(class)) => self.execute_update(txn, class, args),
            (Operation::Replace, Some(class)) => self.execute_replace(txn, class, args),
            (Operation::Delete, Some(class)) => self.execute_delete(txn, class, args),
            (Operation::DeleteAll, Some(class)) => self.execute_delete_all(txn, class, args),
            (Operation::DeleteStateHistory, Some(class)) => {
                self.execute_delete_state_history(txn, class, args)
            }
            (Operation::DeleteProperties, Some(class)) => {
                self.execute_delete_properties(txn, class, args)
            }
            (Operation::ReadStateHistory, Some(class)) => {
                self.execute_read_state_history(txn, class, args)
            }
            (Operation::InitContract, None) => self.execute_init_contract(txn, args),
            (Operation::ReadAllRoutes, None) => self.execute_read_all_routes(),
            (Operation::ReadAllRules, None) => self.execute_read_all_rules(),
            (Operation::ReadRecentStates, None) => self.execute_read_recent_states(txn, args),
            (Operation::ReadWorldState, None) => self.execute_read_world_state(txn),
            (Operation::DeleteWorldState, None) => self.execute_delete_world_state(txn),
            (Operation::SetCreateOnFirstUpdate, None) => {
                self.execute_set_create_on_first_update(txn, args)
            }
            (Operation::ReadAssetSchemas, None) => Ok(self.contract().document().clone()),
            (op, _) => Err(AssetError::internal(format!(
                "route '{}' pairs {op:?} with class {:?}",
                route.function, route.class
            ))),
        }
    }

    /// Ledger key of `asset_id` within `class`.
    ///
    /// With overlapping prefixes an ID can spell a key owned by another class
    /// (`PART.1` under `AST.` is `AST.PART.1`); such IDs are rejected.
    fn asset_key(&self, class: &AssetClass, asset_id: &str) -> Result<String, ValidationError> {
        let key = class.key_for(asset_id);
        match self.registry().resolve_class(&key) {
            Ok((owner, _)) if owner.name != class.name => Err(ValidationError::ForeignAssetKey {
                class: class.name.clone(),
                asset_id: asset_id.to_string(),
                owner: owner.name.clone(),
            }),
            _ => Ok(key),
        }
    }

    /// Loads and decodes the current state under `key`.
    fn load_state(txn: &Transaction<'_>, key: &str) -> AssetResult<Option<AssetState>> {
        let Some(doc) = txn.ledger().get_current(key)? else {
            return Ok(None);
        };
        Ok(Some(AssetState::decode(key, &doc)?))
    }

    /// Like [`Self::load_state`], but the record must belong to `class`.
    fn load_class_state(txn: &Transaction<'_>, class: &AssetClass, key: &str) -> AssetResult<Option<AssetState>> {
        let Some(doc) = txn.ledger().get_current(key)? else {
            return Ok(None);
        };
        Ok(Some(AssetState::decode_for(class, key, &doc)?))
    }

    /// Evaluates rules against `state`, persists the record under `key`,
    /// appends it to history and marks the asset as recently updated.
    ///
    /// Every read that can fail on stored data happens before the first write.
    #[allow(clippy::too_many_arguments)]
    fn write_state(
        &self,
        txn: &Transaction<'_>,
        class: &AssetClass,
        key: &str,
        asset_id: &str,
        state: Document,
        event: &Document,
        prior_alerts: &BTreeSet<String>,
    ) -> AssetResult<AssetState> {
        let recent = Self::recent_keys(txn)?;
        let evaluation = evaluate_from(self.registry().rules_for(&class.name), &state, prior_alerts);
        let record = AssetState::new(
            class,
            asset_id,
            state,
            event.clone(),
            &evaluation,
            txn.txid(),
            txn.timestamp(),
        );
        let encoded = record.encode()?;

        txn.ledger().put_current(key, encoded.clone())?;
        let sequence = txn.ledger().append_history(key, txn.timestamp(), encoded)?;
        self.touch_recent(txn, recent, key)?;

        info!(
            class = %class.name,
            asset_id,
            sequence,
            compliant = record.compliant,
            raised = evaluation.raised.len(),
            cleared = evaluation.cleared.len(),
            "asset state written"
        );
        Ok(record)
    }

    /// Moves `key` to the front of `recent` and stores the list.
    fn touch_recent(&self, txn: &Transaction<'_>, mut recent: Vec<String>, key: &str) -> AssetResult<()> {
        recent.retain(|k| k != key);
        recent.insert(0, key.to_string());
        recent.truncate(self.settings().recent_states_limit);
        Self::store_recent(txn, recent)
    }

    /// Drops `removed` from `recent` and stores the list if it changed.
    fn forget_recent(txn: &Transaction<'_>, mut recent: Vec<String>, removed: &[String]) -> AssetResult<()> {
        let before = recent.len();
        recent.retain(|k| !removed.contains(k));
        if recent.len() == before {
            return Ok(());
        }
        Self::store_recent(txn, recent)
    }

    fn recent_keys(txn: &Transaction<'_>) -> AssetResult<Vec<String>> {
        let Some(doc) = txn.ledger().get_current(keys::RECENT_KEY)? else {
            return Ok(Vec::new());
        };
        let keys = doc
            .get("keys")
            .and_then(Value::as_array)
            .ok_or_else(|| ExecutionError::CorruptState {
                key: keys::RECENT_KEY.to_string(),
                reason: "expected a 'keys' array".to_string(),
            })?;
        Ok(keys.iter().filter_map(Value::as_str).map(str::to_string).collect())
    }

    fn store_recent(txn: &Transaction<'_>, recent: Vec<String>) -> AssetResult<()> {
        let doc = Document::new().with("keys", recent);
        txn.ledger().put_current(keys::RECENT_KEY, doc)?;
        Ok(())
    }
}

/// First argument, required.
fn first_arg<'a>(function: &str, args: &'a [Document]) -> Result<&'a Document, ValidationError> {
    args.first().ok_or_else(|| ValidationError::InvalidArguments {
        function: function.to_string(),
        reason: "expected one argument document".to_string(),
    })
}

/// Optional `filter` property of the first argument.
fn filter_arg(args: &[Document]) -> Result<Filter, ValidationError> {
    match args.first().and_then(|a| a.get("filter")) {
        None | Some(Value::Null) => Ok(Filter::match_everything()),
        Some(Value::Object(doc)) => Filter::from_document(doc),
        Some(other) => Err(ValidationError::InvalidField {
            field: "filter".to_string(),
            reason: format!("expected object, got {}", other.type_name()),
        }),
    }
}

fn to_json<T: Serialize>(value: &T) -> AssetResult<Json> {
    serde_json::to_value(value).map_err(|e| AssetError::internal(format!("encode result: {e}")))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::filter::{Comparison, Selector};
    use crate::rules::Rule;

    /// Engine with an `asset` class and a cold-chain rule pair.
    pub(crate) fn engine(create_on_first_update: bool) -> AssetEngine {
        let mut builder = ClassRegistry::builder();
        builder
            .register_class(AssetClass::new("asset", "AST.", "asset.assetID").unwrap())
            .unwrap();
        let cold = Filter::all(vec![Selector::compare("asset.temperature", Comparison::Lt, "0").unwrap()]);
        let warm = Filter::all(vec![Selector::compare("asset.temperature", Comparison::Ge, "0").unwrap()]);
        builder.register_rule(Rule::raise("cold-raise", "asset", "cold", cold)).unwrap();
        builder.register_rule(Rule::clear("cold-clear", "asset", "cold", warm)).unwrap();
        let settings = EngineSettings {
            create_on_first_update,
            recent_states_limit: 3,
        };
        AssetEngine::new(builder.build(), ApiContract::bundled().unwrap(), settings, &BTreeMap::new())
            .unwrap()
    }

    pub(crate) fn arg(v: Json) -> Vec<Document> {
        vec![Document::from_json(v).unwrap()]
    }
}
