//! Route dispatcher.
//!
//! Every class gets a fixed family of routes derived from its name
//! (`createAsset`, `readAllAssets`, ...); a handful of system routes operate
//! on the ledger as a whole. The route table is built once and is read-only
//! afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};
use tracing::{debug, info, warn};

use crate::engine::AssetEngine;
use crate::error::{AssetError, ErrorKind, ExecutionError, RegistryError};
use crate::registry::ClassRegistry;
use crate::schema::ApiContract;
use crate::state::Status;
use crate::storage::{StorageError, Transaction};
use crate::value::Document;

/// How a function may be called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// State-changing call.
    Invoke,
    /// Read-only call.
    Query,
    /// One-time contract initialization.
    Deploy,
}

impl Method {
    /// Wire name of the method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Invoke => "invoke",
            Self::Query => "query",
            Self::Deploy => "deploy",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "invoke" => Ok(Self::Invoke),
            "query" => Ok(Self::Query),
            "deploy" => Ok(Self::Deploy),
            other => Err(format!("unknown method '{other}', expected invoke, query or deploy")),
        }
    }
}

/// What a route does.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Create,
    Read,
    ReadAll,
    Update,
    Replace,
    Delete,
    DeleteAll,
    DeleteStateHistory,
    DeleteProperties,
    ReadStateHistory,
    InitContract,
    ReadAllRoutes,
    ReadAllRules,
    ReadRecentStates,
    ReadWorldState,
    DeleteWorldState,
    SetCreateOnFirstUpdate,
    ReadAssetSchemas,
}

impl Operation {
    /// Per-class operations in route-table order.
    pub const CLASS_OPERATIONS: [Self; 10] = [
        Self::Create,
        Self::Read,
        Self::ReadAll,
        Self::Update,
        Self::Replace,
        Self::Delete,
        Self::DeleteAll,
        Self::DeleteStateHistory,
        Self::DeleteProperties,
        Self::ReadStateHistory,
    ];

    /// System operations with their fixed function names.
    pub const SYSTEM_ROUTES: [(&'static str, Self); 8] = [
        ("initContract", Self::InitContract),
        ("readAllRoutes", Self::ReadAllRoutes),
        ("readAllRules", Self::ReadAllRules),
        ("readRecentStates", Self::ReadRecentStates),
        ("readWorldState", Self::ReadWorldState),
        ("deleteWorldState", Self::DeleteWorldState),
        ("setCreateOnFirstUpdate", Self::SetCreateOnFirstUpdate),
        ("readAssetSchemas", Self::ReadAssetSchemas),
    ];

    /// The method this operation is reachable through.
    #[must_use]
    pub const fn method(self) -> Method {
        match self {
            Self::Read
            | Self::ReadAll
            | Self::ReadStateHistory
            | Self::ReadAllRoutes
            | Self::ReadAllRules
            | Self::ReadRecentStates
            | Self::ReadWorldState
            | Self::ReadAssetSchemas => Method::Query,
            Self::InitContract => Method::Deploy,
            Self::Create
            | Self::Update
            | Self::Replace
            | Self::Delete
            | Self::DeleteAll
            | Self::DeleteStateHistory
            | Self::DeleteProperties
            | Self::DeleteWorldState
            | Self::SetCreateOnFirstUpdate => Method::Invoke,
        }
    }

    /// Function name of a per-class operation, e.g. `readAllAssets`.
    fn function_name(self, singular: &str, plural: &str) -> String {
        match self {
            Self::Create => format!("create{singular}"),
            Self::Read => format!("read{singular}"),
            Self::ReadAll => format!("readAll{plural}"),
            Self::Update => format!("update{singular}"),
            Self::Replace => format!("replace{singular}"),
            Self::Delete => format!("delete{singular}"),
            Self::DeleteAll => format!("deleteAll{plural}"),
            Self::DeleteStateHistory => format!("delete{singular}StateHistory"),
            Self::DeleteProperties => format!("deletePropertiesFrom{singular}"),
            Self::ReadStateHistory => format!("read{singular}StateHistory"),
            _ => String::new(),
        }
    }
}

/// Target of a route: a registered class or the system as a whole.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum RouteClass {
    System,
    Asset(String),
}

impl RouteClass {
    /// Class name for asset routes.
    #[must_use]
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Self::System => None,
            Self::Asset(name) => Some(name),
        }
    }
}

impl From<RouteClass> for String {
    fn from(class: RouteClass) -> Self {
        match class {
            RouteClass::System => "system".to_string(),
            RouteClass::Asset(name) => name,
        }
    }
}

impl From<String> for RouteClass {
    fn from(name: String) -> Self {
        if name == "system" {
            Self::System
        } else {
            Self::Asset(name)
        }
    }
}

/// A single entry in the route table.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    #[serde(rename = "functionname")]
    pub function: String,
    pub method: Method,
    pub class: RouteClass,
    pub operation: Operation,
}

/// Uppercases the first character: `asset` -> `Asset`.
fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Result of a dispatched call, successful or not.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeOutcome {
    /// `OK` or `ERROR`.
    pub status: Status,
    /// Error message for failed calls.
    pub message: Option<String>,
    /// Error classification for failed calls.
    pub kind: Option<ErrorKind>,
    /// Operation result; `null` for failed calls.
    pub payload: Json,
}

impl InvokeOutcome {
    /// Successful outcome carrying `payload`.
    #[must_use]
    pub fn ok(payload: Json) -> Self {
        Self {
            status: Status::Ok,
            message: None,
            kind: None,
            payload,
        }
    }

    /// Failed outcome classified by `err`.
    #[must_use]
    pub fn error(err: &AssetError) -> Self {
        Self {
            status: Status::Error,
            message: Some(err.to_string()),
            kind: Some(err.kind()),
            payload: Json::Null,
        }
    }

    /// Returns true when the invocation succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Wire form: `{status, message?, kind?, payload}`.
    #[must_use]
    pub fn to_json(&self) -> Json {
        let mut out = json!({"status": self.status.to_string(), "payload": self.payload});
        if let Some(message) = &self.message {
            out["message"] = Json::String(message.clone());
        }
        if let Some(kind) = self.kind {
            out["kind"] = Json::String(kind.to_string());
        }
        out
    }
}

/// Immutable function-name to route table.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: BTreeMap<String, Route>,
}

impl Router {
    /// Builds the route table for every registered class plus the system
    /// routes. `plurals` overrides the default `<Class>s` plural per class
    /// name.
    ///
    /// # Errors
    ///
    /// - `DuplicateRoute` if two classes derive the same function name
    /// - `ContractMismatch` if the contract declares a routed function under
    ///   a different method
    pub fn build(
        registry: &ClassRegistry,
        contract: &ApiContract,
        plurals: &BTreeMap<String, String>,
    ) -> Result<Self, RegistryError> {
        let mut router = Self::default();

        for class in registry.classes() {
            let singular = capitalize(&class.name);
            let plural = plurals
                .get(&class.name)
                .map_or_else(|| format!("{singular}s"), |p| capitalize(p));
            for op in Operation::CLASS_OPERATIONS {
                router.add(
                    Route {
                        function: op.function_name(&singular, &plural),
                        method: op.method(),
                        class: RouteClass::Asset(class.name.clone()),
                        operation: op,
                    },
                    contract,
                )?;
            }
        }

        for (function, op) in Operation::SYSTEM_ROUTES {
            router.add(
                Route {
                    function: function.to_string(),
                    method: op.method(),
                    class: RouteClass::System,
                    operation: op,
                },
                contract,
            )?;
        }

        Ok(router)
    }

    fn add(&mut self, route: Route, contract: &ApiContract) -> Result<(), RegistryError> {
        if let Some(declared) = contract.method_of(&route.function) {
            if declared != route.method {
                return Err(RegistryError::ContractMismatch {
                    function: route.function,
                    declared: declared.to_string(),
                    routed: route.method.to_string(),
                });
            }
        }
        if self.routes.contains_key(&route.function) {
            return Err(RegistryError::DuplicateRoute {
                function: route.function,
            });
        }
        self.routes.insert(route.function.clone(), route);
        Ok(())
    }

    /// Looks up a route by function name.
    #[must_use]
    pub fn route(&self, function: &str) -> Option<&Route> {
        self.routes.get(function)
    }

    /// All routes, sorted by function name.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    /// Number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true when no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Resolves and checks a call without executing it.
    ///
    /// # Errors
    ///
    /// - `UnknownFunction` if no route has this name
    /// - `MethodMismatch` if the route is declared under another method
    /// - `SchemaViolation` if the args break the contract
    pub fn resolve(
        &self,
        contract: &ApiContract,
        function: &str,
        method: Method,
        args: &[Document],
    ) -> Result<&Route, AssetError> {
        let route = self.route(function).ok_or_else(|| ExecutionError::UnknownFunction {
            function: function.to_string(),
        })?;
        if route.method != method {
            return Err(ExecutionError::MethodMismatch {
                function: function.to_string(),
                declared: route.method.to_string(),
                requested: method.to_string(),
            }
            .into());
        }
        contract.validate_args(function, args)?;
        Ok(route)
    }

    /// Dispatches one call.
    ///
    /// Caller errors come back as an `ERROR` outcome; only ledger failures
    /// are returned as `Err` so the host can abort the transaction.
    ///
    /// # Errors
    ///
    /// Returns the `StorageError` of a failed ledger operation.
    pub fn invoke(
        &self,
        engine: &AssetEngine,
        txn: &Transaction<'_>,
        function: &str,
        method: Method,
        args: &[Document],
    ) -> Result<InvokeOutcome, StorageError> {
        let result = self
            .resolve(engine.contract(), function, method, args)
            .and_then(|route| engine.execute(txn, route, args));

        match result {
            Ok(payload) => {
                if method == Method::Query {
                    debug!(function, txid = txn.txid(), "query served");
                } else {
                    info!(function, %method, txid = txn.txid(), "invocation committed");
                }
                Ok(InvokeOutcome::ok(payload))
            }
            Err(AssetError::Store(err)) => {
                warn!(function, txid = txn.txid(), error = %err, "ledger failure, aborting transaction");
                Err(err)
            }
            Err(err) => {
                warn!(function, %method, kind = %err.kind(), error = %err, "invocation rejected");
                Ok(InvokeOutcome::error(&err))
            }
        }
    }
}
