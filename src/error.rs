//! Error types for AssetLedger.
//!
//! All errors are strongly typed using thiserror so callers can match on
//! specific conditions. Caller-input errors are reported back through the
//! dispatcher as an `ERROR` outcome; only storage failures are fatal to the
//! enclosing transaction.

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::storage::StorageError;

/// Validation errors raised while decoding or checking caller input.
#[allow(missing_docs)]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Required property '{path}' is missing")]
    MissingProperty {
        path: String,
    },

    #[error("Invalid qualified path '{path}': {reason}")]
    InvalidPath {
        path: String,
        reason: String,
    },

    #[error("Invalid field '{field}': {reason}")]
    InvalidField {
        field: String,
        reason: String,
    },

    #[error("Invalid arguments for '{function}': {reason}")]
    InvalidArguments {
        function: String,
        reason: String,
    },

    #[error("Arguments for '{function}' violate the contract at '{path}': {reason}")]
    SchemaViolation {
        function: String,
        path: String,
        reason: String,
    },

    #[error("Invalid time range: begin ({begin}) must not be after end ({end})")]
    InvalidTimeRange {
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Property '{path}' holds the asset's primary key and cannot be deleted")]
    ProtectedProperty {
        path: String,
    },

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        pattern: String,
        reason: String,
    },

    #[error("Asset ID '{asset_id}' of class '{class}' addresses a key owned by class '{owner}'")]
    ForeignAssetKey {
        class: String,
        asset_id: String,
        owner: String,
    },
}

/// Registry misconfiguration errors.
#[allow(missing_docs)]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Prefix '{prefix}' of class '{incoming}' is already used by class '{existing}'")]
    DuplicatePrefix {
        prefix: String,
        existing: String,
        incoming: String,
    },

    #[error("Class '{name}' is already registered")]
    DuplicateClass {
        name: String,
    },

    #[error("No registered class prefix matches key '{key}'")]
    UnknownClass {
        key: String,
    },

    #[error("Class '{name}' is not registered")]
    ClassNotRegistered {
        name: String,
    },

    #[error("Rule '{rule}' is already registered for class '{class}'")]
    DuplicateRule {
        class: String,
        rule: String,
    },

    #[error("Route '{function}' is already registered")]
    DuplicateRoute {
        function: String,
    },

    #[error("Prefix '{prefix}' is empty or collides with the reserved system namespace")]
    ReservedPrefix {
        prefix: String,
    },

    #[error("Route '{function}' is '{routed}' but the contract declares '{declared}'")]
    ContractMismatch {
        function: String,
        declared: String,
        routed: String,
    },

    #[error("Engine configuration is already initialized")]
    AlreadyInitialized,
}

/// Errors raised while executing an operation against the ledger.
#[allow(missing_docs)]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Asset '{asset_id}' of class '{class}' not found")]
    AssetNotFound {
        class: String,
        asset_id: String,
    },

    #[error("Asset '{asset_id}' of class '{class}' already exists")]
    AssetExists {
        class: String,
        asset_id: String,
    },

    #[error("Unknown function '{function}'")]
    UnknownFunction {
        function: String,
    },

    #[error("Function '{function}' is declared as '{declared}' but was called via '{requested}'")]
    MethodMismatch {
        function: String,
        declared: String,
        requested: String,
    },

    #[error("Stored state under '{key}' is corrupt: {reason}")]
    CorruptState {
        key: String,
        reason: String,
    },
}

/// Coarse error classification reported alongside error outcomes.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    AlreadyExists,
    DuplicatePrefix,
    UnknownClass,
    Registry,
    MethodMismatch,
    UnknownFunction,
    Store,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "ValidationError",
            Self::NotFound => "NotFoundError",
            Self::AlreadyExists => "AlreadyExistsError",
            Self::DuplicatePrefix => "DuplicatePrefixError",
            Self::UnknownClass => "UnknownClassError",
            Self::Registry => "RegistryError",
            Self::MethodMismatch => "MethodMismatchError",
            Self::UnknownFunction => "UnknownFunctionError",
            Self::Store => "StoreError",
            Self::Internal => "InternalError",
        };
        f.write_str(s)
    }
}

/// Top-level error type for AssetLedger.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Store error: {0}")]
    Store(#[from] StorageError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl AssetError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Maps this error onto the coarse error kinds exposed to callers.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Registry(e) => match e {
                RegistryError::DuplicatePrefix { .. } => ErrorKind::DuplicatePrefix,
                RegistryError::UnknownClass { .. } => ErrorKind::UnknownClass,
                _ => ErrorKind::Registry,
            },
            Self::Execution(e) => match e {
                ExecutionError::AssetNotFound { .. } => ErrorKind::NotFound,
                ExecutionError::AssetExists { .. } => ErrorKind::AlreadyExists,
                ExecutionError::UnknownFunction { .. } => ErrorKind::UnknownFunction,
                ExecutionError::MethodMismatch { .. } => ErrorKind::MethodMismatch,
                ExecutionError::CorruptState { .. } => ErrorKind::Internal,
            },
            Self::Store(_) => ErrorKind::Store,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if the addressed asset does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::AssetNotFound { .. }))
    }

    /// Returns true if the function was called with the wrong method.
    #[must_use]
    pub const fn is_method_mismatch(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::MethodMismatch { .. }))
    }

    /// Returns true if this error must abort the enclosing transaction.
    ///
    /// Only ledger failures are fatal; every other error is reported to the
    /// caller as an `ERROR` outcome.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

/// Result type alias for AssetLedger operations.
pub type AssetResult<T> = Result<T, AssetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_missing_property() {
        let err = ValidationError::MissingProperty {
            path: "asset.assetID".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("asset.assetID"));
        assert!(msg.contains("missing"));
    }

    #[test]
    fn test_registry_error_duplicate_prefix() {
        let err = RegistryError::DuplicatePrefix {
            prefix: "AST.".to_string(),
            existing: "asset".to_string(),
            incoming: "container".to_string(),
        };
        let asset_err: AssetError = err.into();
        assert_eq!(asset_err.kind(), ErrorKind::DuplicatePrefix);
        assert!(asset_err.to_string().contains("AST."));
    }

    #[test]
    fn test_execution_error_not_found_kind() {
        let err: AssetError = ExecutionError::AssetNotFound {
            class: "asset".to_string(),
            asset_id: "A1".to_string(),
        }
        .into();
        assert!(err.is_not_found());
        assert!(!err.is_fatal());
        assert_eq!(err.kind().to_string(), "NotFoundError");
    }

    #[test]
    fn test_method_mismatch_kind() {
        let err: AssetError = ExecutionError::MethodMismatch {
            function: "createAsset".to_string(),
            declared: "invoke".to_string(),
            requested: "query".to_string(),
        }
        .into();
        assert!(err.is_method_mismatch());
        assert_eq!(err.kind(), ErrorKind::MethodMismatch);
        assert!(err.to_string().contains("createAsset"));
    }

    #[test]
    fn test_store_error_is_fatal() {
        let err: AssetError = StorageError::Backend("disk gone".to_string()).into();
        assert!(err.is_fatal());
        assert_eq!(err.kind(), ErrorKind::Store);
    }

    #[test]
    fn test_internal_error() {
        let err = AssetError::internal("unexpected state");
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!err.is_validation());
        assert!(err.to_string().contains("unexpected state"));
    }

    #[test]
    fn test_invalid_time_range_message() {
        let now = Utc::now();
        let earlier = now - chrono::Duration::hours(1);
        let err = ValidationError::InvalidTimeRange {
            begin: now,
            end: earlier,
        };
        assert!(err.to_string().contains("Invalid time range"));
    }
}
