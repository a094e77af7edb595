//! Engine configuration.
//!
//! Configuration is a JSON document holding engine settings, the asset
//! classes, their rules and, optionally, the path of a custom API contract:
//!
//! ```json
//! {
//!   "settings": {"create_on_first_update": false, "recent_states_limit": 20},
//!   "classes": [{"name": "asset", "prefix": "AST.", "assetidpath": "asset.assetID"}],
//!   "rules": [],
//!   "contract": "schemas/api.json"
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::AssetEngine;
use crate::error::{AssetResult, ValidationError};
use crate::registry::{AssetClass, ClassRegistry};
use crate::rules::Rule;
use crate::schema::ApiContract;

const fn default_recent_states_limit() -> usize {
    20
}

/// Runtime switches of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Let `update<Class>` create a missing asset. The ledger-persisted
    /// value set through `setCreateOnFirstUpdate` takes precedence.
    #[serde(default)]
    pub create_on_first_update: bool,

    /// Maximum number of entries kept in the recent-states list.
    #[serde(default = "default_recent_states_limit")]
    pub recent_states_limit: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            create_on_first_update: false,
            recent_states_limit: default_recent_states_limit(),
        }
    }
}

/// One class entry of the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassConfig {
    /// Class name, e.g. `asset`.
    pub name: String,
    /// Key prefix of the class's ledger entries.
    pub prefix: String,
    /// Qualified path of the primary key inside an event.
    #[serde(rename = "assetidpath")]
    pub asset_id_path: String,
    /// Plural used in collection routes; defaults to `<name>s`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural: Option<String>,
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine switches.
    #[serde(default)]
    pub settings: EngineSettings,
    /// Registered asset classes, in registration order.
    #[serde(default)]
    pub classes: Vec<ClassConfig>,
    /// Alert rules; each must name a configured class.
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Custom API contract; the bundled contract is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<PathBuf>,
}

impl EngineConfig {
    /// Parses and validates a configuration document.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidField` for malformed JSON and any
    /// error from [`EngineConfig::validate`].
    pub fn from_json_str(text: &str) -> AssetResult<Self> {
        let config: Self = serde_json::from_str(text).map_err(|e| ValidationError::InvalidField {
            field: "config".to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration file. A relative `contract` path is resolved
    /// against the directory of the configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidField` if the file cannot be read,
    /// plus any error from [`EngineConfig::from_json_str`].
    pub fn from_path(path: impl AsRef<Path>) -> AssetResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ValidationError::InvalidField {
            field: "config".to_string(),
            reason: format!("{}: {e}", path.display()),
        })?;
        let mut config = Self::from_json_str(&text)?;
        if let (Some(contract), Some(dir)) = (config.contract.as_mut(), path.parent()) {
            if contract.is_relative() {
                *contract = dir.join(&*contract);
            }
        }
        Ok(config)
    }

    /// Checks everything that can be checked without building the engine.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` for a zero recent-states limit, a bad
    /// class definition or an invalid rule.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.settings.recent_states_limit == 0 {
            return Err(ValidationError::InvalidField {
                field: "settings.recent_states_limit".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        for class in &self.classes {
            class.to_class()?;
            if class.plural.as_deref().is_some_and(|p| p.trim().is_empty()) {
                return Err(ValidationError::InvalidField {
                    field: format!("classes.{}.plural", class.name),
                    reason: "must not be empty".to_string(),
                });
            }
        }
        self.rules.iter().try_for_each(Rule::validate)
    }

    /// Builds the class registry, loads the contract and assembles an engine.
    ///
    /// # Errors
    ///
    /// Returns registry errors for conflicting classes or rules and
    /// validation errors for a bad contract.
    pub fn build(&self) -> AssetResult<AssetEngine> {
        self.validate()?;

        let mut builder = ClassRegistry::builder();
        for class in &self.classes {
            builder.register_class(class.to_class()?)?;
        }
        for rule in &self.rules {
            builder.register_rule(rule.clone())?;
        }
        let registry = builder.build();

        let contract = match &self.contract {
            Some(path) => ApiContract::from_path(path)?,
            None => ApiContract::bundled()?,
        };

        let plurals: BTreeMap<String, String> = self
            .classes
            .iter()
            .filter_map(|c| c.plural.clone().map(|p| (c.name.clone(), p)))
            .collect();

        let engine = AssetEngine::new(registry, contract, self.settings, &plurals)?;
        info!(
            classes = self.classes.len(),
            rules = self.rules.len(),
            routes = engine.router().len(),
            "engine configured"
        );
        Ok(engine)
    }
}

impl ClassConfig {
    /// Converts the entry into a class definition.
    ///
    /// # Errors
    ///
    /// See [`AssetClass::new`].
    pub fn to_class(&self) -> Result<AssetClass, ValidationError> {
        AssetClass::new(self.name.clone(), self.prefix.clone(), &self.asset_id_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AssetError, RegistryError};
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "classes": [
            {"name": "asset", "prefix": "AST.", "assetidpath": "asset.assetID"},
            {"name": "battery", "prefix": "BAT.", "assetidpath": "battery.assetID", "plural": "batteries"}
        ],
        "rules": [{
            "name": "too-cold", "class": "asset", "alert": "cold", "polarity": "raise",
            "trigger": {"match": "all", "select": [{"qprop": "asset.temperature", "op": "lt", "value": "0"}]}
        }]
    }"#;

    #[test]
    fn test_defaults_apply() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config.settings, EngineSettings::default());
        assert_eq!(config.settings.recent_states_limit, 20);
        assert!(!config.settings.create_on_first_update);
        assert!(config.contract.is_none());
    }

    #[test]
    fn test_sample_builds_engine() {
        let engine = EngineConfig::from_json_str(SAMPLE).unwrap().build().unwrap();
        assert!(engine.router().route("readAllBatteries").is_some());
        assert_eq!(engine.registry().rules_for("asset").len(), 1);
    }

    #[test]
    fn test_zero_recent_limit_rejected() {
        let err = EngineConfig::from_json_str(r#"{"settings": {"recent_states_limit": 0}}"#).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_bad_path_rejected() {
        let text = r#"{"classes": [{"name": "asset", "prefix": "AST.", "assetidpath": "asset..id"}]}"#;
        assert!(EngineConfig::from_json_str(text).is_err());
    }

    #[test]
    fn test_duplicate_prefix_surfaces_on_build() {
        let text = r#"{"classes": [
            {"name": "a", "prefix": "X.", "assetidpath": "a.id"},
            {"name": "b", "prefix": "X.", "assetidpath": "b.id"}
        ]}"#;
        let err = EngineConfig::from_json_str(text).unwrap().build().unwrap_err();
        assert!(matches!(
            err,
            AssetError::Registry(RegistryError::DuplicatePrefix { .. })
        ));
    }

    #[test]
    fn test_from_path_resolves_contract_relative_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let contract_path = dir.path().join("contract.json");
        std::fs::write(&contract_path, r#"{"API": {}}"#).unwrap();

        let config_path = dir.path().join("engine.json");
        let mut file = std::fs::File::create(&config_path).unwrap();
        write!(
            file,
            r#"{{"classes": [{{"name": "asset", "prefix": "AST.", "assetidpath": "asset.assetID"}}], "contract": "contract.json"}}"#
        )
        .unwrap();

        let config = EngineConfig::from_path(&config_path).unwrap();
        assert_eq!(config.contract.as_deref(), Some(contract_path.as_path()));
        let engine = config.build().unwrap();
        assert!(!engine.contract().declares("createAsset"));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineConfig::from_path(dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("absent.json"));
    }
}
