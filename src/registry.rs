//! Asset class registry.
//!
//! Classes and their rules are registered once through a [`RegistryBuilder`]
//! and frozen into an immutable [`ClassRegistry`]. The frozen registry has no
//! mutating API, so registration after initialization is rejected by
//! construction.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, ValidationError};
use crate::path::QualifiedPath;
use crate::rules::Rule;
use crate::storage::keys;
use crate::value::{Document, Value};

/// An asset class: a key prefix plus the path of the primary key inside
/// every event of the class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetClass {
    /// Class name, e.g. `asset`.
    pub name: String,
    /// Ledger key prefix, e.g. `AST.`.
    pub prefix: String,
    /// Qualified path of the primary key, e.g. `asset.assetID`.
    #[serde(rename = "assetidpath")]
    pub asset_id_path: QualifiedPath,
}

impl AssetClass {
    /// Creates a class definition.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingProperty` for an empty name and
    /// `ValidationError::InvalidPath` for a malformed primary-key path.
    pub fn new(
        name: impl Into<String>,
        prefix: impl Into<String>,
        asset_id_path: &str,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::MissingProperty {
                path: "class.name".to_string(),
            });
        }
        Ok(Self {
            name,
            prefix: prefix.into(),
            asset_id_path: QualifiedPath::parse(asset_id_path)?,
        })
    }

    /// Ledger key holding the current state of `asset_id`.
    #[must_use]
    pub fn key_for(&self, asset_id: &str) -> String {
        keys::current_key(&self.prefix, asset_id)
    }

    /// Extracts the primary key from an event or state document.
    ///
    /// Scalars are accepted and stringified; an absent, null, empty or
    /// compound value is a missing primary key. The key is stored verbatim in
    /// the state, so surrounding whitespace is rejected rather than trimmed.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingProperty` naming the primary-key path
    /// and `ValidationError::InvalidField` for a padded string key.
    pub fn asset_id_of(&self, doc: &Document) -> Result<String, ValidationError> {
        let missing = || ValidationError::MissingProperty {
            path: self.asset_id_path.to_string(),
        };
        match self.asset_id_path.get(doc) {
            Some(Value::String(s)) if s.trim().is_empty() => Err(missing()),
            Some(Value::String(s)) if s.trim() != s.as_str() => Err(ValidationError::InvalidField {
                field: self.asset_id_path.to_string(),
                reason: format!("asset ID {s:?} has surrounding whitespace"),
            }),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(v.stringify()),
            _ => Err(missing()),
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name, self.prefix)
    }
}

/// Mutable registration phase of the class registry.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    classes: Vec<AssetClass>,
    rules: Vec<Rule>,
}

impl RegistryBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class.
    ///
    /// # Errors
    ///
    /// - `ReservedPrefix` if the prefix is empty or in the system namespace
    /// - `DuplicateClass` if the name is taken
    /// - `DuplicatePrefix` if another class already uses the prefix
    pub fn register_class(&mut self, class: AssetClass) -> Result<&mut Self, RegistryError> {
        if class.prefix.is_empty() || keys::is_reserved(&class.prefix) {
            return Err(RegistryError::ReservedPrefix {
                prefix: class.prefix,
            });
        }
        if self.classes.iter().any(|c| c.name == class.name) {
            return Err(RegistryError::DuplicateClass { name: class.name });
        }
        if let Some(existing) = self.classes.iter().find(|c| c.prefix == class.prefix) {
            return Err(RegistryError::DuplicatePrefix {
                prefix: class.prefix,
                existing: existing.name.clone(),
                incoming: class.name,
            });
        }
        self.classes.push(class);
        Ok(self)
    }

    /// Registers a rule for an already-registered class. Rules keep their
    /// registration order.
    ///
    /// # Errors
    ///
    /// - `ClassNotRegistered` if the rule's class is unknown
    /// - `DuplicateRule` if the class already has a rule with this name
    pub fn register_rule(&mut self, rule: Rule) -> Result<&mut Self, RegistryError> {
        if !self.classes.iter().any(|c| c.name == rule.class) {
            return Err(RegistryError::ClassNotRegistered { name: rule.class });
        }
        if self
            .rules
            .iter()
            .any(|r| r.class == rule.class && r.name == rule.name)
        {
            return Err(RegistryError::DuplicateRule {
                class: rule.class,
                rule: rule.name,
            });
        }
        self.rules.push(rule);
        Ok(self)
    }

    /// Freezes the registry.
    #[must_use]
    pub fn build(self) -> ClassRegistry {
        let by_name = self
            .classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();

        let mut rules: HashMap<String, Vec<Rule>> = HashMap::new();
        for rule in self.rules {
            rules.entry(rule.class.clone()).or_default().push(rule);
        }

        ClassRegistry {
            classes: self.classes,
            by_name,
            rules,
        }
    }
}

/// Immutable class and rule tables.
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    classes: Vec<AssetClass>,
    by_name: HashMap<String, usize>,
    rules: HashMap<String, Vec<Rule>>,
}

impl ClassRegistry {
    /// Start a registration phase.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// All classes in registration order.
    pub fn classes(&self) -> &[AssetClass] {
        &self.classes
    }

    /// Looks up a class by name.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::ClassNotRegistered` if no class has this name.
    pub fn class(&self, name: &str) -> Result<&AssetClass, RegistryError> {
        self.by_name
            .get(name)
            .and_then(|&i| self.classes.get(i))
            .ok_or_else(|| RegistryError::ClassNotRegistered {
                name: name.to_string(),
            })
    }

    /// Resolves the class owning a ledger key by longest matching prefix and
    /// returns it with the bare asset ID.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::UnknownClass` if no prefix matches.
    pub fn resolve_class<'k>(&self, key: &'k str) -> Result<(&AssetClass, &'k str), RegistryError> {
        self.classes
            .iter()
            .filter(|c| key.starts_with(&c.prefix) && key.len() > c.prefix.len())
            .max_by_key(|c| c.prefix.len())
            .map(|c| (c, &key[c.prefix.len()..]))
            .ok_or_else(|| RegistryError::UnknownClass {
                key: key.to_string(),
            })
    }

    /// Infers the class of a document from the first registered class whose
    /// primary-key path is present.
    pub fn infer_class(&self, doc: &Document) -> Option<&AssetClass> {
        self.classes.iter().find(|c| c.asset_id_of(doc).is_ok())
    }

    /// Rules of a class in registration order.
    pub fn rules_for(&self, class: &str) -> &[Rule] {
        self.rules.get(class).map_or(&[][..], Vec::as_slice)
    }

    /// Every rule, grouped by class in class registration order.
    pub fn all_rules(&self) -> impl Iterator<Item = &Rule> {
        self.classes.iter().flat_map(|c| self.rules_for(&c.name))
    }
}
