//! Per-class alert rules.
//!
//! A rule pairs a trigger [`Filter`] with an alert name and a polarity. Rules
//! of a class run in registration order as a single fold over the alert set:
//! a matching `raise` rule inserts its alert, a matching `clear` rule removes
//! it, and later rules win for the same alert name. There is no fixpoint
//! iteration, so rules cannot react to each other's output.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::filter::Filter;
use crate::value::Document;

/// Whether a matching rule raises or clears its alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Add the alert to the active set.
    Raise,
    /// Remove the alert from the active set.
    Clear,
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raise => write!(f, "raise"),
            Self::Clear => write!(f, "clear"),
        }
    }
}

/// A named alert rule bound to an asset class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Rule name, unique within its class.
    pub name: String,
    /// Name of the asset class this rule applies to.
    pub class: String,
    /// Alert raised or cleared by this rule.
    pub alert: String,
    /// Condition evaluated against the merged asset state.
    pub trigger: Filter,
    /// Effect when the trigger matches.
    pub polarity: Polarity,

    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Rule {
    /// Creates a rule that raises `alert` when `trigger` matches.
    #[must_use]
    pub fn raise(
        name: impl Into<String>,
        class: impl Into<String>,
        alert: impl Into<String>,
        trigger: Filter,
    ) -> Self {
        Self {
            name: name.into(),
            class: class.into(),
            alert: alert.into(),
            trigger,
            polarity: Polarity::Raise,
            description: None,
        }
    }

    /// Creates a rule that clears `alert` when `trigger` matches.
    #[must_use]
    pub fn clear(
        name: impl Into<String>,
        class: impl Into<String>,
        alert: impl Into<String>,
        trigger: Filter,
    ) -> Self {
        Self {
            polarity: Polarity::Clear,
            ..Self::raise(name, class, alert, trigger)
        }
    }

    /// Validates names and the trigger filter.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingProperty` for an empty name or alert,
    /// or the trigger's own validation error.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [("name", &self.name), ("class", &self.class), ("alert", &self.alert)] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingProperty {
                    path: format!("rule.{field}"),
                });
            }
        }
        self.trigger.validate()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}({} {})", self.class, self.name, self.polarity, self.alert)
    }
}

/// Outcome of one rule-evaluation pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlertEvaluation {
    /// Alerts active after the pass.
    pub active: BTreeSet<String>,
    /// Alerts active now that were not active before the pass.
    pub raised: BTreeSet<String>,
    /// Alerts active before the pass that are no longer active.
    pub cleared: BTreeSet<String>,
}

impl AlertEvaluation {
    /// True iff no alert is active.
    #[must_use]
    pub fn compliant(&self) -> bool {
        self.active.is_empty()
    }
}

/// Evaluates `rules` against `state`, starting from an empty alert set.
#[must_use]
pub fn evaluate(rules: &[Rule], state: &Document) -> AlertEvaluation {
    evaluate_from(rules, state, &BTreeSet::new())
}

/// Evaluates `rules` against `state`, starting from the asset's previously
/// active alerts.
///
/// # Examples
///
/// ```
/// use assetledger::{evaluate, Comparison, Document, Filter, Rule, Selector};
///
/// let cold = Filter::all(vec![Selector::compare("asset.temperature", Comparison::Lt, "0").unwrap()]);
/// let warm = Filter::all(vec![Selector::compare("asset.temperature", Comparison::Ge, "0").unwrap()]);
/// let rules = vec![
///     Rule::raise("too-cold", "asset", "cold", cold),
///     Rule::clear("warm-again", "asset", "cold", warm),
/// ];
///
/// let state = Document::parse(r#"{"asset":{"temperature":-5}}"#).unwrap();
/// let eval = evaluate(&rules, &state);
/// assert!(eval.active.contains("cold"));
/// assert!(!eval.compliant());
/// ```
#[must_use]
pub fn evaluate_from(rules: &[Rule], state: &Document, prior: &BTreeSet<String>) -> AlertEvaluation {
    let active = rules
        .iter()
        .filter(|rule| rule.trigger.matches(state))
        .fold(prior.clone(), |mut alerts, rule| {
            match rule.polarity {
                Polarity::Raise => {
                    alerts.insert(rule.alert.clone());
                }
                Polarity::Clear => {
                    alerts.remove(&rule.alert);
                }
            }
            alerts
        });

    let raised = active.difference(prior).cloned().collect();
    let cleared = prior.difference(&active).cloned().collect();
    AlertEvaluation {
        active,
        raised,
        cleared,
    }
}
