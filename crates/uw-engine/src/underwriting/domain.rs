use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::distribution::ProbabilityDistribution;

/// Underwriting inputs for one applicant, keyed by attribute name.
///
/// The record has no fixed schema; rule criteria reference whichever fields
/// they need (`client.age`, `client.smoker`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Client(pub Map<String, JsonValue>);

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style attribute insertion.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    pub fn attributes(&self) -> &Map<String, JsonValue> {
        &self.0
    }
}

impl From<Map<String, JsonValue>> for Client {
    fn from(value: Map<String, JsonValue>) -> Self {
        Self(value)
    }
}

/// An underwriter with its base classification and ordered rule set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Carrier {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_outcome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_weight: Option<f64>,
    #[serde(default)]
    pub base_probabilities: BTreeMap<String, f64>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Carrier {
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Conditional underwriting policy belonging to a single carrier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability_shift: Option<BTreeMap<String, f64>>,
}

impl Rule {
    /// Priority used for conflict resolution; unset or NaN counts as 0.
    pub fn effective_priority(&self) -> f64 {
        match self.priority {
            // Adding zero folds -0.0 onto 0.0 so both rank alike.
            Some(priority) if !priority.is_nan() => priority + 0.0,
            _ => 0.0,
        }
    }

    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.id,
        }
    }
}

/// Result of evaluating one client against one carrier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub outcome: String,
    pub weight: f64,
    pub matches: Vec<Rule>,
    pub probabilities: ProbabilityDistribution,
}
