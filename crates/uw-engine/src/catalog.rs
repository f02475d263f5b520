//! Carrier definitions supplied to the engine: the built-in sample set and
//! JSON imports.

use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::Path;

use serde_json::Value as JsonValue;
use tracing::info;

use crate::underwriting::{Carrier, Rule};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read carrier catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid carrier catalog: {0}")]
    Json(#[from] serde_json::Error),
    #[error("carrier id '{0}' appears more than once")]
    DuplicateId(String),
    #[error("carrier catalog must be a JSON array or an object with a `carriers` array")]
    UnexpectedShape,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CarrierCatalog {
    carriers: Vec<Carrier>,
}

impl CarrierCatalog {
    /// Builds a catalog, rejecting repeated ids. Carriers without an id are
    /// kept but can only be reached through an empty selection.
    pub fn new(carriers: Vec<Carrier>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for carrier in carriers.iter().filter(|carrier| !carrier.id.is_empty()) {
            if !seen.insert(carrier.id.as_str()) {
                return Err(CatalogError::DuplicateId(carrier.id.clone()));
            }
        }
        Ok(Self { carriers })
    }

    /// Reads either a bare array of carriers or `{ "carriers": [...] }`.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let document: JsonValue = serde_json::from_reader(reader)?;
        let list = match document {
            list @ JsonValue::Array(_) => list,
            JsonValue::Object(mut fields) => match fields.remove("carriers") {
                Some(list @ JsonValue::Array(_)) => list,
                _ => return Err(CatalogError::UnexpectedShape),
            },
            _ => return Err(CatalogError::UnexpectedShape),
        };
        let carriers: Vec<Carrier> = serde_json::from_value(list)?;
        Self::new(carriers)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let catalog = Self::from_reader(std::io::BufReader::new(file))?;
        info!(path = %path.display(), carriers = catalog.len(), "loaded carrier catalog");
        Ok(catalog)
    }

    /// The two demonstration carriers used when no catalog is configured.
    pub fn sample() -> Self {
        Self {
            carriers: vec![sample_carrier_a(), sample_carrier_b()],
        }
    }

    pub fn carriers(&self) -> &[Carrier] {
        &self.carriers
    }

    pub fn get(&self, id: &str) -> Option<&Carrier> {
        self.carriers.iter().find(|carrier| carrier.id == id)
    }

    /// Carriers whose id is in `ids`, in catalog order. Unknown ids are
    /// ignored and an empty selection means every carrier.
    pub fn select<S: AsRef<str>>(&self, ids: &[S]) -> Vec<&Carrier> {
        if ids.is_empty() {
            return self.carriers.iter().collect();
        }
        let wanted: HashSet<&str> = ids.iter().map(AsRef::as_ref).collect();
        self.carriers
            .iter()
            .filter(|carrier| wanted.contains(carrier.id.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.carriers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.carriers.is_empty()
    }
}

fn shares(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries
        .iter()
        .map(|(label, value)| (label.to_string(), *value))
        .collect()
}

fn sample_rule(
    id: &str,
    name: &str,
    criteria: &str,
    outcome: &str,
    weight: f64,
    priority: f64,
    shift: &[(&str, f64)],
) -> Rule {
    Rule {
        id: id.to_string(),
        name: Some(name.to_string()),
        criteria: Some(criteria.to_string()),
        outcome: Some(outcome.to_string()),
        weight: Some(weight),
        priority: Some(priority),
        probability_shift: Some(shares(shift)),
    }
}

fn sample_carrier_a() -> Carrier {
    Carrier {
        id: "carrier-a".to_string(),
        name: "Carrier A".to_string(),
        base_outcome: Some("Standard".to_string()),
        base_weight: Some(1.0),
        base_probabilities: shares(&[("Preferred", 0.4), ("Standard", 0.4), ("Substandard", 0.2)]),
        rules: vec![
            sample_rule(
                "a-1",
                "Young Preferred",
                "client.age < 30 && client.creditScore >= 720",
                "Preferred",
                1.3,
                2.0,
                &[("Preferred", 0.2), ("Standard", -0.2)],
            ),
            sample_rule(
                "a-2",
                "High Risk",
                "client.smoker === true || client.bmi > 32",
                "Decline",
                0.7,
                3.0,
                &[("Decline", 0.4), ("Standard", -0.3), ("Substandard", -0.1)],
            ),
            sample_rule(
                "a-3",
                "Duplicate Warning",
                "client.smoker === true || client.bmi > 32",
                "Decline",
                0.6,
                1.0,
                &[("Decline", 0.1), ("Standard", -0.1)],
            ),
        ],
    }
}

fn sample_carrier_b() -> Carrier {
    Carrier {
        id: "carrier-b".to_string(),
        name: "Carrier B".to_string(),
        base_outcome: Some("Standard".to_string()),
        base_weight: Some(1.0),
        base_probabilities: shares(&[("Preferred", 0.3), ("Standard", 0.5), ("Substandard", 0.2)]),
        rules: vec![sample_rule(
            "b-1",
            "Wellness",
            "!client.smoker && client.bmi < 27",
            "Elite Preferred",
            1.2,
            1.0,
            &[("Preferred", 0.1), ("Standard", -0.1)],
        )],
    }
}
