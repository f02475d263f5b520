use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use super::outcome::OutcomeOrder;

/// Canonical outcomes touched by at least one applied probability shift.
pub type ObservedOutcomes = BTreeSet<String>;

/// Weights keyed by canonical outcome, kept in vocabulary order.
///
/// Serializes as a JSON object whose keys follow the outcome order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbabilityDistribution {
    entries: Vec<(String, f64)>,
}

impl ProbabilityDistribution {
    /// Seeds a distribution with one entry per canonical outcome.
    ///
    /// Each entry takes the base share stored under exactly that label; keys
    /// outside the vocabulary are ignored. Missing outcomes start at zero and
    /// non-finite shares count as zero.
    pub fn from_base(base: &BTreeMap<String, f64>, order: &OutcomeOrder) -> Self {
        let mut distribution = Self::zeroed(order);

        for (label, value) in distribution.entries.iter_mut() {
            match base.get(label.as_str()) {
                Some(share) if share.is_finite() => *value = *share,
                Some(_) => debug!(outcome = %label, "ignoring non-finite base probability"),
                None => {}
            }
        }

        distribution
    }

    pub fn zeroed(order: &OutcomeOrder) -> Self {
        Self {
            entries: order
                .labels()
                .iter()
                .map(|label| (label.clone(), 0.0))
                .collect(),
        }
    }

    /// Adds each finite delta to its normalized outcome and records the
    /// outcome as observed. Non-finite deltas are skipped.
    pub fn apply_shift(
        &mut self,
        shift: &BTreeMap<String, f64>,
        order: &OutcomeOrder,
        observed: &mut ObservedOutcomes,
    ) {
        for (raw, delta) in shift {
            if !delta.is_finite() {
                continue;
            }
            let outcome = order.normalize(raw);
            observed.insert(outcome.to_string());
            *self.slot(outcome) += delta;
        }
    }

    /// Renormalizes the distribution in place.
    ///
    /// * A net-zero signed sum with observed outcomes splits mass equally
    ///   across the observed outcomes; everything else becomes zero.
    /// * Otherwise positive mass is rescaled to sum to one, with negative
    ///   entries clamped to zero.
    /// * With no positive mass, observed outcomes again share equally.
    /// * With nothing observed either, the all-zero distribution is kept.
    pub fn normalize(&mut self, observed: &ObservedOutcomes, order: &OutcomeOrder) -> &mut Self {
        for label in order.labels() {
            self.slot(label);
        }

        let observed_canonical: Vec<&str> = order
            .labels()
            .iter()
            .map(String::as_str)
            .filter(|label| observed.contains(*label))
            .collect();

        let sum: f64 = self.entries.iter().map(|(_, value)| value).sum();
        if sum.abs() < f64::EPSILON && !observed_canonical.is_empty() {
            self.split_evenly(&observed_canonical);
            return self;
        }

        let positive_mass: f64 = self
            .entries
            .iter()
            .map(|(_, value)| value.max(0.0))
            .sum();

        if positive_mass > 0.0 {
            for (_, value) in &mut self.entries {
                *value = value.max(0.0) / positive_mass;
            }
        } else if !observed_canonical.is_empty() {
            self.split_evenly(&observed_canonical);
        } else {
            for (_, value) in &mut self.entries {
                *value = value.max(0.0);
            }
        }

        self
    }

    fn split_evenly(&mut self, observed: &[&str]) {
        let share = 1.0 / observed.len() as f64;
        for (label, value) in &mut self.entries {
            *value = if observed.contains(&label.as_str()) {
                share
            } else {
                0.0
            };
        }
    }

    fn slot(&mut self, outcome: &str) -> &mut f64 {
        let index = match self.entries.iter().position(|(label, _)| label == outcome) {
            Some(index) => index,
            None => {
                self.entries.push((outcome.to_string(), 0.0));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index].1
    }

    pub fn get(&self, outcome: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(label, _)| label == outcome)
            .map(|(_, value)| *value)
    }

    /// Share for `outcome`, treating absent outcomes as zero.
    pub fn share(&self, outcome: &str) -> f64 {
        self.get(outcome).unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, value)| value).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries
            .iter()
            .map(|(label, value)| (label.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ProbabilityDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, value) in &self.entries {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ProbabilityDistribution {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DistributionVisitor;

        impl<'de> Visitor<'de> for DistributionVisitor {
            type Value = ProbabilityDistribution;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of outcome labels to probabilities")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((label, value)) = access.next_entry::<String, f64>()? {
                    entries.push((label, value));
                }
                Ok(ProbabilityDistribution { entries })
            }
        }

        deserializer.deserialize_map(DistributionVisitor)
    }
}
