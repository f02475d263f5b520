use serde::{Deserialize, Serialize};

/// Label returned when a raw outcome cannot be mapped onto the vocabulary.
pub const DEFAULT_OUTCOME: &str = "Standard";

/// Sentinel outcome for carriers with no applicable rule.
pub const NOT_APPLICABLE: &str = "N/A";

/// Confidence weight used when no rule overrides it.
pub const NEUTRAL_WEIGHT: f64 = 1.0;

const DEFAULT_LABELS: [&str; 5] = ["Preferred", "Standard", "Substandard", "Decline", NOT_APPLICABLE];

/// Ordered canonical outcome vocabulary with a distinguished default label.
///
/// The default label is always a member of the vocabulary, so every result of
/// [`OutcomeOrder::normalize`] normalizes to itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct OutcomeOrder {
    labels: Vec<String>,
    default_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutcomeOrderError {
    #[error("outcome order must contain at least one non-empty label")]
    Empty,
}

impl OutcomeOrder {
    /// Builds a vocabulary using [`DEFAULT_OUTCOME`] as the fallback label.
    pub fn new<I, S>(labels: I) -> Result<Self, OutcomeOrderError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_default(labels, DEFAULT_OUTCOME)
    }

    /// Builds a vocabulary from raw labels.
    ///
    /// Labels are trimmed, blanks dropped, and case-insensitive duplicates
    /// collapsed onto their first occurrence. A default missing from the list
    /// is appended at the end.
    pub fn with_default<I, S>(labels: I, default: &str) -> Result<Self, OutcomeOrderError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut cleaned: Vec<String> = Vec::new();
        for label in labels {
            let label = label.as_ref().trim();
            if label.is_empty() || cleaned.iter().any(|seen| same_label(seen, label)) {
                continue;
            }
            cleaned.push(label.to_string());
        }

        let default = default.trim();
        if cleaned.is_empty() && default.is_empty() {
            return Err(OutcomeOrderError::Empty);
        }

        let default_index = if default.is_empty() {
            0
        } else {
            match cleaned
                .iter()
                .position(|label| same_label(label, default))
            {
                Some(index) => index,
                None => {
                    cleaned.push(default.to_string());
                    cleaned.len() - 1
                }
            }
        };

        Ok(Self {
            labels: cleaned,
            default_index,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn default_outcome(&self) -> &str {
        &self.labels[self.default_index]
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|candidate| candidate == label)
    }

    pub fn normalize(&self, raw: &str) -> &str {
        normalize_outcome(Some(raw), self)
    }
}

fn same_label(left: &str, right: &str) -> bool {
    left.to_lowercase() == right.to_lowercase()
}

impl Default for OutcomeOrder {
    fn default() -> Self {
        Self {
            labels: DEFAULT_LABELS.iter().map(|label| label.to_string()).collect(),
            default_index: 1,
        }
    }
}

impl TryFrom<Vec<String>> for OutcomeOrder {
    type Error = OutcomeOrderError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OutcomeOrder> for Vec<String> {
    fn from(value: OutcomeOrder) -> Self {
        value.labels
    }
}

/// Maps an arbitrary outcome label onto the canonical vocabulary.
///
/// Exact case-insensitive matches win. Otherwise the first label (in order)
/// that is a prefix of, has as prefix, contains, or is contained by the input
/// is returned. Blank or missing input, and input matching nothing, yield the
/// vocabulary's default label. Fuzzy matching may produce false positives
/// ("Standard Plus" maps to "Standard"); that approximation is accepted.
pub fn normalize_outcome<'a>(raw: Option<&str>, order: &'a OutcomeOrder) -> &'a str {
    let lower = match raw.map(str::trim) {
        Some(trimmed) if !trimmed.is_empty() => trimmed.to_lowercase(),
        _ => return order.default_outcome(),
    };

    let lowered: Vec<(String, &str)> = order
        .labels
        .iter()
        .map(|label| (label.to_lowercase(), label.as_str()))
        .collect();

    if let Some((_, label)) = lowered.iter().find(|(candidate, _)| *candidate == lower) {
        return *label;
    }

    lowered
        .iter()
        .find(|(candidate, _)| {
            candidate.starts_with(&lower)
                || lower.starts_with(candidate.as_str())
                || candidate.contains(&lower)
                || lower.contains(candidate.as_str())
        })
        .map(|(_, label)| *label)
        .unwrap_or_else(|| order.default_outcome())
}
