//! Outcome history: validation, display helpers, and persistence of
//! evaluation log entries.

pub mod book;
pub mod store;

pub use book::{LogBookError, OutcomeLogBook};
pub use store::{InMemoryLogStore, JsonFileLogStore, LogStore, LogStoreError};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as JsonValue};

use crate::underwriting::CarrierEvaluation;

const SUMMARY_FIELDS: [&str; 6] = ["summary", "result", "outcome", "message", "title", "description"];
const EMPTY_SUMMARY: &str = "—";

/// When a log entry was written: epoch milliseconds or free-form text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogTimestamp {
    Millis(Number),
    Text(String),
}

impl LogTimestamp {
    pub fn now() -> Self {
        Self::Millis(Number::from(Utc::now().timestamp_millis()))
    }

    fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Number(number) => Some(Self::Millis(number.clone())),
            JsonValue::String(text) => Some(Self::Text(text.clone())),
            _ => None,
        }
    }

    /// The instant this timestamp denotes, if it can be interpreted as one.
    pub fn moment(&self) -> Option<DateTime<Utc>> {
        match self {
            LogTimestamp::Millis(number) => number.as_f64().and_then(from_epoch_millis),
            LogTimestamp::Text(text) => {
                let trimmed = text.trim();
                trimmed
                    .parse::<f64>()
                    .ok()
                    .and_then(from_epoch_millis)
                    .or_else(|| {
                        DateTime::parse_from_rfc3339(trimmed)
                            .ok()
                            .map(|moment| moment.with_timezone(&Utc))
                    })
            }
        }
    }

    /// Human-readable UTC rendering; unparseable text is returned verbatim.
    pub fn display(&self) -> String {
        match (self.moment(), self) {
            (Some(moment), _) => moment.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            (None, LogTimestamp::Millis(number)) => number.to_string(),
            (None, LogTimestamp::Text(text)) => text.clone(),
        }
    }
}

fn from_epoch_millis(millis: f64) -> Option<DateTime<Utc>> {
    if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis.trunc() as i64)
}

/// A single entry in the outcome history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeLog {
    pub timestamp: LogTimestamp,
    #[serde(flatten)]
    pub fields: Map<String, JsonValue>,
}

impl OutcomeLog {
    /// Entry stamped with the current time and a summary line.
    pub fn new(summary: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("summary".to_string(), JsonValue::String(summary.into()));
        Self {
            timestamp: LogTimestamp::now(),
            fields,
        }
    }

    pub fn for_evaluation(evaluation: &CarrierEvaluation) -> Self {
        let mut log = Self::new(evaluation.summary());
        log.fields
            .insert("carrierId".to_string(), evaluation.carrier_id.clone().into());
        log.fields
            .insert("outcome".to_string(), evaluation.result.outcome.clone().into());
        if let Some(weight) = Number::from_f64(evaluation.result.weight) {
            log.fields.insert("weight".to_string(), JsonValue::Number(weight));
        }
        log
    }

    /// First non-blank descriptive field, else the remaining fields as JSON.
    pub fn summary(&self) -> String {
        let described = SUMMARY_FIELDS.iter().find_map(|key| match self.fields.get(*key) {
            Some(JsonValue::String(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
            _ => None,
        });
        if let Some(text) = described {
            return text;
        }

        if self.fields.is_empty() {
            EMPTY_SUMMARY.to_string()
        } else {
            JsonValue::Object(self.fields.clone()).to_string()
        }
    }

    pub fn display_timestamp(&self) -> String {
        self.timestamp.display()
    }

    /// RFC 3339 form of the timestamp when it can be interpreted as a moment.
    pub fn rfc3339(&self) -> Option<String> {
        self.timestamp
            .moment()
            .map(|moment| moment.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

/// Accepts an array whose every element is an object carrying a numeric or
/// string `timestamp`. Any other shape rejects the whole collection.
pub fn validate_outcome_logs(value: &JsonValue) -> Option<Vec<OutcomeLog>> {
    let entries = value.as_array()?;
    entries
        .iter()
        .map(|entry| {
            let object = entry.as_object()?;
            let timestamp = LogTimestamp::from_json(object.get("timestamp")?)?;
            let mut fields = object.clone();
            fields.remove("timestamp");
            Some(OutcomeLog { timestamp, fields })
        })
        .collect()
}
