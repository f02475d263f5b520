use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{error, info};

use super::store::{LogStore, LogStoreError};
use super::{validate_outcome_logs, OutcomeLog};

const SEED_SUMMARY: &str = "Initial log created. Use the controls above to manage logs.";

#[derive(Debug, Error)]
pub enum LogBookError {
    #[error(transparent)]
    Store(#[from] LogStoreError),
    #[error("outcome logs must be an array of objects with a numeric or string timestamp")]
    InvalidLogs,
    #[error("failed to encode outcome logs: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Outcome history backed by a [`LogStore`]. Every mutation is persisted
/// before it returns.
#[derive(Debug)]
pub struct OutcomeLogBook<S> {
    store: S,
    logs: Vec<OutcomeLog>,
}

impl<S: LogStore> OutcomeLogBook<S> {
    /// Loads the stored history. Unreadable or invalid contents start an empty
    /// book; an empty book is seeded with an introductory entry.
    pub fn open(store: S) -> Result<Self, LogBookError> {
        let logs = match store.load() {
            Ok(Some(document)) => validate_outcome_logs(&document).unwrap_or_else(|| {
                error!("stored outcome logs failed validation; starting empty");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(LogStoreError::Corrupt(err)) => {
                error!(error = %err, "stored outcome logs are corrupt; starting empty");
                Vec::new()
            }
            Err(err) => return Err(err.into()),
        };

        let mut book = Self { store, logs };
        if book.logs.is_empty() {
            book.logs.push(OutcomeLog::new(SEED_SUMMARY));
            book.persist()?;
        }
        info!(entries = book.logs.len(), "outcome log book opened");
        Ok(book)
    }

    pub fn logs(&self) -> &[OutcomeLog] {
        &self.logs
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    pub fn record(&mut self, log: OutcomeLog) -> Result<(), LogBookError> {
        self.logs.push(log);
        if let Err(err) = self.persist() {
            self.logs.pop();
            return Err(err);
        }
        Ok(())
    }

    /// Appends a batch with a single write. A failed write drops the whole
    /// batch.
    pub fn record_all<I>(&mut self, logs: I) -> Result<usize, LogBookError>
    where
        I: IntoIterator<Item = OutcomeLog>,
    {
        let before = self.logs.len();
        self.logs.extend(logs);
        let added = self.logs.len() - before;
        if added == 0 {
            return Ok(0);
        }
        if let Err(err) = self.persist() {
            self.logs.truncate(before);
            return Err(err);
        }
        Ok(added)
    }

    /// Replaces the history with an imported JSON array. Invalid input leaves
    /// the book untouched.
    pub fn import_json(&mut self, raw: &str) -> Result<usize, LogBookError> {
        let document: JsonValue =
            serde_json::from_str(raw).map_err(|_| LogBookError::InvalidLogs)?;
        self.import_value(&document)
    }

    pub fn import_value(&mut self, document: &JsonValue) -> Result<usize, LogBookError> {
        let imported = validate_outcome_logs(document).ok_or(LogBookError::InvalidLogs)?;
        let previous = std::mem::replace(&mut self.logs, imported);
        if let Err(err) = self.persist() {
            self.logs = previous;
            return Err(err);
        }
        info!(entries = self.logs.len(), "outcome logs imported");
        Ok(self.logs.len())
    }

    pub fn export_json(&self) -> Result<String, LogBookError> {
        serde_json::to_string_pretty(&self.logs).map_err(LogBookError::Encode)
    }

    fn persist(&self) -> Result<(), LogBookError> {
        self.store.save(&self.logs)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::InMemoryLogStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// In-memory store whose writes can be switched off.
    #[derive(Clone, Default)]
    struct SwitchableStore {
        inner: InMemoryLogStore,
        failing: Arc<AtomicBool>,
        saves: Arc<AtomicUsize>,
    }

    impl LogStore for SwitchableStore {
        fn load(&self) -> Result<Option<JsonValue>, LogStoreError> {
            self.inner.load()
        }

        fn save(&self, logs: &[OutcomeLog]) -> Result<(), LogStoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(LogStoreError::Unavailable);
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.inner.save(logs)
        }
    }

    #[test]
    fn empty_store_is_seeded_and_persisted() {
        let store = InMemoryLogStore::default();
        let book = OutcomeLogBook::open(store.clone()).expect("opens");

        assert_eq!(book.len(), 1);
        assert_eq!(book.logs()[0].summary(), SEED_SUMMARY);
        let saved = store.document().expect("seed persisted");
        assert_eq!(saved.as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn invalid_stored_document_starts_fresh() {
        let store = InMemoryLogStore::with_document(json!({ "logs": [] }));
        let book = OutcomeLogBook::open(store).expect("opens");
        assert_eq!(book.len(), 1);
        assert_eq!(book.logs()[0].summary(), SEED_SUMMARY);
    }

    #[test]
    fn existing_logs_are_kept_without_seeding() {
        let store = InMemoryLogStore::with_document(json!([
            { "timestamp": "2024-01-01T00:00:00Z", "summary": "kept" }
        ]));
        let book = OutcomeLogBook::open(store).expect("opens");
        assert_eq!(book.len(), 1);
        assert_eq!(book.logs()[0].summary(), "kept");
    }

    #[test]
    fn import_replaces_history_and_rejects_bad_input() {
        let store = InMemoryLogStore::default();
        let mut book = OutcomeLogBook::open(store.clone()).expect("opens");
        book.record(OutcomeLog::new("evaluated")).expect("records");
        assert_eq!(book.len(), 2);

        let imported = book
            .import_json(r#"[{"timestamp": 1, "summary": "a"}, {"timestamp": "x", "title": "b"}]"#)
            .expect("imports");
        assert_eq!(imported, 2);
        assert_eq!(book.logs()[1].summary(), "b");

        for bad in ["not json", r#"{"timestamp": 1}"#, r#"[{"timestamp": 1}, {}]"#] {
            assert!(matches!(book.import_json(bad), Err(LogBookError::InvalidLogs)));
        }
        assert_eq!(book.len(), 2);
        assert_eq!(book.logs()[0].summary(), "a");

        let saved = store.document().expect("persisted");
        assert_eq!(saved[1]["title"], "b");
    }

    #[test]
    fn failed_writes_leave_book_matching_store() {
        let store = SwitchableStore::default();
        let mut book = OutcomeLogBook::open(store.clone()).expect("opens");
        book.record(OutcomeLog::new("first")).expect("records");
        assert_eq!(book.len(), 2);

        store.failing.store(true, Ordering::SeqCst);
        assert!(book.record(OutcomeLog::new("lost")).is_err());
        let batch = vec![OutcomeLog::new("x"), OutcomeLog::new("y")];
        assert!(book.record_all(batch).is_err());

        assert_eq!(book.len(), 2);
        assert_eq!(book.logs()[1].summary(), "first");
        let saved = store.inner.document().expect("persisted");
        assert_eq!(saved.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn record_all_writes_once_per_batch() {
        let store = SwitchableStore::default();
        let mut book = OutcomeLogBook::open(store.clone()).expect("opens");
        let writes_after_open = store.saves.load(Ordering::SeqCst);

        let added = book
            .record_all((0..3).map(|index| OutcomeLog::new(format!("carrier {index}"))))
            .expect("records batch");
        assert_eq!(added, 3);
        assert_eq!(book.len(), 4);
        assert_eq!(store.saves.load(Ordering::SeqCst), writes_after_open + 1);

        assert_eq!(book.record_all(Vec::new()).expect("empty batch"), 0);
        assert_eq!(store.saves.load(Ordering::SeqCst), writes_after_open + 1);
    }

    #[test]
    fn export_is_pretty_json_array() {
        let store = InMemoryLogStore::with_document(json!([{ "timestamp": 5, "summary": "x" }]));
        let book = OutcomeLogBook::open(store).expect("opens");
        let exported = book.export_json().expect("exports");
        assert!(exported.starts_with("[\n  {"));
        let parsed: JsonValue = serde_json::from_str(&exported).expect("valid json");
        assert_eq!(parsed, json!([{ "timestamp": 5, "summary": "x" }]));
    }
}
