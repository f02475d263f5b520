use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::Value as JsonValue;
use thiserror::Error;

use super::OutcomeLog;

#[derive(Debug, Error)]
pub enum LogStoreError {
    #[error("log store io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("log store contents are not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("log store unavailable")]
    Unavailable,
}

/// Persistence seam for the outcome log book.
///
/// `load` hands back the raw stored document (or `None` when nothing has been
/// saved yet) so the book can validate it.
pub trait LogStore: Send + Sync {
    fn load(&self) -> Result<Option<JsonValue>, LogStoreError>;
    fn save(&self, logs: &[OutcomeLog]) -> Result<(), LogStoreError>;
}

impl<S: LogStore + ?Sized> LogStore for Box<S> {
    fn load(&self) -> Result<Option<JsonValue>, LogStoreError> {
        (**self).load()
    }

    fn save(&self, logs: &[OutcomeLog]) -> Result<(), LogStoreError> {
        (**self).save(logs)
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryLogStore {
    document: Arc<Mutex<Option<JsonValue>>>,
}

impl InMemoryLogStore {
    /// Store pre-populated with a raw document, valid or not.
    pub fn with_document(document: JsonValue) -> Self {
        Self {
            document: Arc::new(Mutex::new(Some(document))),
        }
    }

    pub fn document(&self) -> Option<JsonValue> {
        self.document.lock().ok().and_then(|guard| guard.clone())
    }
}

impl LogStore for InMemoryLogStore {
    fn load(&self) -> Result<Option<JsonValue>, LogStoreError> {
        let guard = self.document.lock().map_err(|_| LogStoreError::Unavailable)?;
        Ok(guard.clone())
    }

    fn save(&self, logs: &[OutcomeLog]) -> Result<(), LogStoreError> {
        let document = serde_json::to_value(logs)?;
        let mut guard = self.document.lock().map_err(|_| LogStoreError::Unavailable)?;
        *guard = Some(document);
        Ok(())
    }
}

/// Keeps the log collection as a pretty-printed JSON array on disk.
#[derive(Debug, Clone)]
pub struct JsonFileLogStore {
    path: PathBuf,
}

impl JsonFileLogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogStore for JsonFileLogStore {
    fn load(&self) -> Result<Option<JsonValue>, LogStoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&self, logs: &[OutcomeLog]) -> Result<(), LogStoreError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut body = serde_json::to_string_pretty(logs)?;
        body.push('\n');
        fs::write(&self.path, body)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::validate_outcome_logs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default();
        std::env::temp_dir()
            .join(format!("uw-engine-{}-{nanos}-{name}", std::process::id()))
            .join("logs.json")
    }

    #[test]
    fn file_store_round_trips_logs() {
        let path = scratch_path("round-trip");
        let store = JsonFileLogStore::new(&path);
        assert!(store.load().expect("missing file loads").is_none());

        let logs = vec![OutcomeLog::new("first entry")];
        store.save(&logs).expect("saves");

        let raw = fs::read_to_string(&path).expect("file written");
        assert!(raw.contains("\n  {\n"), "pretty printed: {raw}");

        let loaded = store.load().expect("loads").expect("document present");
        assert_eq!(validate_outcome_logs(&loaded), Some(logs));

        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn file_store_reports_corrupt_contents() {
        let path = scratch_path("corrupt");
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).expect("scratch dir");
        }
        fs::write(&path, "{ not json").expect("write corrupt file");

        let store = JsonFileLogStore::new(&path);
        assert!(matches!(store.load(), Err(LogStoreError::Corrupt(_))));

        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn memory_store_keeps_last_saved_document() {
        let store = InMemoryLogStore::default();
        assert!(store.load().expect("loads").is_none());

        store.save(&[OutcomeLog::new("kept")]).expect("saves");
        let document = store.document().expect("document saved");
        assert_eq!(document[0]["summary"], "kept");
    }
}
