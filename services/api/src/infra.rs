use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::{error, info};
use uw_engine::catalog::CarrierCatalog;
use uw_engine::error::AppError;
use uw_engine::logs::{
    InMemoryLogStore, JsonFileLogStore, LogStore, LogStoreError, OutcomeLogBook,
};
use uw_engine::underwriting::{Client, EvaluationEngine, OutcomeOrder};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type DynLogBook = OutcomeLogBook<Box<dyn LogStore>>;

/// Everything the underwriting routes read or mutate.
#[derive(Clone)]
pub(crate) struct ServiceState {
    pub(crate) catalog: Arc<CarrierCatalog>,
    pub(crate) engine: Arc<EvaluationEngine>,
    pub(crate) logs: Arc<Mutex<DynLogBook>>,
    pub(crate) static_dir: Option<Arc<PathBuf>>,
}

impl ServiceState {
    pub(crate) fn new(
        catalog: CarrierCatalog,
        order: OutcomeOrder,
        logs: DynLogBook,
        static_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            catalog: Arc::new(catalog),
            engine: Arc::new(EvaluationEngine::new(order)),
            logs: Arc::new(Mutex::new(logs)),
            static_dir: static_dir.map(Arc::new),
        }
    }

    /// Runs `action` against the log book on the blocking pool, since every
    /// mutation writes the store synchronously.
    pub(crate) async fn with_log_book<T, F>(&self, action: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut DynLogBook) -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        let logs = Arc::clone(&self.logs);
        tokio::task::spawn_blocking(move || {
            let mut book = logs
                .lock()
                .map_err(|_| AppError::from(LogStoreError::Unavailable))?;
            action(&mut book)
        })
        .await
        .unwrap_or_else(|err| {
            error!(error = %err, "log book task failed");
            Err(AppError::from(LogStoreError::Unavailable))
        })
    }
}

pub(crate) fn load_catalog(path: Option<&Path>) -> Result<CarrierCatalog, AppError> {
    match path {
        Some(path) => Ok(CarrierCatalog::from_path(path)?),
        None => {
            info!("no carrier catalog configured; using sample carriers");
            Ok(CarrierCatalog::sample())
        }
    }
}

pub(crate) fn open_log_book(path: Option<&Path>) -> Result<DynLogBook, AppError> {
    let store: Box<dyn LogStore> = match path {
        Some(path) => Box::new(JsonFileLogStore::new(path)),
        None => Box::new(InMemoryLogStore::default()),
    };
    Ok(OutcomeLogBook::open(store)?)
}

/// Parses a client record given as a JSON object.
pub(crate) fn parse_client(raw: &str) -> Result<Client, String> {
    match serde_json::from_str::<JsonValue>(raw) {
        Ok(JsonValue::Object(attributes)) => Ok(Client::from(attributes)),
        Ok(_) => Err("client must be a JSON object".to_string()),
        Err(err) => Err(format!("client is not valid JSON ({err})")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_client_requires_an_object() {
        let client = parse_client(r#"{"age": 31, "smoker": false}"#).expect("object parses");
        assert_eq!(client.get("age"), Some(&serde_json::json!(31)));

        assert!(parse_client("[1, 2]").is_err());
        assert!(parse_client("{age: 31}").is_err());
    }

    #[test]
    fn unconfigured_sources_fall_back_to_memory_and_samples() {
        let catalog = load_catalog(None).expect("sample catalog");
        assert_eq!(catalog.len(), 2);

        let book = open_log_book(None).expect("memory book");
        assert_eq!(book.len(), 1);
    }
}
