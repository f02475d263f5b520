use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::underwriting::outcome::{OutcomeOrder, OutcomeOrderError, DEFAULT_OUTCOME};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub underwriting: UnderwritingConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let underwriting = UnderwritingConfig::from_env()?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            underwriting,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Outcome vocabulary and the data sources the service reads.
#[derive(Debug, Clone)]
pub struct UnderwritingConfig {
    pub outcome_order: OutcomeOrder,
    /// JSON carrier catalog; the built-in sample carriers when unset.
    pub catalog_path: Option<PathBuf>,
    /// Outcome log file; logs stay in memory when unset.
    pub log_store_path: Option<PathBuf>,
    pub static_dir: Option<PathBuf>,
}

impl UnderwritingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let default_outcome =
            env::var("UW_DEFAULT_OUTCOME").unwrap_or_else(|_| DEFAULT_OUTCOME.to_string());

        let outcome_order = match env::var("UW_OUTCOME_ORDER") {
            Ok(raw) => OutcomeOrder::with_default(raw.split(','), &default_outcome),
            Err(_) => OutcomeOrder::with_default(
                OutcomeOrder::default().labels().iter().map(String::as_str),
                &default_outcome,
            ),
        }
        .map_err(|source| ConfigError::InvalidOutcomeOrder { source })?;

        Ok(Self {
            outcome_order,
            catalog_path: path_var("UW_CATALOG_PATH"),
            log_store_path: path_var("UW_LOG_STORE_PATH"),
            static_dir: path_var("UW_STATIC_DIR"),
        })
    }
}

fn path_var(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidOutcomeOrder { source: OutcomeOrderError },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidOutcomeOrder { source } => {
                write!(f, "UW_OUTCOME_ORDER is invalid: {source}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidOutcomeOrder { source } => Some(source),
        }
    }
}
