use crate::cli::ServeArgs;
use crate::infra::{load_catalog, open_log_book, AppState, ServiceState};
use crate::routes::with_underwriting_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;
use uw_engine::config::AppConfig;
use uw_engine::error::AppError;
use uw_engine::telemetry;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let underwriting = &config.underwriting;
    let catalog = load_catalog(underwriting.catalog_path.as_deref())?;
    let logs = open_log_book(underwriting.log_store_path.as_deref())?;
    let service_state = ServiceState::new(
        catalog,
        underwriting.outcome_order.clone(),
        logs,
        underwriting.static_dir.clone(),
    );

    let app = with_underwriting_routes(service_state)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "underwriting engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}
