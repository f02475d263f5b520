use crate::assets::static_asset;
use crate::infra::{AppState, ServiceState};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::borrow::Cow;
use tracing::info;
use uw_engine::catalog::CarrierCatalog;
use uw_engine::error::AppError;
use uw_engine::logs::OutcomeLog;
use uw_engine::underwriting::{
    annotate_rules, Carrier, CarrierEvaluation, CarrierRuleAudit, Client, EvaluationEngine,
    OutcomeOrder, OutcomeOrderError,
};

#[derive(Debug, Deserialize)]
pub(crate) struct EvaluationRequest {
    pub(crate) client: Client,
    #[serde(default)]
    pub(crate) carrier_ids: Vec<String>,
    /// Inline carriers evaluated instead of the configured catalog.
    #[serde(default)]
    pub(crate) carriers: Option<Vec<Carrier>>,
    #[serde(default)]
    pub(crate) outcome_order: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EvaluationResponse {
    pub(crate) evaluations: Vec<CarrierEvaluation>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CarrierSummary {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) rule_count: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct CarrierListResponse {
    pub(crate) carriers: Vec<CarrierSummary>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NormalizeQuery {
    #[serde(default)]
    pub(crate) label: Option<String>,
}

pub(crate) fn with_underwriting_routes(state: ServiceState) -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/carriers", get(list_carriers))
        .route("/api/v1/carriers/:carrier_id/rules", get(carrier_rules))
        .route(
            "/api/v1/evaluations",
            axum::routing::post(evaluation_endpoint),
        )
        .route("/api/v1/outcomes/normalize", get(normalize_endpoint))
        .route("/api/v1/logs", get(export_logs).post(import_logs))
        .fallback(static_asset)
        .with_state(state)
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn list_carriers(State(state): State<ServiceState>) -> Json<CarrierListResponse> {
    let carriers = state
        .catalog
        .carriers()
        .iter()
        .map(|carrier| CarrierSummary {
            id: carrier.id.clone(),
            name: carrier.display_name().to_string(),
            rule_count: carrier.rules.len(),
        })
        .collect();
    Json(CarrierListResponse { carriers })
}

pub(crate) async fn carrier_rules(
    State(state): State<ServiceState>,
    Path(carrier_id): Path<String>,
) -> Result<Json<CarrierRuleAudit>, AppError> {
    let carrier = state
        .catalog
        .get(&carrier_id)
        .ok_or_else(|| AppError::NotFound(format!("carrier '{carrier_id}'")))?;
    Ok(Json(annotate_rules(carrier, state.engine.order())))
}

pub(crate) async fn evaluation_endpoint(
    State(state): State<ServiceState>,
    Json(payload): Json<EvaluationRequest>,
) -> Result<Json<EvaluationResponse>, AppError> {
    let EvaluationRequest {
        client,
        carrier_ids,
        carriers,
        outcome_order,
    } = payload;

    let engine = match outcome_order {
        Some(labels) => {
            if labels.iter().all(|label| label.trim().is_empty()) {
                return Err(OutcomeOrderError::Empty.into());
            }
            let order =
                OutcomeOrder::with_default(labels, state.engine.order().default_outcome())?;
            Cow::Owned(EvaluationEngine::new(order))
        }
        None => Cow::Borrowed(state.engine.as_ref()),
    };

    let inline = carriers.map(CarrierCatalog::new).transpose()?;
    let catalog = inline.as_ref().unwrap_or(state.catalog.as_ref());
    let evaluations = engine.evaluate_carriers(&client, catalog.select(carrier_ids.as_slice()));

    let logs: Vec<OutcomeLog> = evaluations.iter().map(OutcomeLog::for_evaluation).collect();
    state
        .with_log_book(move |book| Ok(book.record_all(logs)?))
        .await?;
    info!(carriers = evaluations.len(), "client evaluated");

    Ok(Json(EvaluationResponse { evaluations }))
}

pub(crate) async fn normalize_endpoint(
    State(state): State<ServiceState>,
    Query(query): Query<NormalizeQuery>,
) -> Json<JsonValue> {
    let outcome = uw_engine::normalize_outcome(query.label.as_deref(), state.engine.order());
    Json(json!({ "label": query.label, "outcome": outcome }))
}

pub(crate) async fn export_logs(
    State(state): State<ServiceState>,
) -> Result<Json<Vec<OutcomeLog>>, AppError> {
    let logs = state
        .with_log_book(|book| Ok(book.logs().to_vec()))
        .await?;
    Ok(Json(logs))
}

pub(crate) async fn import_logs(
    State(state): State<ServiceState>,
    Json(document): Json<JsonValue>,
) -> Result<Json<JsonValue>, AppError> {
    let imported = state
        .with_log_book(move |book| Ok(book.import_value(&document)?))
        .await?;
    Ok(Json(json!({ "imported": imported })))
}
