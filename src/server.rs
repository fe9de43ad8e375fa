//! HTTP surface of the prediction service

use crate::error::{ServiceError, ServiceResult};
use crate::metrics::{MetricsSnapshot, ServingMetrics};
use crate::models::runner::Runner;
use crate::types::transaction::TransactionRecord;
use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Route of the prediction endpoint
pub const PREDICT_ROUTE: &str = "/fraud-classifier";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub runner: Runner,
    pub metrics: Arc<ServingMetrics>,
}

/// Build the router with every route.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(PREDICT_ROUTE, post(predict))
        .route("/healthz", get(health))
        .route("/livez", get(health))
        .route("/readyz", get(ready))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Score a table of transactions.
///
/// The body is a JSON array of records and is parsed regardless of content
/// type. The response holds one 0/1 label per record, in order.
async fn predict(State(state): State<AppState>, body: Bytes) -> ServiceResult<Json<Vec<u8>>> {
    let start = Instant::now();

    let records: Vec<TransactionRecord> = match serde_json::from_slice(&body) {
        Ok(records) => records,
        Err(e) => {
            state.metrics.record_failure();
            return Err(e.into());
        }
    };

    let rows = records.len();
    match state.runner.predict(records).await {
        Ok(labels) => {
            state.metrics.record_request(start.elapsed(), &labels);
            debug!(rows, latency_us = start.elapsed().as_micros() as u64, "Prediction served");
            Ok(Json(labels))
        }
        Err(e) => {
            state.metrics.record_failure();
            Err(ServiceError::from(e))
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: i64,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
    })
}

#[derive(Serialize)]
pub struct ReadyResponse {
    status: &'static str,
    model: String,
    model_type: String,
    features: usize,
}

async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let engine = state.runner.engine();
    Json(ReadyResponse {
        status: "ready",
        model: engine.info().tag.to_string(),
        model_type: engine.model_type().to_string(),
        features: engine.feature_count(),
    })
}

async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
