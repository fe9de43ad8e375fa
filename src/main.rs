//! Fraud Classifier - Prediction Service
//!
//! Loads the latest configured model and its encoder from the model store
//! and serves `POST /fraud-classifier`.

use anyhow::{Context, Result};
use fraud_classifier::{
    config::AppConfig,
    logging,
    metrics::{MetricsReporter, ServingMetrics},
    models::{InferenceEngine, ModelStore, Runner},
    server::{self, AppState, PREDICT_ROUTE},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging
    logging::init(&config.logging)?;

    info!("Starting Fraud Classifier service");
    info!("Configuration loaded successfully");

    // Load the configured model and its encoder
    let store = ModelStore::open(&config.store.path)?;
    info!("Model store at {}", store.root().display());
    let tag = config.serving.tag();
    let artifact = store
        .get(&tag)
        .with_context(|| format!("Failed to load {} from {}", tag, config.store.path))?;
    info!(
        tag = %artifact.info.tag,
        created_at = %artifact.info.created_at,
        labels = ?artifact.info.labels,
        "Model artifact loaded"
    );

    let engine = Arc::new(InferenceEngine::new(artifact));

    // Initialize metrics and the batching runner
    let metrics = Arc::new(ServingMetrics::new());
    let runner = Runner::spawn(engine, &config.runner, metrics.clone());

    // Start metrics reporter
    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let app = server::router(AppState {
        runner,
        metrics: metrics.clone(),
    });

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}{}", addr, PREDICT_ROUTE);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Service shutting down...");
    metrics.print_summary();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
