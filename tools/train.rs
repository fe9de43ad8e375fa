//! Training Script
//!
//! Trains the gradient boosted and random forest fraud classifiers on the
//! configured CSV and saves both, with their encoder, to the model store.

use anyhow::Result;
use fraud_classifier::{config::AppConfig, logging, models::ModelStore, training};
use std::time::Instant;
use tracing::info;

fn main() -> Result<()> {
    let config = AppConfig::load()?;
    logging::init(&config.logging)?;

    info!(
        data = %config.training.data_path,
        store = %config.store.path,
        test_size = config.training.test_size,
        seed = config.training.seed,
        "Starting training"
    );

    let start = Instant::now();
    let store = ModelStore::open(&config.store.path)?;
    let saved = training::train(&config.training, &store)?;

    for info in &saved {
        info!(
            tag = %info.tag,
            evaluation = %info.metadata.get("evaluation").cloned().unwrap_or_default(),
            "Model saved"
        );
    }
    info!(
        models = saved.len(),
        elapsed_secs = start.elapsed().as_secs_f64(),
        "Training complete"
    );

    Ok(())
}
