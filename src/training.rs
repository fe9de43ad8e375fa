//! Training pipeline: CSV → balanced, encoded dataset → fitted models in the store

use crate::config::TrainingConfig;
use crate::dataset::{self, Split};
use crate::evaluation::ClassificationReport;
use crate::feature_extractor::FeatureExtractor;
use crate::models::classifier::{FraudClassifier, ModelType};
use crate::models::store::{ModelInfo, ModelPayload, ModelSignature, ModelStore, SaveOptions};
use crate::types::transaction::{LabeledTransaction, TransactionRecord};
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Instant;
use tracing::info;

/// Encoded training data shared by every model fit in one run.
pub struct PreparedData {
    pub extractor: FeatureExtractor,
    pub train_features: Vec<Vec<f64>>,
    pub train_labels: Vec<u8>,
    pub test_features: Vec<Vec<f64>>,
    pub test_labels: Vec<u8>,
}

/// Balance classes, fit the encoder on the balanced set and split it.
pub fn prepare(rows: Vec<LabeledTransaction>, config: &TrainingConfig) -> PreparedData {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let loaded = rows.len();
    let balanced = dataset::balance_classes(rows, &mut rng);
    info!("Balanced {} rows down to {}", loaded, balanced.len());

    let records: Vec<TransactionRecord> = balanced.iter().map(LabeledTransaction::record).collect();
    let labels: Vec<u8> = balanced.iter().map(|r| r.is_fraud).collect();

    let extractor = FeatureExtractor::fit(&records);
    let features = extractor.extract(&records);

    let Split { train, test } = dataset::train_test_split(records.len(), config.test_size, config.seed);

    info!(
        rows = records.len(),
        features = extractor.feature_count(),
        train = train.len(),
        test = test.len(),
        "Prepared training data"
    );

    PreparedData {
        train_features: dataset::take(&features, &train),
        train_labels: dataset::take(&labels, &train),
        test_features: dataset::take(&features, &test),
        test_labels: dataset::take(&labels, &test),
        extractor,
    }
}

/// Fit one model type on prepared data and report held-out scores.
pub fn fit_model(
    model_type: ModelType,
    data: &PreparedData,
    config: &TrainingConfig,
) -> Result<(FraudClassifier, ClassificationReport)> {
    let start = Instant::now();
    let classifier = match model_type {
        ModelType::Xgb => {
            FraudClassifier::fit_boosting(&data.train_features, &data.train_labels, &config.xgb)
        }
        ModelType::Rf => {
            FraudClassifier::fit_forest(&data.train_features, &data.train_labels, &config.rf)
        }
    }
    .with_context(|| format!("Failed to fit {} model", model_type))?;

    let predicted = classifier
        .predict(&data.test_features)
        .with_context(|| format!("Failed to evaluate {} model", model_type))?;
    let report = ClassificationReport::from_predictions(&data.test_labels, &predicted);

    info!(
        model_type = %model_type,
        elapsed_ms = start.elapsed().as_millis() as u64,
        accuracy = report.accuracy(),
        precision = report.precision(),
        recall = report.recall(),
        f1 = report.f1(),
        "Model fitted"
    );

    Ok((classifier, report))
}

fn save_options(config: &TrainingConfig, report: &ClassificationReport) -> SaveOptions {
    let mut options = SaveOptions::default();
    options.labels.insert("owner".to_string(), config.owner.clone());
    options.labels.insert("stage".to_string(), config.stage.clone());
    options
        .metadata
        .insert("version".to_string(), config.version.clone().into());
    options
        .metadata
        .insert("evaluation".to_string(), report.to_metadata());
    options
        .signatures
        .insert("predict".to_string(), ModelSignature::default());
    options
}

/// Run the full pipeline on already-loaded rows and save every model type.
pub fn train_rows(
    rows: Vec<LabeledTransaction>,
    config: &TrainingConfig,
    store: &ModelStore,
) -> Result<Vec<ModelInfo>> {
    let data = prepare(rows, config);

    let mut saved = Vec::with_capacity(ModelType::ALL.len());
    for model_type in ModelType::ALL {
        let (classifier, report) = fit_model(model_type, &data, config)?;

        // Persist the classifier together with the encoder it was fitted with
        let payload = ModelPayload::new(classifier, &data.extractor);
        let info = store
            .save(&model_type.store_name(), &payload, save_options(config, &report))
            .with_context(|| format!("Failed to save {} model", model_type))?;
        info!("Saved {} to {}", info.tag, store.root().display());
        saved.push(info);
    }
    Ok(saved)
}

/// Load the configured CSV, train both model types and save them to `store`.
pub fn train(config: &TrainingConfig, store: &ModelStore) -> Result<Vec<ModelInfo>> {
    let rows = dataset::load_transactions(&config.data_path)
        .with_context(|| format!("Failed to load training data from {}", config.data_path))?;
    info!("Loaded {} transactions from {}", rows.len(), config.data_path);
    train_rows(rows, config, store)
}
