//! Fraud Classifier Library
//!
//! Trains gradient boosted and random forest fraud classifiers, keeps them
//! with their one-hot encoder in a local model store, and serves the latest
//! one behind `POST /fraud-classifier`.

pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod feature_extractor;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod server;
pub mod smoke;
pub mod training;
pub mod types;

pub use config::AppConfig;
pub use feature_extractor::{FeatureExtractor, OneHotEncoder};
pub use models::{InferenceEngine, ModelStore, ModelType, Runner};
pub use types::{LabeledTransaction, TransactionRecord};
