//! Classifiers, the model store and the serving path

pub mod classifier;
pub mod inference;
pub mod runner;
pub mod store;

pub use classifier::{FraudClassifier, ModelType};
pub use inference::InferenceEngine;
pub use runner::Runner;
pub use store::{ModelArtifact, ModelStore, Tag};
