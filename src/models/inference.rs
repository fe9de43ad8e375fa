//! Inference engine: replays training-time encoding and runs the classifier

use crate::feature_extractor::FeatureExtractor;
use crate::models::classifier::{ClassifierError, ModelType};
use crate::models::store::{ModelArtifact, ModelInfo, ModelPayload};
use crate::types::transaction::TransactionRecord;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Feature layout mismatch: got {got} columns, model expects {expected}")]
    ShapeMismatch { got: usize, expected: usize },

    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

/// Loaded model ready for prediction.
///
/// Owns the classifier and the encoder it was fit with; the two are only
/// ever constructed together from a store artifact.
pub struct InferenceEngine {
    info: ModelInfo,
    extractor: FeatureExtractor,
    payload: ModelPayload,
}

impl InferenceEngine {
    pub fn new(artifact: ModelArtifact) -> Self {
        let ModelArtifact { info, payload } = artifact;
        let extractor = FeatureExtractor::new(payload.encoder.clone());
        Self {
            info,
            extractor,
            payload,
        }
    }

    pub fn info(&self) -> &ModelInfo {
        &self.info
    }

    pub fn model_type(&self) -> ModelType {
        self.info.model_type
    }

    pub fn feature_count(&self) -> usize {
        self.payload.feature_names.len()
    }

    /// Predict a 0/1 fraud label for each record, in input order.
    pub fn predict(&self, records: &[TransactionRecord]) -> Result<Vec<u8>, InferenceError> {
        let features = self.extractor.extract(records);

        let expected = self.feature_count();
        if let Some(row) = features.iter().find(|r| r.len() != expected) {
            return Err(InferenceError::ShapeMismatch {
                got: row.len(),
                expected,
            });
        }

        let labels = self.payload.classifier.predict(&features)?;
        debug!(
            model = %self.info.tag,
            rows = records.len(),
            positives = labels.iter().filter(|&&l| l == 1).count(),
            "Inference complete"
        );
        Ok(labels)
    }
}
