//! Binary fraud classifiers backed by `gbdt` and `smartcore`

use gbdt::config::Config as GbdtConfig;
use gbdt::decision_tree::{Data, DataVec, ValueType};
use gbdt::gradient_boost::GBDT;
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_classifier::{
    RandomForestClassifier, RandomForestClassifierParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

type Forest = RandomForestClassifier<f64, u32, DenseMatrix<f64>, Vec<u32>>;

/// Probability above which the boosted model predicts fraud.
const DECISION_THRESHOLD: ValueType = 0.5;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Cannot fit on an empty training set")]
    EmptyTrainingSet,

    #[error("Feature/label length mismatch: {features} rows, {labels} labels")]
    LengthMismatch { features: usize, labels: usize },

    #[error("Row {row} has {got} features, expected {expected}")]
    RaggedRow {
        row: usize,
        got: usize,
        expected: usize,
    },

    #[error("Random forest failed: {0}")]
    Forest(String),

    #[error("Unknown model type: {0}")]
    UnknownModelType(String),
}

/// Classifier family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    /// Gradient boosted trees
    #[default]
    Xgb,
    /// Random forest
    Rf,
}

impl ModelType {
    pub const ALL: [ModelType; 2] = [ModelType::Xgb, ModelType::Rf];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Xgb => "xgb",
            ModelType::Rf => "rf",
        }
    }

    /// Name under which models of this type are kept in the model store.
    pub fn store_name(&self) -> String {
        format!("fraud_classifier_{}", self.as_str())
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xgb" | "xgboost" => Ok(ModelType::Xgb),
            "rf" | "random_forest" => Ok(ModelType::Rf),
            other => Err(ClassifierError::UnknownModelType(other.to_string())),
        }
    }
}

/// Gradient boosting hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostingParams {
    /// Boosting rounds
    pub iterations: usize,
    pub max_depth: u32,
    /// Learning rate
    pub shrinkage: f32,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            iterations: 100,
            max_depth: 6,
            shrinkage: 0.3,
        }
    }
}

/// Random forest hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: u16,
    /// Unbounded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u16>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
        }
    }
}

/// A fitted fraud classifier
#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", content = "model", rename_all = "snake_case")]
pub enum FraudClassifier {
    GradientBoosting(GBDT),
    RandomForest(Forest),
}

impl fmt::Debug for FraudClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FraudClassifier")
            .field(&self.model_type())
            .finish()
    }
}

impl FraudClassifier {
    pub fn model_type(&self) -> ModelType {
        match self {
            FraudClassifier::GradientBoosting(_) => ModelType::Xgb,
            FraudClassifier::RandomForest(_) => ModelType::Rf,
        }
    }

    /// Fit a gradient boosted model on 0/1 labels.
    pub fn fit_boosting(
        features: &[Vec<f64>],
        labels: &[u8],
        params: &BoostingParams,
    ) -> Result<Self, ClassifierError> {
        let n_features = check_training_set(features, labels)?;

        let mut cfg = GbdtConfig::new();
        cfg.set_feature_size(n_features);
        cfg.set_max_depth(params.max_depth);
        cfg.set_iterations(params.iterations);
        cfg.set_shrinkage(params.shrinkage);
        // Log-likelihood loss trains on -1/+1 labels and predicts P(label = +1)
        cfg.set_loss("LogLikelyhood");
        cfg.set_debug(false);
        cfg.set_training_optimization_level(2);

        let mut training: DataVec = features
            .iter()
            .zip(labels)
            .map(|(row, &label)| {
                let target = if label == 1 { 1.0 } else { -1.0 };
                Data::new_training_data(to_values(row), 1.0, target, None)
            })
            .collect();

        info!(
            rows = features.len(),
            features = n_features,
            iterations = params.iterations,
            max_depth = params.max_depth,
            "Fitting gradient boosted trees"
        );

        let mut gbdt = GBDT::new(&cfg);
        gbdt.fit(&mut training);
        Ok(FraudClassifier::GradientBoosting(gbdt))
    }

    /// Fit a random forest on 0/1 labels.
    pub fn fit_forest(
        features: &[Vec<f64>],
        labels: &[u8],
        params: &ForestParams,
    ) -> Result<Self, ClassifierError> {
        let n_features = check_training_set(features, labels)?;

        let x = DenseMatrix::from_2d_vec(&features.to_vec());
        let y: Vec<u32> = labels.iter().map(|&l| u32::from(l)).collect();

        let mut forest_params =
            RandomForestClassifierParameters::default().with_n_trees(params.n_trees);
        if let Some(depth) = params.max_depth {
            forest_params = forest_params.with_max_depth(depth);
        }

        info!(
            rows = features.len(),
            features = n_features,
            n_trees = params.n_trees,
            "Fitting random forest"
        );

        let forest = RandomForestClassifier::fit(&x, &y, forest_params)
            .map_err(|e| ClassifierError::Forest(e.to_string()))?;
        Ok(FraudClassifier::RandomForest(forest))
    }

    /// Predict a 0/1 label per row.
    pub fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<u8>, ClassifierError> {
        if features.is_empty() {
            return Ok(Vec::new());
        }

        match self {
            FraudClassifier::GradientBoosting(gbdt) => {
                let data: DataVec = features
                    .iter()
                    .map(|row| Data::new_test_data(to_values(row), None))
                    .collect();
                Ok(gbdt
                    .predict(&data)
                    .into_iter()
                    .map(|p| u8::from(p >= DECISION_THRESHOLD))
                    .collect())
            }
            FraudClassifier::RandomForest(forest) => {
                let x = DenseMatrix::from_2d_vec(&features.to_vec());
                let predicted = forest
                    .predict(&x)
                    .map_err(|e| ClassifierError::Forest(e.to_string()))?;
                Ok(predicted.into_iter().map(|l| u8::from(l == 1)).collect())
            }
        }
    }
}

fn to_values(row: &[f64]) -> Vec<ValueType> {
    row.iter().map(|&v| v as ValueType).collect()
}

/// Validate shapes and return the feature count.
fn check_training_set(features: &[Vec<f64>], labels: &[u8]) -> Result<usize, ClassifierError> {
    if features.is_empty() {
        return Err(ClassifierError::EmptyTrainingSet);
    }
    if features.len() != labels.len() {
        return Err(ClassifierError::LengthMismatch {
            features: features.len(),
            labels: labels.len(),
        });
    }

    let expected = features[0].len();
    if let Some((row, r)) = features.iter().enumerate().find(|(_, r)| r.len() != expected) {
        return Err(ClassifierError::RaggedRow {
            row,
            got: r.len(),
            expected,
        });
    }
    Ok(expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two well separated clusters: label 1 when the first feature is set.
    fn separable(n: usize) -> (Vec<Vec<f64>>, Vec<u8>) {
        let mut features = Vec::with_capacity(n);
        let mut labels = Vec::with_capacity(n);
        for i in 0..n {
            let fraud = i % 2 == 0;
            let jitter = (i % 5) as f64;
            if fraud {
                features.push(vec![1.0, 0.0, 900.0 + jitter]);
            } else {
                features.push(vec![0.0, 1.0, 20.0 + jitter]);
            }
            labels.push(u8::from(fraud));
        }
        (features, labels)
    }

    #[test]
    fn test_model_type_names() {
        assert_eq!(ModelType::Xgb.store_name(), "fraud_classifier_xgb");
        assert_eq!(ModelType::Rf.store_name(), "fraud_classifier_rf");
        assert_eq!("RF".parse::<ModelType>().unwrap(), ModelType::Rf);
        assert!("svm".parse::<ModelType>().is_err());
    }

    #[test]
    fn test_boosting_learns_separable_data() {
        let (features, labels) = separable(40);
        let params = BoostingParams {
            iterations: 20,
            max_depth: 3,
            shrinkage: 0.3,
        };

        let model = FraudClassifier::fit_boosting(&features, &labels, &params).unwrap();
        let predicted = model.predict(&features).unwrap();

        assert_eq!(model.model_type(), ModelType::Xgb);
        assert_eq!(predicted, labels);
    }

    #[test]
    fn test_forest_learns_separable_data() {
        let (features, labels) = separable(40);
        let params = ForestParams {
            n_trees: 10,
            max_depth: None,
        };

        let model = FraudClassifier::fit_forest(&features, &labels, &params).unwrap();
        let predicted = model.predict(&features).unwrap();

        assert_eq!(model.model_type(), ModelType::Rf);
        assert_eq!(predicted, labels);
    }

    #[test]
    fn test_predict_empty_batch() {
        let (features, labels) = separable(10);
        let model = FraudClassifier::fit_forest(&features, &labels, &ForestParams::default()).unwrap();

        assert!(model.predict(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_fit_rejects_mismatched_shapes() {
        let features = vec![vec![1.0, 2.0], vec![3.0]];
        let err = FraudClassifier::fit_boosting(&features, &[0, 1], &BoostingParams::default());
        assert!(matches!(err, Err(ClassifierError::RaggedRow { row: 1, .. })));

        let err = FraudClassifier::fit_forest(&features, &[0], &ForestParams::default());
        assert!(matches!(err, Err(ClassifierError::LengthMismatch { .. })));

        let err = FraudClassifier::fit_boosting(&[], &[], &BoostingParams::default());
        assert!(matches!(err, Err(ClassifierError::EmptyTrainingSet)));
    }

    #[test]
    fn test_serde_preserves_predictions() {
        let (features, labels) = separable(20);
        let params = BoostingParams {
            iterations: 10,
            max_depth: 3,
            shrinkage: 0.3,
        };
        let model = FraudClassifier::fit_boosting(&features, &labels, &params).unwrap();

        let json = serde_json::to_string(&model).unwrap();
        let restored: FraudClassifier = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.predict(&features).unwrap(), model.predict(&features).unwrap());
    }
}
