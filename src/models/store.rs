//! Local model store: named, versioned, immutable model artifacts
//!
//! Layout on disk:
//!
//! ```text
//! {root}/{name}/{version}/manifest.json   ModelInfo
//! {root}/{name}/{version}/model.json      ModelPayload (classifier + encoder)
//! ```
//!
//! Artifacts are staged in a hidden directory and renamed into place, so a
//! version directory is either complete or absent. Existing versions are
//! never overwritten.

use crate::feature_extractor::{FeatureExtractor, OneHotEncoder};
use crate::models::classifier::{FraudClassifier, ModelType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

const MANIFEST_FILE: &str = "manifest.json";
const MODEL_FILE: &str = "model.json";
const LATEST: &str = "latest";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid tag {0:?}: expected name[:version]")]
    InvalidTag(String),

    #[error("Invalid model name {0:?}: use lowercase letters, digits, '_', '-' or '.'")]
    InvalidName(String),

    #[error("Model {0} not found in store")]
    NotFound(String),

    #[error("Model {0} already exists")]
    AlreadyExists(String),

    #[error("Artifact {tag} is inconsistent: {reason}")]
    Corrupt { tag: String, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error on {path}: {source}")]
    Serde {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn serde_err(path: &Path) -> impl FnOnce(serde_json::Error) -> StoreError + '_ {
    move |source| StoreError::Serde {
        path: path.display().to_string(),
        source,
    }
}

/// Model reference: `name`, `name:latest` or `name:version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub version: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn latest(name: impl Into<String>) -> Self {
        Self::new(name, LATEST)
    }

    pub fn is_latest(&self) -> bool {
        self.version == LATEST
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.version)
    }
}

impl FromStr for Tag {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, version) = match s.split_once(':') {
            Some((name, version)) => (name, version),
            None => (s, LATEST),
        };
        // Versions name a directory under the model; hidden entries are staging areas
        if version.is_empty()
            || version.starts_with('.')
            || version.contains(['/', '\\', ':'])
        {
            return Err(StoreError::InvalidTag(s.to_string()));
        }
        validate_name(name)?;
        Ok(Tag::new(name, version))
    }
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

/// How the runner may call a model method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSignature {
    pub batchable: bool,
    pub batch_dim: usize,
}

impl Default for ModelSignature {
    fn default() -> Self {
        Self {
            batchable: true,
            batch_dim: 0,
        }
    }
}

/// Descriptive part of an artifact, stored in `manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub tag: Tag,
    pub model_type: ModelType,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub signatures: BTreeMap<String, ModelSignature>,
    pub created_at: DateTime<Utc>,
}

/// Fitted classifier together with the encoder that defines its input layout.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelPayload {
    pub classifier: FraudClassifier,
    pub encoder: OneHotEncoder,
    /// Input column names the classifier was fit on
    pub feature_names: Vec<String>,
}

impl ModelPayload {
    pub fn new(classifier: FraudClassifier, extractor: &FeatureExtractor) -> Self {
        Self {
            classifier,
            encoder: extractor.encoder().clone(),
            feature_names: extractor.feature_names(),
        }
    }

    /// Check that the encoder still produces the stored feature layout.
    pub fn verify(&self) -> Result<(), String> {
        let produced = FeatureExtractor::new(self.encoder.clone()).feature_names();
        if produced == self.feature_names {
            Ok(())
        } else {
            Err(format!(
                "encoder yields {} features, model expects {}",
                produced.len(),
                self.feature_names.len()
            ))
        }
    }
}

/// A complete artifact as loaded from the store.
#[derive(Debug)]
pub struct ModelArtifact {
    pub info: ModelInfo,
    pub payload: ModelPayload,
}

/// Options attached to an artifact when it is saved.
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    pub labels: BTreeMap<String, String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub signatures: BTreeMap<String, ModelSignature>,
}

/// Filesystem-backed model store
#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(io_err(&root))?;
        debug!(root = %root.display(), "Opened model store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist a new artifact under `name` and return its info.
    pub fn save(
        &self,
        name: &str,
        payload: &ModelPayload,
        options: SaveOptions,
    ) -> Result<ModelInfo, StoreError> {
        validate_name(name)?;

        let created_at = Utc::now();
        let tag = Tag::new(name, new_version(created_at));
        payload.verify().map_err(|reason| StoreError::Corrupt {
            tag: tag.to_string(),
            reason,
        })?;

        let info = ModelInfo {
            tag: tag.clone(),
            model_type: payload.classifier.model_type(),
            labels: options.labels,
            metadata: options.metadata,
            signatures: options.signatures,
            created_at,
        };

        let model_dir = self.root.join(name);
        fs::create_dir_all(&model_dir).map_err(io_err(&model_dir))?;

        let final_dir = model_dir.join(&tag.version);
        if final_dir.exists() {
            return Err(StoreError::AlreadyExists(tag.to_string()));
        }

        let staging = model_dir.join(format!(".{}.partial", tag.version));
        fs::create_dir_all(&staging).map_err(io_err(&staging))?;

        let result = write_json(&staging.join(MODEL_FILE), payload)
            .and_then(|_| write_json(&staging.join(MANIFEST_FILE), &info))
            .and_then(|_| fs::rename(&staging, &final_dir).map_err(io_err(&final_dir)));

        if let Err(e) = result {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                warn!(path = %staging.display(), error = %cleanup, "Failed to remove staging directory");
            }
            return Err(e);
        }

        info!(tag = %tag, model_type = %info.model_type, "Saved model to store");
        Ok(info)
    }

    /// Load a complete artifact by tag string.
    pub fn get(&self, tag: &str) -> Result<ModelArtifact, StoreError> {
        let info = self.info(tag)?;
        let path = self.version_dir(&info.tag).join(MODEL_FILE);
        let payload: ModelPayload = read_json(&path)?;

        payload.verify().map_err(|reason| StoreError::Corrupt {
            tag: info.tag.to_string(),
            reason,
        })?;
        if payload.classifier.model_type() != info.model_type {
            return Err(StoreError::Corrupt {
                tag: info.tag.to_string(),
                reason: format!(
                    "manifest says {}, payload holds {}",
                    info.model_type,
                    payload.classifier.model_type()
                ),
            });
        }

        info!(
            tag = %info.tag,
            model_type = %info.model_type,
            features = payload.feature_names.len(),
            "Loaded model from store"
        );
        Ok(ModelArtifact { info, payload })
    }

    /// Load only the manifest, resolving `latest`.
    pub fn info(&self, tag: &str) -> Result<ModelInfo, StoreError> {
        let tag: Tag = tag.parse()?;

        if tag.is_latest() {
            return self
                .list(Some(&tag.name))?
                .into_iter()
                .max_by_key(|info| info.created_at)
                .ok_or_else(|| StoreError::NotFound(tag.to_string()));
        }

        let path = self.version_dir(&tag).join(MANIFEST_FILE);
        if !path.exists() {
            return Err(StoreError::NotFound(tag.to_string()));
        }
        read_json(&path)
    }

    /// List artifacts, optionally restricted to one name, oldest first.
    pub fn list(&self, name: Option<&str>) -> Result<Vec<ModelInfo>, StoreError> {
        let names: Vec<String> = match name {
            Some(n) => {
                validate_name(n)?;
                vec![n.to_string()]
            }
            None => visible_entries(&self.root)?,
        };

        let mut infos = Vec::new();
        for name in names {
            let model_dir = self.root.join(&name);
            if !model_dir.is_dir() {
                continue;
            }
            for version in visible_entries(&model_dir)? {
                let manifest = model_dir.join(&version).join(MANIFEST_FILE);
                match read_json::<ModelInfo>(&manifest) {
                    Ok(info) => infos.push(info),
                    Err(e) => warn!(path = %manifest.display(), error = %e, "Skipping unreadable manifest"),
                }
            }
        }

        infos.sort_by_key(|info| info.created_at);
        Ok(infos)
    }

    fn version_dir(&self, tag: &Tag) -> PathBuf {
        self.root.join(&tag.name).join(&tag.version)
    }
}

/// Sortable, unique version string.
fn new_version(created_at: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", created_at.format("%Y%m%d%H%M%S%6f"), &suffix[..8])
}

/// Directory entries that are directories and not hidden (staging dirs are hidden).
fn visible_entries(dir: &Path) -> Result<Vec<String>, StoreError> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err(dir))? {
        let entry = entry.map_err(io_err(dir))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') && entry.path().is_dir() {
            entries.push(name);
        }
    }
    entries.sort();
    Ok(entries)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let file = fs::File::create(path).map_err(io_err(path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value).map_err(serde_err(path))?;
    writer.flush().map_err(io_err(path))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, StoreError> {
    let file = fs::File::open(path).map_err(io_err(path))?;
    serde_json::from_reader(BufReader::new(file)).map_err(serde_err(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::classifier::ForestParams;
    use crate::types::TransactionRecord;

    fn payload() -> ModelPayload {
        let records: Vec<TransactionRecord> = (0..12)
            .map(|i| TransactionRecord {
                product_cd: Some((if i % 2 == 0 { "W" } else { "C" }).to_string()),
                ..TransactionRecord::new(i as f64)
            })
            .collect();
        let labels: Vec<u8> = (0..12).map(|i| u8::from(i % 2 == 1)).collect();
        let extractor = FeatureExtractor::fit(&records);
        let features = extractor.extract(&records);
        let params = ForestParams {
            n_trees: 5,
            max_depth: Some(3),
        };
        let classifier = FraudClassifier::fit_forest(&features, &labels, &params).unwrap();
        ModelPayload::new(classifier, &extractor)
    }

    #[test]
    fn test_tag_parsing() {
        let tag: Tag = "fraud_classifier_xgb:latest".parse().unwrap();
        assert_eq!(tag, Tag::latest("fraud_classifier_xgb"));

        let tag: Tag = "fraud_classifier_rf".parse().unwrap();
        assert!(tag.is_latest());

        let tag: Tag = "fraud_classifier_rf:20240101-abc".parse().unwrap();
        assert_eq!(tag.to_string(), "fraud_classifier_rf:20240101-abc");

        assert!("Fraud:latest".parse::<Tag>().is_err());
        assert!("fraud:".parse::<Tag>().is_err());
        assert!("fraud:a:b".parse::<Tag>().is_err());
        assert!(":v1".parse::<Tag>().is_err());
        assert!("fraud:..".parse::<Tag>().is_err());
        assert!("fraud:.20240101-abc.partial".parse::<Tag>().is_err());
        assert!("fraud:a\\b".parse::<Tag>().is_err());
    }

    #[test]
    fn test_save_and_get_latest() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();

        let mut options = SaveOptions::default();
        options.labels.insert("stage".to_string(), "prod".to_string());
        let first = store.save("fraud_classifier_rf", &payload(), options.clone()).unwrap();
        let second = store.save("fraud_classifier_rf", &payload(), options).unwrap();

        assert_ne!(first.tag, second.tag);
        let version_dir = store
            .root()
            .join("fraud_classifier_rf")
            .join(&second.tag.version);
        assert!(version_dir.join(MANIFEST_FILE).is_file());
        assert!(version_dir.join(MODEL_FILE).is_file());

        let latest = store.get("fraud_classifier_rf:latest").unwrap();
        assert_eq!(latest.info.tag, second.tag);
        assert_eq!(latest.info.labels.get("stage").map(String::as_str), Some("prod"));
        assert_eq!(latest.info.model_type, ModelType::Rf);

        let pinned = store.get(&first.tag.to_string()).unwrap();
        assert_eq!(pinned.info.tag, first.tag);

        assert_eq!(store.list(Some("fraud_classifier_rf")).unwrap().len(), 2);
        assert_eq!(store.list(None).unwrap().len(), 2);
    }

    #[test]
    fn test_get_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();

        assert!(matches!(
            store.get("fraud_classifier_xgb:latest"),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.info("fraud_classifier_xgb:v1"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_ignores_staging_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        store.save("fraud_classifier_rf", &payload(), SaveOptions::default()).unwrap();
        fs::create_dir_all(dir.path().join("fraud_classifier_rf").join(".v2.partial")).unwrap();

        assert_eq!(store.list(Some("fraud_classifier_rf")).unwrap().len(), 1);
    }

    #[test]
    fn test_save_rejects_mismatched_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        let mut bad = payload();
        bad.feature_names.pop();

        assert!(matches!(
            store.save("fraud_classifier_rf", &bad, SaveOptions::default()),
            Err(StoreError::Corrupt { .. })
        ));
        assert!(store.list(None).unwrap().is_empty());
    }
}
