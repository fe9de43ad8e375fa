//! Configuration management for the fraud classifier

use crate::models::classifier::{BoostingParams, ForestParams, ModelType};
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub server: ServerConfig,
    pub serving: ServingConfig,
    pub runner: RunnerConfig,
    pub training: TrainingConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// Model store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory of the local model store
    pub path: String,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Which model the service loads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServingConfig {
    /// "xgb" or "rf"
    pub model_type: ModelType,
    /// Version to load; "latest" picks the newest artifact
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "latest".to_string()
}

impl ServingConfig {
    /// Store tag of the configured model, e.g. `fraud_classifier_xgb:latest`
    pub fn tag(&self) -> String {
        format!("{}:{}", self.model_type.store_name(), self.version)
    }
}

/// Adaptive batching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Upper bound on rows per batch
    pub max_batch_size: usize,
    /// Longest a request waits for others to join its batch
    pub max_latency_ms: u64,
    /// Pending requests before callers are made to wait
    pub queue_capacity: usize,
}

/// Training pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Labeled transactions CSV
    pub data_path: String,
    /// Fraction held out for evaluation
    pub test_size: f64,
    /// Seed for class balancing and the split
    pub seed: u64,
    /// Artifact labels
    pub owner: String,
    pub stage: String,
    /// Artifact metadata version
    pub version: String,
    pub xgb: BoostingParams,
    pub rf: ForestParams,
}

/// Metrics reporting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between periodic summaries; 0 disables them
    pub report_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration layered as defaults, then `path` if present,
    /// then `FRAUD__SECTION__KEY` environment variables.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_layered(path.as_ref(), environment())
    }

    fn load_layered(path: &Path, env: Environment) -> Result<Self> {
        let defaults =
            Config::try_from(&AppConfig::default()).context("Failed to encode default configuration")?;

        let config = Config::builder()
            .add_source(defaults)
            .add_source(File::from(path).required(false))
            .add_source(env)
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

/// `FRAUD__SERVER__PORT=8080` overrides `server.port`
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

const ENV_PREFIX: &str = "FRAUD";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                path: "model_store".to_string(),
            },
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            serving: ServingConfig {
                model_type: ModelType::Xgb,
                version: default_version(),
            },
            runner: RunnerConfig {
                max_batch_size: 100,
                max_latency_ms: 10,
                queue_capacity: 1024,
            },
            training: TrainingConfig {
                data_path: "data/train_transaction.csv".to_string(),
                test_size: 0.2,
                seed: 42,
                owner: "Cerebrium".to_string(),
                stage: "prod".to_string(),
                version: "1.0.0".to_string(),
                xgb: BoostingParams::default(),
                rf: ForestParams::default(),
            },
            metrics: MetricsConfig {
                report_interval_secs: 60,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.serving.model_type, ModelType::Xgb);
        assert_eq!(config.serving.tag(), "fraud_classifier_xgb:latest");
        assert_eq!(config.training.test_size, 0.2);
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.training.xgb.iterations, 100);
        assert_eq!(config.training.rf.n_trees, 100);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_path("does/not/exist.toml").unwrap();
        assert_eq!(config.store.path, "model_store");
        assert_eq!(config.runner.max_batch_size, 100);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[serving]
model_type = "rf"

[training.xgb]
iterations = 25
max_depth = 4
shrinkage = 0.1
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.serving.model_type, ModelType::Rf);
        assert_eq!(config.serving.tag(), "fraud_classifier_rf:latest");
        assert_eq!(config.training.xgb.iterations, 25);
        // Untouched sections keep their defaults
        assert_eq!(config.training.rf.n_trees, 100);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_environment_overrides_file_and_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[server]\nport = 4000\n\n[serving]\nmodel_type = \"xgb\"").unwrap();

        let vars: HashMap<String, String> = [
            ("FRAUD__SERVER__PORT", "8080"),
            ("FRAUD__SERVING__MODEL_TYPE", "rf"),
            ("FRAUD__TRAINING__XGB__ITERATIONS", "7"),
            ("OTHER__SERVER__HOST", "ignored"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let env = environment().source(Some(vars.into_iter().collect()));

        let config = AppConfig::load_layered(file.path(), env).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.serving.model_type, ModelType::Rf);
        assert_eq!(config.training.xgb.iterations, 7);
        assert_eq!(config.training.xgb.max_depth, 6);
    }
}
