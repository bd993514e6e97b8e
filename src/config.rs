use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PredictorConfig {
    /// Directory holding the CSV corpus shards.
    pub data_dir: PathBuf,
    /// Directory holding the model, scaler, label encoder and manifest.
    pub artifact_dir: PathBuf,
    pub generator: GeneratorConfig,
    pub trainer: TrainerConfig,
    pub schema: SchemaConfig,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            artifact_dir: PathBuf::from("artifacts"),
            generator: GeneratorConfig::default(),
            trainer: TrainerConfig::default(),
            schema: SchemaConfig::default(),
        }
    }
}

impl PredictorConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        toml::from_str(&content).map_err(|e| anyhow!(e))
    }

    /// Reads `path` when it exists, otherwise falls back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            log::warn!("Config file '{}' not found. Using defaults.", path.display());
            Ok(Self::default())
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeneratorConfig {
    pub seed: u64,
    pub rows_per_shard: usize,
    pub shards: usize,
    pub high_probability: f64,
    pub mid_probability: f64,
    pub base_probability: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 123,
            rows_per_shard: 2500,
            shards: 3,
            high_probability: 0.8,
            mid_probability: 0.4,
            base_probability: 0.01,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrainerConfig {
    pub seed: u64,
    pub hidden_units: Vec<usize>,
    pub dropout: f32,
    pub learning_rate: f32,
    pub batch_size: usize,
    pub epochs: usize,
    /// Epochs without validation-loss improvement before stopping.
    pub patience: usize,
    /// Epochs of plateau before the learning rate is scaled by `lr_factor`.
    pub lr_patience: usize,
    pub lr_factor: f32,
    pub test_fraction: f64,
    pub validation_fraction: f64,
    pub checkpoint: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            hidden_units: vec![1024, 512, 256, 128],
            dropout: 0.4,
            learning_rate: 1e-3,
            batch_size: 64,
            epochs: 120,
            patience: 12,
            lr_patience: 6,
            lr_factor: 0.5,
            test_fraction: 0.10,
            validation_fraction: 0.10,
            checkpoint: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SchemaSource {
    /// Feature order persisted with the scaler at training time.
    Bundle,
    /// Header of the first corpus shard in the data directory.
    Corpus,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    /// Truncate or zero-pad to the scaler width and log a warning.
    Reconcile,
    /// Refuse to serve when the resolved names differ from the trained order.
    Fail,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SchemaConfig {
    pub source: SchemaSource,
    pub on_mismatch: MismatchPolicy,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            source: SchemaSource::Bundle,
            on_mismatch: MismatchPolicy::Reconcile,
        }
    }
}
