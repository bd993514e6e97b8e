//! The persisted model bundle: classifier, scaler and label encoder plus a
//! manifest that binds the three files together.
//!
//! Each artifact is written to a temporary name and renamed into place; the
//! manifest goes last and carries a SHA-256 per artifact, so a reader either
//! sees a bundle whose checksums all verify or fails to load it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{PredictorError, Result};
use crate::model::DiseaseNet;
use crate::preprocessing::{LabelEncoder, StandardScaler};

pub const MODEL_FILE: &str = "disease_model.bin";
pub const SCALER_FILE: &str = "scaler.bin";
pub const LABEL_ENCODER_FILE: &str = "label_encoder.bin";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const CHECKPOINT_FILE: &str = "checkpoint.bin";

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDigest {
    pub file: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub seed: u64,
    pub n_features: usize,
    pub n_classes: usize,
    pub hidden_units: Vec<usize>,
    #[serde(default)]
    pub test_accuracy: Option<f32>,
    pub artifacts: Vec<ArtifactDigest>,
}

impl Manifest {
    fn digest_for(&self, file: &str) -> Option<&str> {
        self.artifacts
            .iter()
            .find(|a| a.file == file)
            .map(|a| a.sha256.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ModelArtifactBundle {
    pub model: DiseaseNet,
    pub scaler: StandardScaler,
    pub encoder: LabelEncoder,
    pub manifest: Manifest,
}

impl ModelArtifactBundle {
    /// Builds an in-memory bundle after checking that the parts agree.
    pub fn new(
        model: DiseaseNet,
        scaler: StandardScaler,
        encoder: LabelEncoder,
        seed: u64,
        test_accuracy: Option<f32>,
    ) -> Result<Self> {
        check_consistency(&model, &scaler, &encoder)?;
        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            created_at: Utc::now(),
            seed,
            n_features: scaler.n_features_in(),
            n_classes: encoder.n_classes(),
            hidden_units: model.hidden_units(),
            test_accuracy,
            artifacts: Vec::new(),
        };
        Ok(Self {
            model,
            scaler,
            encoder,
            manifest,
        })
    }

    /// Writes the three artifacts and then the manifest into `dir`.
    pub fn save(&mut self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let parts = [
            (MODEL_FILE, bincode::serialize(&self.model)?),
            (SCALER_FILE, bincode::serialize(&self.scaler)?),
            (LABEL_ENCODER_FILE, bincode::serialize(&self.encoder)?),
        ];
        let mut digests = Vec::with_capacity(parts.len());
        for (file, bytes) in &parts {
            write_replacing(&dir.join(file), bytes)?;
            digests.push(ArtifactDigest {
                file: file.to_string(),
                sha256: sha256_hex(bytes),
            });
            log::info!("Saved {} -> {}", file, dir.join(file).display());
        }
        self.manifest.artifacts = digests;
        let manifest = serde_json::to_vec_pretty(&self.manifest)?;
        write_replacing(&dir.join(MANIFEST_FILE), &manifest)?;
        Ok(())
    }

    /// Loads and verifies a bundle. Any missing file, checksum mismatch or
    /// width disagreement is a load failure.
    pub fn load(dir: &Path) -> Result<Self> {
        let manifest: Manifest = serde_json::from_slice(&read_artifact(&dir.join(MANIFEST_FILE))?)?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(PredictorError::Artifact(format!(
                "unsupported bundle format {} (expected {})",
                manifest.format_version, FORMAT_VERSION
            )));
        }
        let model: DiseaseNet = bincode::deserialize(&read_verified(dir, MODEL_FILE, &manifest)?)?;
        let scaler: StandardScaler = bincode::deserialize(&read_verified(dir, SCALER_FILE, &manifest)?)?;
        let encoder: LabelEncoder =
            bincode::deserialize(&read_verified(dir, LABEL_ENCODER_FILE, &manifest)?)?;
        check_consistency(&model, &scaler, &encoder)?;
        if manifest.n_features != scaler.n_features_in() || manifest.n_classes != encoder.n_classes() {
            return Err(PredictorError::Artifact(format!(
                "manifest records {} features / {} classes, artifacts have {} / {}",
                manifest.n_features,
                manifest.n_classes,
                scaler.n_features_in(),
                encoder.n_classes()
            )));
        }
        log::info!(
            "Loaded model bundle from {} ({} features, {} classes, created {})",
            dir.display(),
            manifest.n_features,
            manifest.n_classes,
            manifest.created_at
        );
        Ok(Self {
            model,
            scaler,
            encoder,
            manifest,
        })
    }
}

fn check_consistency(model: &DiseaseNet, scaler: &StandardScaler, encoder: &LabelEncoder) -> Result<()> {
    if model.input_dim() != scaler.n_features_in() {
        return Err(PredictorError::Artifact(format!(
            "model expects {} inputs but scaler was fitted on {}",
            model.input_dim(),
            scaler.n_features_in()
        )));
    }
    if scaler.feature_names.len() != scaler.n_features_in() {
        return Err(PredictorError::Artifact(format!(
            "scaler lists {} feature names for {} features",
            scaler.feature_names.len(),
            scaler.n_features_in()
        )));
    }
    if model.n_classes() != encoder.n_classes() {
        return Err(PredictorError::Artifact(format!(
            "model has {} outputs but label encoder knows {} classes",
            model.n_classes(),
            encoder.n_classes()
        )));
    }
    Ok(())
}

fn read_artifact(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => PredictorError::Artifact(format!("missing artifact {}", path.display())),
        _ => PredictorError::Io(e),
    })
}

fn read_verified(dir: &Path, file: &str, manifest: &Manifest) -> Result<Vec<u8>> {
    let expected = manifest
        .digest_for(file)
        .ok_or_else(|| PredictorError::Artifact(format!("manifest has no entry for {}", file)))?;
    let bytes = read_artifact(&dir.join(file))?;
    let observed = sha256_hex(&bytes);
    if observed != expected {
        return Err(PredictorError::Artifact(format!(
            "checksum mismatch for {}: manifest {} observed {}",
            file, expected, observed
        )));
    }
    Ok(bytes)
}

fn write_replacing(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = PathBuf::from(path);
    tmp.set_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    encode_hex(&Sha256::digest(bytes))
}

fn encode_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}
