//! Serving-side prediction.
//!
//! [`InferenceService`] is built once from a loaded bundle and is read-only
//! afterwards, so a single instance can be shared by any number of request
//! handlers. [`LazyInference`] defers that construction to the first request.

use ndarray::Axis;
use serde::Serialize;
use std::sync::{Arc, OnceLock};

use crate::advisory::{AdvisoryCatalogue, AdvisoryRecord, UNKNOWN_LABEL};
use crate::artifacts::{Manifest, ModelArtifactBundle};
use crate::config::{PredictorConfig, SchemaSource};
use crate::error::{PredictorError, Result};
use crate::schema::{self, ColumnSource, CorpusHeaderSource, FixedColumns, SchemaResolver, SymptomSchema};

/// Number of ranked alternatives reported next to the top label.
const RANKED_ALTERNATIVES: usize = 3;

/// Between 2 and 5 distinct, non-empty symptom selections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredictionRequest {
    symptoms: Vec<String>,
}

impl PredictionRequest {
    pub const MIN_SYMPTOMS: usize = 2;
    pub const MAX_SYMPTOMS: usize = 5;

    /// Trims each selection, drops blanks and duplicates (first occurrence
    /// wins) and checks the count.
    pub fn new<I, S>(selections: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut symptoms: Vec<String> = Vec::new();
        for raw in selections {
            let name = raw.as_ref().trim();
            if !name.is_empty() && !symptoms.iter().any(|s| s == name) {
                symptoms.push(name.to_string());
            }
        }
        if symptoms.len() < Self::MIN_SYMPTOMS {
            return Err(PredictorError::Validation(format!(
                "Please select at least {} different symptoms.",
                Self::MIN_SYMPTOMS
            )));
        }
        if symptoms.len() > Self::MAX_SYMPTOMS {
            return Err(PredictorError::Validation(format!(
                "Please select at most {} symptoms.",
                Self::MAX_SYMPTOMS
            )));
        }
        Ok(Self { symptoms })
    }

    pub fn symptoms(&self) -> &[String] {
        &self.symptoms
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedLabel {
    pub label: String,
    pub probability: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub predicted: String,
    /// Softmax probability of `predicted`, in `[0, 1]`.
    pub confidence: f32,
    /// `confidence` as a percentage rounded to two decimals.
    pub confidence_percent: f64,
    pub advisory: AdvisoryRecord,
    pub selected_symptoms: Vec<String>,
    /// Selections that are not part of the resolved schema.
    pub ignored_symptoms: Vec<String>,
    pub alternatives: Vec<RankedLabel>,
    /// The full resolved schema, for redisplaying selection widgets.
    pub symptoms: Vec<String>,
}

pub struct InferenceService {
    bundle: ModelArtifactBundle,
    schema: SymptomSchema,
    advisories: AdvisoryCatalogue,
}

impl InferenceService {
    /// Loads the bundle in `cfg.artifact_dir` and resolves the schema from the
    /// configured source.
    pub fn load(cfg: &PredictorConfig) -> Result<Self> {
        let bundle = ModelArtifactBundle::load(&cfg.artifact_dir)?;
        let source: Box<dyn ColumnSource> = match cfg.schema.source {
            SchemaSource::Bundle => Box::new(FixedColumns(bundle.scaler.feature_names.clone())),
            SchemaSource::Corpus => Box::new(CorpusHeaderSource::new(&cfg.data_dir)),
        };
        let resolver = SchemaResolver::new(source, cfg.schema.on_mismatch);
        Self::from_parts(bundle, &resolver, AdvisoryCatalogue::builtin()?)
    }

    pub fn from_parts(
        bundle: ModelArtifactBundle,
        resolver: &SchemaResolver,
        advisories: AdvisoryCatalogue,
    ) -> Result<Self> {
        let schema = resolver.resolve(bundle.scaler.n_features_in(), Some(&bundle.scaler.feature_names))?;
        log::info!("Symptom count: {}", schema.len());
        Ok(Self {
            bundle,
            schema,
            advisories,
        })
    }

    pub fn schema(&self) -> &SymptomSchema {
        &self.schema
    }

    pub fn labels(&self) -> &[String] {
        self.bundle.encoder.classes()
    }

    pub fn manifest(&self) -> &Manifest {
        &self.bundle.manifest
    }

    /// Validates raw selections and predicts.
    pub fn predict_symptoms<I, S>(&self, selections: I) -> Result<PredictionResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.predict(&PredictionRequest::new(selections)?)
    }

    pub fn predict(&self, request: &PredictionRequest) -> Result<PredictionResult> {
        let (x, ignored) = self.schema.encode(request.symptoms());
        let expected = self.bundle.scaler.n_features_in();
        if x.len() != expected {
            log::warn!("Re-aligning feature vector from {} to {} entries", x.len(), expected);
        }
        let x = schema::align_width(x, expected).insert_axis(Axis(0));
        let scaled = self.bundle.scaler.transform(&x)?;
        let probs = self.bundle.model.predict_proba(&scaled);
        let row = probs.row(0);

        let mut ranked: Vec<(usize, f32)> = row.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let label_of = |idx: usize| {
            self.bundle
                .encoder
                .decode(idx)
                .unwrap_or(UNKNOWN_LABEL)
                .to_string()
        };
        let (top, top_p) = ranked
            .first()
            .copied()
            .ok_or_else(|| PredictorError::Artifact("model produced no class scores".into()))?;
        let predicted = label_of(top);
        let confidence = top_p.clamp(0.0, 1.0);

        log::debug!("Predicted {} ({:.4}) for {:?}", predicted, confidence, request.symptoms());
        Ok(PredictionResult {
            advisory: self.advisories.lookup(&predicted).clone(),
            confidence_percent: (f64::from(confidence) * 10_000.0).round() / 100.0,
            confidence,
            predicted,
            selected_symptoms: request.symptoms().to_vec(),
            ignored_symptoms: ignored,
            alternatives: ranked
                .iter()
                .take(RANKED_ALTERNATIVES)
                .map(|&(idx, p)| RankedLabel {
                    label: label_of(idx),
                    probability: p,
                })
                .collect(),
            symptoms: self.schema.names().to_vec(),
        })
    }
}

/// Loads the [`InferenceService`] on first use and keeps it for the lifetime
/// of this holder.
///
/// Concurrent first calls may each load the bundle; the first one stored is
/// kept and the others are dropped. Loading only reads immutable files.
pub struct LazyInference {
    config: PredictorConfig,
    service: OnceLock<Arc<InferenceService>>,
}

impl LazyInference {
    pub fn new(config: PredictorConfig) -> Self {
        Self {
            config,
            service: OnceLock::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.service.get().is_some()
    }

    pub fn get(&self) -> Result<Arc<InferenceService>> {
        if let Some(service) = self.service.get() {
            return Ok(Arc::clone(service));
        }
        let loaded = Arc::new(InferenceService::load(&self.config)?);
        Ok(Arc::clone(self.service.get_or_init(|| loaded)))
    }

    /// Validates `selections` before touching the model; an invalid request
    /// never triggers a load.
    pub fn predict<I, S>(&self, selections: I) -> Result<PredictionResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let request = PredictionRequest::new(selections)?;
        self.get()?.predict(&request)
    }
}
