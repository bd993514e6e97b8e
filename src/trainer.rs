//! Offline training job: corpus assembly, stratified split, fitting with
//! early stopping and learning-rate decay, evaluation and bundle persistence.

use anyhow::{anyhow, Result};
use ndarray::{Array2, Axis};
use rand::prelude::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::artifacts::{ModelArtifactBundle, CHECKPOINT_FILE};
use crate::config::{PredictorConfig, TrainerConfig};
use crate::data;
use crate::metrics::{self, Evaluation};
use crate::model::{self, DiseaseNet};
use crate::optim::Adam;
use crate::preprocessing::{self, LabelEncoder, Split, StandardScaler};
use crate::vocab::SYMPTOMS;

/// Minimum validation-loss decrease that resets the learning-rate plateau.
const LR_MIN_DELTA: f32 = 1e-4;

/// Corpus encoded and split, features still unscaled.
pub struct PreparedData {
    pub columns: Vec<String>,
    pub encoder: LabelEncoder,
    pub x: Array2<f32>,
    pub y: Vec<usize>,
    pub split: Split,
}

impl PreparedData {
    pub fn rows(&self, rows: &[usize]) -> (Array2<f32>, Vec<usize>) {
        (
            preprocessing::select_rows(&self.x, rows),
            preprocessing::select_labels(&self.y, rows),
        )
    }
}

/// Loads `columns` from every shard in `data_dir` and performs the seeded
/// stratified split.
///
/// With `encoder` given, labels are encoded with it instead of a freshly
/// fitted one, which lets an existing bundle be re-evaluated on its own
/// test split.
pub fn prepare_data(
    data_dir: &Path,
    columns: &[&str],
    cfg: &TrainerConfig,
    encoder: Option<LabelEncoder>,
) -> Result<PreparedData> {
    let corpus = data::load_corpus(data_dir, columns)?;
    if corpus.is_empty() {
        return Err(anyhow!("corpus in {} has no rows", data_dir.display()));
    }
    let encoder = encoder.unwrap_or_else(|| LabelEncoder::fit(&corpus.labels));
    let y = encoder.transform(&corpus.labels)?;
    log::info!(
        "X shape: ({}, {}), detected classes: {}",
        corpus.features.nrows(),
        corpus.features.ncols(),
        encoder.n_classes()
    );

    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let split = preprocessing::stratified_split(
        &y,
        encoder.n_classes(),
        cfg.test_fraction,
        cfg.validation_fraction,
        &mut rng,
    );
    log::info!(
        "Train/Val/Test rows: {}/{}/{}",
        split.train.len(),
        split.validation.len(),
        split.test.len()
    );
    if split.train.is_empty() || split.validation.is_empty() || split.test.is_empty() {
        return Err(anyhow!(
            "corpus too small to split: {} train, {} validation, {} test rows",
            split.train.len(),
            split.validation.len(),
            split.test.len()
        ));
    }
    Ok(PreparedData {
        columns: corpus.columns,
        encoder,
        x: corpus.features,
        y,
        split,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub train_loss: f32,
    pub val_loss: f32,
    pub val_accuracy: f32,
    pub learning_rate: f32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochRecord>,
    pub best_epoch: usize,
    pub stopped_early: bool,
}

impl TrainingHistory {
    pub fn record(&mut self, record: EpochRecord) {
        self.epochs.push(record);
    }
}

pub struct TrainingOutcome {
    pub bundle: ModelArtifactBundle,
    pub history: TrainingHistory,
    pub test: Evaluation,
    /// Unscaled test features and their labels, for re-evaluation.
    pub x_test: Array2<f32>,
    pub y_test: Vec<usize>,
}

pub struct Trainer {
    cfg: TrainerConfig,
    data_dir: PathBuf,
    artifact_dir: PathBuf,
}

impl Trainer {
    pub fn new(cfg: &PredictorConfig) -> Self {
        Self {
            cfg: cfg.trainer.clone(),
            data_dir: cfg.data_dir.clone(),
            artifact_dir: cfg.artifact_dir.clone(),
        }
    }

    pub fn run(&self) -> Result<TrainingOutcome> {
        log::info!("Reading CSVs from: {}", self.data_dir.display());
        let prepared = prepare_data(&self.data_dir, &SYMPTOMS, &self.cfg, None)?;
        let (x_train, y_train) = prepared.rows(&prepared.split.train);
        let (x_val, y_val) = prepared.rows(&prepared.split.validation);
        let (x_test, y_test) = prepared.rows(&prepared.split.test);

        let scaler = StandardScaler::fit(x_train.view(), prepared.columns.clone())?;
        let x_train_s = scaler.transform(&x_train)?;
        let x_val_s = scaler.transform(&x_val)?;
        let x_test_s = scaler.transform(&x_test)?;

        let n_classes = prepared.encoder.n_classes();
        let class_weights = preprocessing::balanced_class_weights(&y_train, n_classes);
        log::info!("Using class weights: {:?}", class_weights);

        let (net, history) = self.fit(&x_train_s, &y_train, &x_val_s, &y_val, n_classes, &class_weights)?;

        log::info!("Evaluating on test set...");
        let test = metrics::evaluate(&net, &x_test_s, &y_test, prepared.encoder.classes());
        log::info!("Test accuracy: {:.4}  Test loss: {:.4}", test.accuracy, test.loss);
        log::info!("Classification report:\n{}", test.report);
        log::info!("Confusion matrix (rows=true, cols=pred):\n{}", test.confusion);

        let mut bundle = ModelArtifactBundle::new(
            net,
            scaler,
            prepared.encoder,
            self.cfg.seed,
            Some(test.accuracy),
        )?;
        log::info!("Saving model and artifacts to {}", self.artifact_dir.display());
        bundle.save(&self.artifact_dir)?;

        Ok(TrainingOutcome {
            bundle,
            history,
            test,
            x_test,
            y_test,
        })
    }

    fn fit(
        &self,
        x_train: &Array2<f32>,
        y_train: &[usize],
        x_val: &Array2<f32>,
        y_val: &[usize],
        n_classes: usize,
        class_weights: &[f32],
    ) -> Result<(DiseaseNet, TrainingHistory)> {
        let cfg = &self.cfg;
        let batch_size = cfg.batch_size.max(1);
        let mut rng = StdRng::seed_from_u64(cfg.seed.wrapping_add(1));
        let mut net = DiseaseNet::new(x_train.ncols(), &cfg.hidden_units, n_classes, cfg.dropout, &mut rng);
        let mut optimizer = Adam::new(cfg.learning_rate);
        let mut history = TrainingHistory::default();

        let checkpoint = if cfg.checkpoint {
            std::fs::create_dir_all(&self.artifact_dir)?;
            Some(self.artifact_dir.join(CHECKPOINT_FILE))
        } else {
            None
        };

        let mut best: Option<DiseaseNet> = None;
        let mut best_loss = f32::INFINITY;
        let mut wait = 0usize;
        let mut plateau_best = f32::INFINITY;
        let mut plateau_wait = 0usize;
        let mut order: Vec<usize> = (0..x_train.nrows()).collect();

        for epoch in 1..=cfg.epochs {
            order.shuffle(&mut rng);
            let mut loss_sum = 0.0f32;
            for chunk in order.chunks(batch_size) {
                let xb = x_train.select(Axis(0), chunk);
                let yb: Vec<usize> = chunk.iter().map(|&r| y_train[r]).collect();
                let wb: Vec<f32> = yb.iter().map(|&c| class_weights[c]).collect();
                loss_sum += net.train_batch(&xb, &yb, &wb, &mut optimizer, &mut rng) * chunk.len() as f32;
            }
            let train_loss = loss_sum / order.len().max(1) as f32;

            let val_probs = net.predict_proba(x_val);
            let val_loss = model::cross_entropy(&val_probs, y_val, None);
            let predicted = model::argmax_rows(&val_probs);
            let val_accuracy = metrics::accuracy(y_val, &predicted);
            log::info!(
                "Epoch {}/{} - loss: {:.4} - val_loss: {:.4} - val_accuracy: {:.4} - lr: {:.2e}",
                epoch,
                cfg.epochs,
                train_loss,
                val_loss,
                val_accuracy,
                optimizer.learning_rate
            );
            history.record(EpochRecord {
                epoch,
                train_loss,
                val_loss,
                val_accuracy,
                learning_rate: optimizer.learning_rate,
            });

            if val_loss < best_loss {
                log::debug!("val_loss improved from {:.5} to {:.5}", best_loss, val_loss);
                best_loss = val_loss;
                history.best_epoch = epoch;
                wait = 0;
                if let Some(path) = &checkpoint {
                    net.save(path)?;
                }
                best = Some(net.clone());
            } else {
                wait += 1;
                if wait >= cfg.patience {
                    log::info!("Epoch {}: early stopping", epoch);
                    history.stopped_early = true;
                    break;
                }
            }

            if val_loss < plateau_best - LR_MIN_DELTA {
                plateau_best = val_loss;
                plateau_wait = 0;
            } else {
                plateau_wait += 1;
                if plateau_wait >= cfg.lr_patience {
                    optimizer.learning_rate *= cfg.lr_factor;
                    plateau_wait = 0;
                    log::info!("Epoch {}: reducing learning rate to {:.2e}", epoch, optimizer.learning_rate);
                }
            }
        }

        if let Some(best) = best {
            log::info!("Restoring model weights from epoch {}", history.best_epoch);
            net = best;
        }
        Ok((net, history))
    }
}

/// Re-evaluates a persisted bundle on the test split the trainer would
/// produce from the same corpus and seed, reading columns in the bundle's
/// trained feature order.
pub fn evaluate_bundle(bundle: &ModelArtifactBundle, data_dir: &Path, cfg: &TrainerConfig) -> Result<Evaluation> {
    let columns: Vec<&str> = bundle.scaler.feature_names.iter().map(String::as_str).collect();
    let prepared = prepare_data(data_dir, &columns, cfg, Some(bundle.encoder.clone()))?;
    let (x_test, y_test) = prepared.rows(&prepared.split.test);
    let x_test_s = bundle.scaler.transform(&x_test)?;
    Ok(metrics::evaluate(&bundle.model, &x_test_s, &y_test, bundle.encoder.classes()))
}
