mod common;

use disease_predictor::artifacts::{ModelArtifactBundle, SCALER_FILE};
use disease_predictor::config::SchemaSource;
use disease_predictor::error::PredictorError;
use disease_predictor::service::{InferenceService, LazyInference};
use disease_predictor::trainer::{self, Trainer};
use disease_predictor::vocab::{DISEASES, SYMPTOMS};
use std::fs;
use std::sync::Arc;
use std::thread;

const SELECTION: [&str; 4] = ["fever", "cough", "fatigue", "sore_throat"];

#[test]
fn trained_bundle_serves_predictions() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = common::prepared_root(tmp.path());
    let outcome = Trainer::new(&cfg).run().unwrap();
    assert!(outcome.history.best_epoch >= 1);
    assert!(cfg.artifact_dir.join("manifest.json").exists());
    assert!(cfg.artifact_dir.join("checkpoint.bin").exists());

    let inference = LazyInference::new(cfg);
    assert!(!inference.is_loaded());
    let result = inference.predict(SELECTION).unwrap();
    assert!(inference.is_loaded());

    assert!(DISEASES.contains(&result.predicted.as_str()), "{}", result.predicted);
    assert!((0.0..=1.0).contains(&result.confidence));
    assert!((result.confidence_percent - f64::from(result.confidence) * 100.0).abs() < 0.01);
    assert_eq!(result.alternatives.len(), 3);
    assert_eq!(result.alternatives[0].label, result.predicted);
    assert!(result.alternatives[0].probability >= result.alternatives[1].probability);
    assert_eq!(result.selected_symptoms, SELECTION);
    assert!(result.ignored_symptoms.is_empty());
    assert_eq!(result.symptoms.len(), SYMPTOMS.len());
    assert!(!result.advisory.causes.is_empty());

    let json = serde_json::to_value(&result).unwrap();
    assert!(json["advisory"]["home_remedies"].is_array());
}

#[test]
fn unknown_selections_are_reported_not_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cfg = common::prepared_root(tmp.path());
    Trainer::new(&cfg).run().unwrap();
    cfg.schema.source = SchemaSource::Corpus;

    let service = LazyInference::new(cfg).get().unwrap();
    let result = service.predict_symptoms(["fever", "glowing_skin"]).unwrap();
    assert_eq!(result.ignored_symptoms, vec!["glowing_skin".to_string()]);
    assert!(DISEASES.contains(&result.predicted.as_str()));
}

#[test]
fn invalid_request_never_loads_the_model() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = common::small_config(tmp.path());
    let inference = LazyInference::new(cfg);
    for selection in [vec!["fever"], vec!["fever", " fever "], vec!["a", "b", "c", "d", "e", "f"]] {
        let err = inference.predict(selection).unwrap_err();
        assert!(err.is_validation(), "{err}");
    }
    assert!(!inference.is_loaded());
    let err = inference.predict(["fever", "cough"]).unwrap_err();
    assert!(matches!(err, PredictorError::Artifact(_)), "{err}");
}

#[test]
fn reloaded_bundle_reproduces_test_accuracy() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = common::prepared_root(tmp.path());
    let outcome = Trainer::new(&cfg).run().unwrap();

    let bundle = ModelArtifactBundle::load(&cfg.artifact_dir).unwrap();
    assert_eq!(bundle.manifest.test_accuracy, Some(outcome.test.accuracy));
    let eval = trainer::evaluate_bundle(&bundle, &cfg.data_dir, &cfg.trainer).unwrap();
    assert!((eval.accuracy - outcome.test.accuracy).abs() < 1e-6);
    assert_eq!(eval.confusion, outcome.test.confusion);
}

#[test]
fn same_seeds_train_identical_models() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    let cfg_a = common::prepared_root(a.path());
    let cfg_b = common::prepared_root(b.path());
    let run_a = Trainer::new(&cfg_a).run().unwrap();
    let run_b = Trainer::new(&cfg_b).run().unwrap();

    let losses = |h: &trainer::TrainingHistory| h.epochs.iter().map(|e| e.val_loss).collect::<Vec<_>>();
    assert_eq!(losses(&run_a.history), losses(&run_b.history));
    assert_eq!(run_a.test.accuracy, run_b.test.accuracy);

    let pa = LazyInference::new(cfg_a).predict(SELECTION).unwrap();
    let pb = LazyInference::new(cfg_b).predict(SELECTION).unwrap();
    assert_eq!(pa.predicted, pb.predicted);
    assert_eq!(pa.confidence, pb.confidence);
}

#[test]
fn tampered_artifact_fails_to_load() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = common::prepared_root(tmp.path());
    Trainer::new(&cfg).run().unwrap();

    let path = cfg.artifact_dir.join(SCALER_FILE);
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    fs::write(&path, bytes).unwrap();

    let err = ModelArtifactBundle::load(&cfg.artifact_dir).unwrap_err();
    assert!(matches!(err, PredictorError::Artifact(_)), "{err}");
    assert!(LazyInference::new(cfg).predict(SELECTION).is_err());
}

#[test]
fn concurrent_first_calls_share_one_service() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = common::prepared_root(tmp.path());
    Trainer::new(&cfg).run().unwrap();

    let lazy = LazyInference::new(cfg);
    let shared = &lazy;
    let services: Vec<Arc<InferenceService>> = thread::scope(|s| {
        let handles: Vec<_> = (0..4).map(|_| s.spawn(move || shared.get().unwrap())).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    let stored = lazy.get().unwrap();
    for service in &services {
        assert!(Arc::ptr_eq(service, &stored));
    }

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(move || shared.predict(SELECTION).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn re_evaluation_reads_the_bundled_feature_order() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = common::prepared_root(tmp.path());
    Trainer::new(&cfg).run().unwrap();

    let mut bundle = ModelArtifactBundle::load(&cfg.artifact_dir).unwrap();
    bundle.scaler.feature_names[0] = "glowing_skin".to_string();
    let err = trainer::evaluate_bundle(&bundle, &cfg.data_dir, &cfg.trainer).unwrap_err();
    assert!(err.to_string().contains("glowing_skin"), "{err}");
}
