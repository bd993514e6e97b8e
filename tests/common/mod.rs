#![allow(dead_code)]

use disease_predictor::config::{GeneratorConfig, PredictorConfig};
use disease_predictor::data;
use disease_predictor::generator::CorpusGenerator;
use std::path::Path;

/// Writes `shards` generated shards of `rows` rows into `dir`.
pub fn write_corpus(dir: &Path, seed: u64, rows: usize, shards: usize) {
    let cfg = GeneratorConfig {
        seed,
        ..GeneratorConfig::default()
    };
    let mut generator = CorpusGenerator::new(&cfg);
    for (idx, shard) in generator.generate_shards(shards, rows).unwrap().iter().enumerate() {
        data::write_shard(&dir.join(data::shard_file_name(rows, idx + 1)), shard).unwrap();
    }
}

/// A config small enough to train in a test run.
pub fn small_config(root: &Path) -> PredictorConfig {
    let mut cfg = PredictorConfig {
        data_dir: root.join("data"),
        artifact_dir: root.join("artifacts"),
        ..PredictorConfig::default()
    };
    cfg.trainer.hidden_units = vec![32, 16];
    cfg.trainer.epochs = 6;
    cfg.trainer.batch_size = 32;
    cfg.trainer.dropout = 0.2;
    cfg
}

/// Generates a corpus under `root/data` and returns a matching config.
pub fn prepared_root(root: &Path) -> PredictorConfig {
    let cfg = small_config(root);
    write_corpus(&cfg.data_dir, 7, 480, 2);
    cfg
}
