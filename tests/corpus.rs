mod common;

use disease_predictor::config::GeneratorConfig;
use disease_predictor::data;
use disease_predictor::generator::{CorpusGenerator, MIN_POSITIVE};
use disease_predictor::trainer::Trainer;
use disease_predictor::vocab::{DISEASES, SYMPTOMS};
use std::collections::HashMap;
use std::fs;

#[test]
fn every_row_has_two_positives_and_every_class_appears() {
    for seed in [0u64, 1, 123, 9_999] {
        let cfg = GeneratorConfig {
            seed,
            ..GeneratorConfig::default()
        };
        let rows = CorpusGenerator::new(&cfg).generate(200).unwrap();
        assert_eq!(rows.len(), 200);
        let mut per_class: HashMap<&str, usize> = HashMap::new();
        for row in &rows {
            assert_eq!(row.symptoms.len(), SYMPTOMS.len());
            assert!(row.positives() >= MIN_POSITIVE, "seed {seed}: {:?}", row);
            *per_class.entry(row.disease.as_str()).or_default() += 1;
        }
        for disease in DISEASES {
            assert!(per_class.get(disease).copied().unwrap_or(0) >= 1, "seed {seed}: {disease} missing");
        }
    }
}

#[test]
fn written_shards_load_back_in_order() {
    let tmp = tempfile::tempdir().unwrap();
    common::write_corpus(tmp.path(), 5, 64, 3);
    let shards = data::list_shards(tmp.path()).unwrap();
    assert_eq!(shards.len(), 3);
    assert!(shards[0].ends_with("disease_data_64_part1.csv"));

    let corpus = data::load_corpus(tmp.path(), &SYMPTOMS).unwrap();
    assert_eq!(corpus.len(), 192);
    assert_eq!(corpus.features.dim(), (192, SYMPTOMS.len()));
    assert!(corpus.labels.iter().all(|l| DISEASES.contains(&l.as_str())));
}

#[test]
fn same_seed_writes_identical_shards() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    common::write_corpus(a.path(), 11, 96, 2);
    common::write_corpus(b.path(), 11, 96, 2);
    for name in ["disease_data_96_part1.csv", "disease_data_96_part2.csv"] {
        assert_eq!(
            fs::read(a.path().join(name)).unwrap(),
            fs::read(b.path().join(name)).unwrap()
        );
    }
}

#[test]
fn training_aborts_when_a_shard_lacks_a_symptom_column() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = common::prepared_root(tmp.path());

    let columns: Vec<&str> = SYMPTOMS.iter().copied().filter(|s| *s != "fever").collect();
    let mut wtr = csv::Writer::from_path(cfg.data_dir.join("disease_data_2_part9.csv")).unwrap();
    let mut header: Vec<&str> = columns.clone();
    header.push("disease");
    wtr.write_record(&header).unwrap();
    for _ in 0..2 {
        let mut record: Vec<&str> = columns.iter().map(|_| "0").collect();
        record.push("Flu");
        wtr.write_record(&record).unwrap();
    }
    wtr.flush().unwrap();

    let err = Trainer::new(&cfg).run().err().expect("training must fail");
    assert!(err.to_string().contains("fever"), "{err}");
    assert!(!cfg.artifact_dir.join("manifest.json").exists());
}

#[test]
fn training_without_shards_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = common::small_config(tmp.path());
    fs::create_dir_all(&cfg.data_dir).unwrap();
    assert!(Trainer::new(&cfg).run().is_err());
}
