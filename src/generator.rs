//! Synthetic corpus generation from the per-disease symptom table.
//!
//! Class sizes come from a Dirichlet draw so that the corpus is naturally
//! imbalanced; each symptom is then sampled independently with a probability
//! that depends on whether it is in the disease's high or mid set.

use rand::prelude::SliceRandom;
use rand::{rngs::StdRng, Rng, SeedableRng};
use ndarray_rand::rand_distr::{Dirichlet, Distribution};

use crate::config::GeneratorConfig;
use crate::error::{PredictorError, Result};
use crate::vocab::{self, DISEASES, SYMPTOMS};

/// Minimum number of positive symptom indicators in any generated row.
pub const MIN_POSITIVE: usize = 2;

/// One synthetic patient case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingRow {
    pub disease: String,
    /// One 0/1 indicator per entry of [`SYMPTOMS`].
    pub symptoms: Vec<u8>,
}

impl TrainingRow {
    pub fn positives(&self) -> usize {
        self.symptoms.iter().filter(|v| **v > 0).count()
    }
}

pub struct CorpusGenerator {
    cfg: GeneratorConfig,
    rng: StdRng,
}

impl CorpusGenerator {
    pub fn new(cfg: &GeneratorConfig) -> Self {
        Self {
            cfg: cfg.clone(),
            rng: StdRng::seed_from_u64(cfg.seed),
        }
    }

    /// Generates `n_rows` shuffled rows covering every disease at least once.
    pub fn generate(&mut self, n_rows: usize) -> Result<Vec<TrainingRow>> {
        if n_rows < DISEASES.len() {
            return Err(PredictorError::Corpus(format!(
                "cannot spread {} rows over {} diseases",
                n_rows,
                DISEASES.len()
            )));
        }
        let dirichlet = Dirichlet::new_with_size(1.0f64, DISEASES.len())
            .map_err(|e| PredictorError::Corpus(format!("dirichlet: {:?}", e)))?;
        let proportions: Vec<f64> = dirichlet.sample(&mut self.rng);
        let counts = allocate_counts(n_rows, &proportions);

        let mut rows = Vec::with_capacity(n_rows);
        for (disease, count) in DISEASES.iter().zip(counts) {
            let profile = vocab::profile(disease).ok_or_else(|| {
                PredictorError::Corpus(format!("no symptom profile for '{}'", disease))
            })?;
            let probs = profile.probabilities(
                self.cfg.high_probability,
                self.cfg.mid_probability,
                self.cfg.base_probability,
            );
            let anchors = profile.anchor_indices();
            for _ in 0..count {
                let mut symptoms: Vec<u8> = probs
                    .iter()
                    .map(|p| u8::from(self.rng.gen::<f64>() < *p))
                    .collect();
                if symptoms.iter().filter(|v| **v > 0).count() < MIN_POSITIVE {
                    for &idx in &anchors {
                        symptoms[idx] = 1;
                    }
                }
                rows.push(TrainingRow {
                    disease: disease.to_string(),
                    symptoms,
                });
            }
        }
        rows.shuffle(&mut self.rng);
        Ok(rows)
    }

    /// Generates `shards` independent row sets from one seeded stream.
    pub fn generate_shards(&mut self, shards: usize, rows_per_shard: usize) -> Result<Vec<Vec<TrainingRow>>> {
        (0..shards).map(|_| self.generate(rows_per_shard)).collect()
    }
}

/// Turns class proportions into per-class row counts summing to `n_rows`.
///
/// Every class receives at least one row. A positive remainder goes to the
/// first class; an overshoot is taken back from the largest classes.
pub fn allocate_counts(n_rows: usize, proportions: &[f64]) -> Vec<usize> {
    let mut counts: Vec<usize> = proportions
        .iter()
        .map(|p| ((n_rows as f64 * p).floor() as usize).max(1))
        .collect();
    let total: usize = counts.iter().sum();
    if total <= n_rows {
        if let Some(first) = counts.first_mut() {
            *first += n_rows - total;
        }
        return counts;
    }
    let mut excess = total - n_rows;
    while excess > 0 {
        let largest = counts
            .iter()
            .enumerate()
            .max_by_key(|(_, c)| **c)
            .map(|(idx, _)| idx);
        match largest {
            Some(idx) if counts[idx] > 1 => {
                counts[idx] -= 1;
                excess -= 1;
            }
            _ => break,
        }
    }
    counts
}

/// CSV header for generated shards: every symptom followed by the label.
pub fn header() -> Vec<&'static str> {
    SYMPTOMS
        .iter()
        .copied()
        .chain(std::iter::once(vocab::LABEL_COLUMN))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(seed: u64) -> GeneratorConfig {
        GeneratorConfig {
            seed,
            ..GeneratorConfig::default()
        }
    }

    #[test]
    fn allocate_counts_sums_to_requested_rows() {
        let props = vec![0.5, 0.3, 0.2];
        let counts = allocate_counts(10, &props);
        assert_eq!(counts.iter().sum::<usize>(), 10);
        assert_eq!(counts, vec![5, 3, 2]);
    }

    #[test]
    fn allocate_counts_keeps_tiny_classes_alive() {
        let props = vec![0.97, 0.01, 0.01, 0.01];
        let counts = allocate_counts(10, &props);
        assert_eq!(counts.iter().sum::<usize>(), 10);
        assert!(counts.iter().all(|c| *c >= 1));
    }

    #[test]
    fn allocate_counts_takes_overshoot_from_largest() {
        let props = vec![0.0, 0.0, 0.0, 1.0];
        let counts = allocate_counts(4, &props);
        assert_eq!(counts, vec![1, 1, 1, 1]);
    }

    #[test]
    fn same_seed_reproduces_rows() {
        let a = CorpusGenerator::new(&small_config(7)).generate(200).unwrap();
        let b = CorpusGenerator::new(&small_config(7)).generate(200).unwrap();
        assert_eq!(a, b);
        let c = CorpusGenerator::new(&small_config(8)).generate(200).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn too_few_rows_is_rejected() {
        let err = CorpusGenerator::new(&small_config(1)).generate(DISEASES.len() - 1);
        assert!(matches!(err, Err(PredictorError::Corpus(_))));
    }

    #[test]
    fn rows_match_vocabulary_width() {
        let rows = CorpusGenerator::new(&small_config(3)).generate(100).unwrap();
        assert_eq!(rows.len(), 100);
        assert!(rows.iter().all(|r| r.symptoms.len() == SYMPTOMS.len()));
        assert_eq!(header().len(), SYMPTOMS.len() + 1);
        assert_eq!(header().last(), Some(&"disease"));
    }
}
