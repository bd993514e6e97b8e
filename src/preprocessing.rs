use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::prelude::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{PredictorError, Result};

/// Per-feature standardization fitted on the training split.
///
/// The fitted feature order is stored alongside the statistics so that the
/// serving side can rebuild the exact training schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub feature_names: Vec<String>,
    pub mean: Array1<f32>,
    /// Standard deviation per feature; constant features use 1.
    pub scale: Array1<f32>,
}

impl StandardScaler {
    pub fn fit(x: ArrayView2<f32>, feature_names: Vec<String>) -> Result<Self> {
        if feature_names.len() != x.ncols() {
            return Err(PredictorError::Corpus(format!(
                "{} feature names for {} columns",
                feature_names.len(),
                x.ncols()
            )));
        }
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| PredictorError::Corpus("cannot fit scaler on zero rows".into()))?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f32::EPSILON { s } else { 1.0 });
        Ok(Self {
            feature_names,
            mean,
            scale,
        })
    }

    pub fn n_features_in(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.n_features_in() {
            return Err(PredictorError::SchemaMismatch(format!(
                "scaler expects {} features, got {}",
                self.n_features_in(),
                x.ncols()
            )));
        }
        Ok((x - &self.mean) / &self.scale)
    }
}

/// Sorted class labels; a label's position is its class index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit(labels: &[String]) -> Self {
        let classes: BTreeSet<&String> = labels.iter().collect();
        Self {
            classes: classes.into_iter().cloned().collect(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn encode(&self, label: &str) -> Option<usize> {
        self.classes.binary_search_by(|c| c.as_str().cmp(label)).ok()
    }

    pub fn transform(&self, labels: &[String]) -> Result<Vec<usize>> {
        labels
            .iter()
            .map(|l| {
                self.encode(l)
                    .ok_or_else(|| PredictorError::Corpus(format!("unseen label '{}'", l)))
            })
            .collect()
    }

    pub fn decode(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }
}

/// Row indices of a three-way split.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
    pub test: Vec<usize>,
}

/// Stratified train/validation/test split of row indices.
///
/// Each class is shuffled and cut by the requested fractions, so every split
/// keeps the class proportions. A class with at least three rows puts at
/// least one row in each of validation and test.
pub fn stratified_split<R: Rng>(
    labels: &[usize],
    n_classes: usize,
    test_fraction: f64,
    validation_fraction: f64,
    rng: &mut R,
) -> Split {
    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (row, &class) in labels.iter().enumerate() {
        if class < n_classes {
            by_class[class].push(row);
        }
    }

    let mut split = Split::default();
    for mut rows in by_class {
        rows.shuffle(rng);
        let n = rows.len();
        let mut n_test = (n as f64 * test_fraction).round() as usize;
        let mut n_val = (n as f64 * validation_fraction).round() as usize;
        if n >= 3 {
            n_test = n_test.max(1);
            n_val = n_val.max(1);
        }
        while n > 0 && n_test + n_val >= n {
            if n_val >= n_test && n_val > 0 {
                n_val -= 1;
            } else if n_test > 0 {
                n_test -= 1;
            } else {
                break;
            }
        }
        split.test.extend_from_slice(&rows[..n_test]);
        split.validation.extend_from_slice(&rows[n_test..n_test + n_val]);
        split.train.extend_from_slice(&rows[n_test + n_val..]);
    }
    split.train.shuffle(rng);
    split.validation.shuffle(rng);
    split.test.shuffle(rng);
    split
}

/// "Balanced" class weights: `n_samples / (n_present_classes * count_c)`.
///
/// Classes absent from `labels` get weight 1.
pub fn balanced_class_weights(labels: &[usize], n_classes: usize) -> Vec<f32> {
    let mut counts = vec![0usize; n_classes];
    for &l in labels {
        if l < n_classes {
            counts[l] += 1;
        }
    }
    let present = counts.iter().filter(|c| **c > 0).count().max(1);
    let total = labels.len() as f32;
    counts
        .iter()
        .map(|&c| {
            if c == 0 {
                1.0
            } else {
                total / (present as f32 * c as f32)
            }
        })
        .collect()
}

pub fn select_rows(x: &Array2<f32>, rows: &[usize]) -> Array2<f32> {
    x.select(Axis(0), rows)
}

pub fn select_labels(y: &[usize], rows: &[usize]) -> Vec<usize> {
    rows.iter().map(|&r| y[r]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn scaler_standardizes_columns() {
        let x = array![[0.0f32, 1.0], [2.0, 1.0], [4.0, 1.0]];
        let scaler = StandardScaler::fit(x.view(), vec!["a".into(), "b".into()]).unwrap();
        assert!((scaler.mean[0] - 2.0).abs() < 1e-6);
        // constant column keeps unit scale
        assert_eq!(scaler.scale[1], 1.0);
        let z = scaler.transform(&x).unwrap();
        assert!(z.column(0).sum().abs() < 1e-5);
        assert_eq!(z.column(1).to_vec(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn scaler_rejects_wrong_width() {
        let x = array![[0.0f32, 1.0], [2.0, 1.0]];
        let scaler = StandardScaler::fit(x.view(), vec!["a".into(), "b".into()]).unwrap();
        assert!(scaler.transform(&array![[1.0f32]]).is_err());
    }

    #[test]
    fn label_encoder_sorts_classes() {
        let labels: Vec<String> = ["Flu", "Allergy", "Flu", "COVID-19"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let le = LabelEncoder::fit(&labels);
        assert_eq!(le.classes(), &["Allergy", "COVID-19", "Flu"]);
        assert_eq!(le.transform(&labels).unwrap(), vec![2, 0, 2, 1]);
        assert_eq!(le.decode(1), Some("COVID-19"));
        assert_eq!(le.decode(9), None);
        assert!(le.encode("Measles").is_none());
    }

    #[test]
    fn split_preserves_every_class() {
        let mut labels = Vec::new();
        for class in 0..4 {
            labels.extend(std::iter::repeat(class).take(10 + class * 10));
        }
        let mut rng = StdRng::seed_from_u64(1);
        let split = stratified_split(&labels, 4, 0.1, 0.1, &mut rng);
        assert_eq!(
            split.train.len() + split.validation.len() + split.test.len(),
            labels.len()
        );
        for class in 0..4 {
            for part in [&split.train, &split.validation, &split.test] {
                assert!(part.iter().any(|&r| labels[r] == class));
            }
        }
    }

    #[test]
    fn split_keeps_tiny_classes_in_train() {
        let labels = vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        let mut rng = StdRng::seed_from_u64(3);
        let split = stratified_split(&labels, 2, 0.1, 0.1, &mut rng);
        assert!(split.train.contains(&10));
    }

    #[test]
    fn split_is_seeded() {
        let labels: Vec<usize> = (0..60).map(|i| i % 3).collect();
        let a = stratified_split(&labels, 3, 0.1, 0.1, &mut StdRng::seed_from_u64(5));
        let b = stratified_split(&labels, 3, 0.1, 0.1, &mut StdRng::seed_from_u64(5));
        assert_eq!(a, b);
    }

    #[test]
    fn balanced_weights_are_inverse_frequency() {
        let labels = vec![0, 0, 0, 1];
        let w = balanced_class_weights(&labels, 3);
        assert!((w[0] - 4.0 / 6.0).abs() < 1e-6);
        assert!((w[1] - 2.0).abs() < 1e-6);
        assert_eq!(w[2], 1.0);
    }
}
