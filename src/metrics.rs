//! Test-set metrics: accuracy, per-class precision/recall/F1 and the
//! confusion matrix.

use ndarray::Array2;
use std::fmt;

use crate::model::{self, DiseaseNet};

/// Counts indexed by `(truth, predicted)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub n_classes: usize,
    counts: Vec<usize>,
}

impl ConfusionMatrix {
    pub fn from_predictions(truth: &[usize], predicted: &[usize], n_classes: usize) -> Self {
        let mut counts = vec![0; n_classes * n_classes];
        for (&t, &p) in truth.iter().zip(predicted) {
            if t < n_classes && p < n_classes {
                counts[t * n_classes + p] += 1;
            }
        }
        Self { n_classes, counts }
    }

    pub fn get(&self, truth: usize, predicted: usize) -> usize {
        self.counts[truth * self.n_classes + predicted]
    }

    fn row_sum(&self, truth: usize) -> usize {
        (0..self.n_classes).map(|p| self.get(truth, p)).sum()
    }

    fn col_sum(&self, predicted: usize) -> usize {
        (0..self.n_classes).map(|t| self.get(t, predicted)).sum()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for truth in 0..self.n_classes {
            let mut row = String::new();
            for pred in 0..self.n_classes {
                row.push_str(&format!("{:5}", self.get(truth, pred)));
            }
            writeln!(f, "{}", row)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassStats {
    pub label: String,
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub classes: Vec<ClassStats>,
    pub accuracy: f32,
    pub macro_f1: f32,
    pub weighted_f1: f32,
}

impl ClassificationReport {
    pub fn from_confusion(cm: &ConfusionMatrix, labels: &[String]) -> Self {
        let total: usize = (0..cm.n_classes).map(|c| cm.row_sum(c)).sum();
        let correct: usize = (0..cm.n_classes).map(|c| cm.get(c, c)).sum();
        let classes: Vec<ClassStats> = (0..cm.n_classes)
            .map(|c| {
                let tp = cm.get(c, c) as f32;
                let predicted = cm.col_sum(c) as f32;
                let support = cm.row_sum(c);
                let precision = if predicted > 0.0 { tp / predicted } else { 0.0 };
                let recall = if support > 0 { tp / support as f32 } else { 0.0 };
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassStats {
                    label: labels.get(c).cloned().unwrap_or_else(|| c.to_string()),
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();
        let macro_f1 = if classes.is_empty() {
            0.0
        } else {
            classes.iter().map(|c| c.f1).sum::<f32>() / classes.len() as f32
        };
        let weighted_f1 = if total == 0 {
            0.0
        } else {
            classes.iter().map(|c| c.f1 * c.support as f32).sum::<f32>() / total as f32
        };
        Self {
            classes,
            accuracy: if total == 0 { 0.0 } else { correct as f32 / total as f32 },
            macro_f1,
            weighted_f1,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<26} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for c in &self.classes {
            writeln!(
                f,
                "{:<26} {:>9.3} {:>9.3} {:>9.3} {:>9}",
                c.label, c.precision, c.recall, c.f1, c.support
            )?;
        }
        let support: usize = self.classes.iter().map(|c| c.support).sum();
        writeln!(f, "{:<26} {:>29.3} {:>9}", "accuracy", self.accuracy, support)?;
        writeln!(f, "{:<26} {:>29.3} {:>9}", "macro avg f1", self.macro_f1, support)?;
        write!(f, "{:<26} {:>29.3} {:>9}", "weighted avg f1", self.weighted_f1, support)
    }
}

pub fn accuracy(truth: &[usize], predicted: &[usize]) -> f32 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    correct as f32 / truth.len() as f32
}

/// Accuracy, loss and reports for one labelled split.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub accuracy: f32,
    pub loss: f32,
    pub report: ClassificationReport,
    pub confusion: ConfusionMatrix,
}

/// Evaluates `net` on already-standardized features.
pub fn evaluate(net: &DiseaseNet, x_scaled: &Array2<f32>, y: &[usize], labels: &[String]) -> Evaluation {
    let probs = net.predict_proba(x_scaled);
    let predicted = model::argmax_rows(&probs);
    let confusion = ConfusionMatrix::from_predictions(y, &predicted, net.n_classes());
    let report = ClassificationReport::from_confusion(&confusion, labels);
    Evaluation {
        accuracy: report.accuracy,
        loss: model::cross_entropy(&probs, y, None),
        report,
        confusion,
    }
}
