//! Symptom schema resolution and feature-width reconciliation.
//!
//! At serving time the ordered feature list is derived from a column source
//! (the order bundled with the scaler, or a corpus shard header) and then
//! reconciled against the width the scaler was fitted on.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::config::MismatchPolicy;
use crate::data;
use crate::error::{PredictorError, Result};
use crate::vocab::LABEL_COLUMN;

/// Ordered, unique feature names; a name's index is its vector position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomSchema {
    names: Vec<String>,
}

/// What reconciliation had to do to reach the expected width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    Unchanged,
    Truncated { dropped: Vec<String> },
    Padded { added: usize },
}

impl SymptomSchema {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Truncates or pads the schema to exactly `expected` names.
    ///
    /// Truncation keeps the leading names; padding appends `feature_<n>`
    /// placeholders whose inputs are always zero.
    pub fn reconcile(&self, expected: usize) -> (SymptomSchema, Reconciliation) {
        if self.names.len() > expected {
            let dropped = self.names[expected..].to_vec();
            let names = self.names[..expected].to_vec();
            (Self { names }, Reconciliation::Truncated { dropped })
        } else if self.names.len() < expected {
            let mut names = self.names.clone();
            let added = expected - names.len();
            while names.len() < expected {
                names.push(placeholder_name(names.len() + 1));
            }
            (Self { names }, Reconciliation::Padded { added })
        } else {
            (self.clone(), Reconciliation::Unchanged)
        }
    }

    /// Binary indicator vector for `selected`, plus the selections the schema
    /// does not know about.
    pub fn encode<S: AsRef<str>>(&self, selected: &[S]) -> (Array1<f32>, Vec<String>) {
        let mut x = Array1::<f32>::zeros(self.names.len());
        let mut ignored = Vec::new();
        for name in selected {
            match self.index_of(name.as_ref()) {
                Some(idx) => x[idx] = 1.0,
                None => ignored.push(name.as_ref().to_string()),
            }
        }
        (x, ignored)
    }
}

/// Names that occur more than once, each reported once in first-seen order.
pub fn duplicate_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut dups: Vec<String> = Vec::new();
    for name in names {
        let name = name.as_ref();
        if !seen.insert(name) && !dups.iter().any(|d| d == name) {
            dups.push(name.to_string());
        }
    }
    dups
}

pub fn placeholder_name(position: usize) -> String {
    format!("feature_{}", position)
}

/// Truncates or zero-pads a feature vector to `expected` entries.
pub fn align_width(x: Array1<f32>, expected: usize) -> Array1<f32> {
    if x.len() == expected {
        return x;
    }
    let mut out = Array1::<f32>::zeros(expected);
    let keep = x.len().min(expected);
    out.slice_mut(ndarray::s![..keep])
        .assign(&x.slice(ndarray::s![..keep]));
    out
}

/// `sore_throat` -> `Sore throat`.
pub fn display_name(symptom: &str) -> String {
    let spaced = symptom.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Where the raw ordered feature names come from.
pub trait ColumnSource: Send + Sync {
    fn read_columns(&self) -> Result<Vec<String>>;
    fn describe(&self) -> String;
}

/// Header of the first corpus shard (in sorted file order), label excluded.
pub struct CorpusHeaderSource {
    data_dir: PathBuf,
}

impl CorpusHeaderSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }
}

impl ColumnSource for CorpusHeaderSource {
    fn read_columns(&self) -> Result<Vec<String>> {
        let shards = data::list_shards(&self.data_dir)?;
        let first = shards.first().ok_or_else(|| {
            PredictorError::Corpus(format!("no CSV shards found in '{}'", self.data_dir.display()))
        })?;
        let header = data::read_header(first)?;
        Ok(header.into_iter().filter(|c| c != LABEL_COLUMN).collect())
    }

    fn describe(&self) -> String {
        format!("corpus header in {}", self.data_dir.display())
    }
}

/// A fixed column list, e.g. the feature order persisted with the scaler.
pub struct FixedColumns(pub Vec<String>);

impl ColumnSource for FixedColumns {
    fn read_columns(&self) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        "bundled training feature order".to_string()
    }
}

/// Memoizing resolver: the column source is read at most once per resolver.
pub struct SchemaResolver {
    source: Box<dyn ColumnSource>,
    policy: MismatchPolicy,
    raw: OnceLock<SymptomSchema>,
}

impl SchemaResolver {
    pub fn new(source: Box<dyn ColumnSource>, policy: MismatchPolicy) -> Self {
        Self {
            source,
            policy,
            raw: OnceLock::new(),
        }
    }

    /// Raw names as read from the source, before reconciliation.
    pub fn raw(&self) -> Result<&SymptomSchema> {
        if let Some(schema) = self.raw.get() {
            return Ok(schema);
        }
        let columns = self.source.read_columns()?;
        let dups = duplicate_names(columns.as_slice());
        if !dups.is_empty() {
            return Err(PredictorError::SchemaMismatch(format!(
                "{} repeats feature names {:?}",
                self.source.describe(),
                dups
            )));
        }
        log::debug!("Read {} feature names from {}", columns.len(), self.source.describe());
        Ok(self.raw.get_or_init(|| SymptomSchema::new(columns)))
    }

    /// Resolves a schema of exactly `expected_width` names.
    ///
    /// `trained` is the feature order the scaler was fitted on; under
    /// [`MismatchPolicy::Fail`] any difference from it is an error.
    pub fn resolve(&self, expected_width: usize, trained: Option<&[String]>) -> Result<SymptomSchema> {
        let raw = self.raw()?;
        match self.policy {
            MismatchPolicy::Fail => {
                if raw.len() != expected_width {
                    return Err(PredictorError::SchemaMismatch(format!(
                        "{} has {} features, scaler expects {}",
                        self.source.describe(),
                        raw.len(),
                        expected_width
                    )));
                }
                if let Some(trained) = trained {
                    if let Some(pos) = raw.names().iter().zip(trained).position(|(a, b)| a != b) {
                        return Err(PredictorError::SchemaMismatch(format!(
                            "feature {} is '{}' in {} but '{}' at training time",
                            pos,
                            raw.names()[pos],
                            self.source.describe(),
                            trained[pos]
                        )));
                    }
                }
                Ok(raw.clone())
            }
            MismatchPolicy::Reconcile => {
                let (schema, action) = raw.reconcile(expected_width);
                match &action {
                    Reconciliation::Truncated { dropped } => log::warn!(
                        "Trimming {} extra symptoms to match model input ({}): {:?}",
                        dropped.len(),
                        expected_width,
                        dropped
                    ),
                    Reconciliation::Padded { added } => log::warn!(
                        "Padding with {} placeholder features to match model input ({})",
                        added,
                        expected_width
                    ),
                    Reconciliation::Unchanged => {}
                }
                Ok(schema)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(names: &[&str]) -> SymptomSchema {
        SymptomSchema::new(names.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn truncation_keeps_prefix() {
        let (s, action) = schema(&["a", "b", "c", "d"]).reconcile(2);
        assert_eq!(s.names(), &["a", "b"]);
        assert_eq!(
            action,
            Reconciliation::Truncated {
                dropped: vec!["c".into(), "d".into()]
            }
        );
    }

    #[test]
    fn padding_appends_placeholders() {
        let (s, action) = schema(&["a", "b"]).reconcile(4);
        assert_eq!(s.names(), &["a", "b", "feature_3", "feature_4"]);
        assert_eq!(action, Reconciliation::Padded { added: 2 });
    }

    #[test]
    fn encode_ignores_unknown_names() {
        let s = schema(&["fever", "cough", "rash"]);
        let (x, ignored) = s.encode(&["rash", "glowing", "fever"]);
        assert_eq!(x.to_vec(), vec![1.0, 0.0, 1.0]);
        assert_eq!(ignored, vec!["glowing".to_string()]);
    }

    #[test]
    fn align_width_truncates_and_pads() {
        let x = Array1::from(vec![1.0, 2.0, 3.0]);
        assert_eq!(align_width(x.clone(), 2).to_vec(), vec![1.0, 2.0]);
        assert_eq!(align_width(x.clone(), 5).to_vec(), vec![1.0, 2.0, 3.0, 0.0, 0.0]);
        assert_eq!(align_width(x, 3).to_vec(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn display_names_are_capitalised() {
        assert_eq!(display_name("sore_throat"), "Sore throat");
        assert_eq!(display_name("loss_of_taste_or_smell"), "Loss of taste or smell");
        assert_eq!(display_name(""), "");
    }

    #[test]
    fn fail_policy_rejects_reordered_columns() {
        let resolver = SchemaResolver::new(
            Box::new(FixedColumns(vec!["cough".into(), "fever".into()])),
            MismatchPolicy::Fail,
        );
        let trained = vec!["fever".to_string(), "cough".to_string()];
        let err = resolver.resolve(2, Some(&trained)).unwrap_err();
        assert!(matches!(err, PredictorError::SchemaMismatch(_)));
    }

    #[test]
    fn duplicate_corpus_columns_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.csv"), "fever,cough,fever,disease\n1,0,0,Flu\n").unwrap();
        let resolver = SchemaResolver::new(
            Box::new(CorpusHeaderSource::new(tmp.path())),
            MismatchPolicy::Reconcile,
        );
        let err = resolver.resolve(3, None).unwrap_err();
        assert!(matches!(err, PredictorError::SchemaMismatch(_)), "{err}");
        assert!(err.to_string().contains("fever"), "{err}");
    }

    #[test]
    fn duplicate_fixed_columns_are_rejected() {
        let resolver = SchemaResolver::new(
            Box::new(FixedColumns(vec!["fever".into(), "cough".into(), "fever".into()])),
            MismatchPolicy::Fail,
        );
        assert!(matches!(resolver.raw(), Err(PredictorError::SchemaMismatch(_))));
    }

    #[test]
    fn duplicate_names_reports_each_once() {
        assert_eq!(duplicate_names(&["a", "b", "a", "a", "b", "c"]), vec!["a", "b"]);
        assert!(duplicate_names(&["a", "b"]).is_empty());
    }

    #[test]
    fn fail_policy_rejects_width_mismatch() {
        let resolver = SchemaResolver::new(
            Box::new(FixedColumns(vec!["fever".into()])),
            MismatchPolicy::Fail,
        );
        assert!(resolver.resolve(2, None).is_err());
    }
}
