//! CSV corpus shards: writing generated rows, listing and loading shards.

use csv::{Reader, Writer};
use ndarray::Array2;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PredictorError, Result};
use crate::generator::{self, TrainingRow};
use crate::schema;
use crate::vocab::LABEL_COLUMN;

/// Concatenated training corpus restricted to an expected column order.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub columns: Vec<String>,
    /// One row per case, one 0/1 column per entry of `columns`.
    pub features: Array2<f32>,
    pub labels: Vec<String>,
}

impl Corpus {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

pub fn shard_file_name(rows: usize, part: usize) -> String {
    format!("disease_data_{}_part{}.csv", rows, part)
}

pub fn write_shard(path: &Path, rows: &[TrainingRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut wtr = Writer::from_path(path)?;
    wtr.write_record(generator::header())?;
    for row in rows {
        let mut record: Vec<String> = row.symptoms.iter().map(|v| v.to_string()).collect();
        record.push(row.disease.clone());
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// All `*.csv` files in `dir`, sorted by file name.
pub fn list_shards(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(PredictorError::Corpus(format!(
            "corpus directory '{}' does not exist",
            dir.display()
        )));
    }
    let mut shards: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |ext| ext == "csv") {
            shards.push(path);
        }
    }
    shards.sort();
    if shards.is_empty() {
        return Err(PredictorError::Corpus(format!(
            "no CSV shards found in '{}'",
            dir.display()
        )));
    }
    Ok(shards)
}

pub fn read_header(path: &Path) -> Result<Vec<String>> {
    let mut rdr = Reader::from_path(path)?;
    Ok(rdr.headers()?.iter().map(|h| h.trim().to_string()).collect())
}

/// Loads and concatenates every shard in `dir`.
///
/// Each shard must carry all of `expected` plus the label column; a shard
/// missing any of them aborts the load with the missing names.
pub fn load_corpus(dir: &Path, expected: &[&str]) -> Result<Corpus> {
    let shards = list_shards(dir)?;
    let mut values: Vec<f32> = Vec::new();
    let mut labels: Vec<String> = Vec::new();

    for shard in &shards {
        let before = labels.len();
        read_shard(shard, expected, &mut values, &mut labels)?;
        log::info!("Loaded {} rows from {}", labels.len() - before, shard.display());
    }
    log::info!("Total rows after concat: {}", labels.len());

    let features = Array2::from_shape_vec((labels.len(), expected.len()), values)
        .map_err(|e| PredictorError::Corpus(e.to_string()))?;
    Ok(Corpus {
        columns: expected.iter().map(|c| c.to_string()).collect(),
        features,
        labels,
    })
}

fn read_shard(
    path: &Path,
    expected: &[&str],
    values: &mut Vec<f32>,
    labels: &mut Vec<String>,
) -> Result<()> {
    let mut rdr = Reader::from_path(path)?;
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let dups = schema::duplicate_names(headers.as_slice());
    if !dups.is_empty() {
        return Err(PredictorError::Corpus(format!(
            "duplicate columns in {}: {:?}",
            path.display(),
            dups
        )));
    }
    let position = |name: &str| headers.iter().position(|h| h == name);

    let missing: Vec<&str> = expected
        .iter()
        .copied()
        .filter(|c| position(c).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(PredictorError::Corpus(format!(
            "missing symptom columns in {}: {:?}",
            path.display(),
            missing
        )));
    }
    let label_idx = position(LABEL_COLUMN).ok_or_else(|| {
        PredictorError::Corpus(format!(
            "{} must contain a '{}' column as the target label",
            path.display(),
            LABEL_COLUMN
        ))
    })?;
    let feature_idx: Vec<usize> = expected.iter().filter_map(|c| position(c)).collect();

    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        for &idx in &feature_idx {
            let cell = record.get(idx).unwrap_or("").trim();
            let value: f32 = cell.parse().map_err(|_| {
                PredictorError::Corpus(format!(
                    "{} row {}: column '{}' has non-numeric value '{}'",
                    path.display(),
                    line + 1,
                    headers[idx],
                    cell
                ))
            })?;
            values.push(value);
        }
        labels.push(record.get(label_idx).unwrap_or("").trim().to_string());
    }
    Ok(())
}
