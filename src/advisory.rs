use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{PredictorError, Result};

pub const UNKNOWN_LABEL: &str = "Unknown";

const BUILTIN_ADVISORIES: &str = include_str!("../assets/advisories.toml");

/// Static reference text shown next to a predicted disease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryRecord {
    pub causes: Vec<String>,
    pub prevention: Vec<String>,
    pub dos: Vec<String>,
    pub donts: Vec<String>,
    pub home_remedies: Vec<String>,
}

/// Advisory records keyed by disease label, always holding an
/// [`UNKNOWN_LABEL`] fallback.
#[derive(Debug, Clone)]
pub struct AdvisoryCatalogue {
    records: HashMap<String, AdvisoryRecord>,
    fallback: AdvisoryRecord,
}

impl AdvisoryCatalogue {
    pub fn builtin() -> Result<Self> {
        Self::from_toml(BUILTIN_ADVISORIES)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let records: HashMap<String, AdvisoryRecord> = toml::from_str(content)
            .map_err(|e| PredictorError::Artifact(format!("advisory table: {}", e)))?;
        let fallback = records.get(UNKNOWN_LABEL).cloned().ok_or_else(|| {
            PredictorError::Artifact(format!(
                "advisory table has no '{}' fallback record",
                UNKNOWN_LABEL
            ))
        })?;
        Ok(Self { records, fallback })
    }

    pub fn get(&self, label: &str) -> Option<&AdvisoryRecord> {
        self.records.get(label)
    }

    /// The record for `label`, or the fallback record when none exists.
    pub fn lookup(&self, label: &str) -> &AdvisoryRecord {
        self.records.get(label).unwrap_or(&self.fallback)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
