use thiserror::Error;

/// Errors surfaced by the prediction library.
///
/// `Validation` is the only variant a web layer should show to an end user;
/// everything else is an operator-visible load or training failure.
#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("{0}")]
    Validation(String),
    #[error("corpus: {0}")]
    Corpus(String),
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("artifact: {0}")]
    Artifact(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Bincode(#[from] bincode::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PredictorError {
    pub fn is_validation(&self) -> bool {
        matches!(self, PredictorError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, PredictorError>;
