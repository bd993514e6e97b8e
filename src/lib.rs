//! Symptom-based disease prediction
//! High-level architecture:
//! - Synthetic labelled corpus via per-disease symptom profiles
//! - Feature schema resolution from the bundle or the corpus header
//! - Feed-forward classifier trained on standardized binary features
//! - Lazily loaded inference service with advisory lookup

pub mod advisory;
pub mod artifacts;
pub mod config;
pub mod data;
pub mod error;
pub mod generator;
pub mod metrics;
pub mod model;
pub mod optim;
pub mod preprocessing;
pub mod schema;
pub mod service;
pub mod trainer;
pub mod vocab;

pub use error::{PredictorError, Result};
