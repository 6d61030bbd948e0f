//! # myodiag
//!
//! Normalization and interpretation of EMG diagnostic results.
//!
//! The diagnostic portal stores each study's ML output as loosely-typed JSON
//! that has drifted across pipeline releases. This crate turns that payload
//! into one render-safe `NormalizedDiagnosis` (or an explicit error value):
//! - decoding of text or pre-parsed results, isolating parse failures
//! - LEGACY (flat) and CURRENT (nested) schema detection
//! - confidence aggregation, severity mapping and explainability extraction
//! - cached batch normalization and dashboard statistics over study records
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core result types and interpretation rules
//! - `ports`: Trait definitions for external operations
//! - `adapters`: Concrete implementations (export file, memory cache, log sanitizer)
//! - `application`: The normalization pipeline and study services
//! - `config`: Environment-driven settings

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{normalize, Normalizer, StudyResultService, StudyStatistics};
pub use config::NormalizerConfig;
pub use domain::{DiagnosisError, DiagnosisOutcome, NormalizedDiagnosis, RawResult, Severity};

/// Result type for myodiag operations
pub type Result<T> = std::result::Result<T, MyodiagError>;

/// Main error type for myodiag.
///
/// Diagnosis failures are not errors here: they are values inside
/// `DiagnosisOutcome`. This type covers the host side (I/O, sources).
#[derive(Debug, thiserror::Error)]
pub enum MyodiagError {
    #[error("Study source failed: {0}")]
    Source(#[from] adapters::SourceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    Validation(String),
}
