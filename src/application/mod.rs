//! Application layer: Use cases and services.
//!
//! The result pipeline runs leaf to root:
//! `decoder` -> `classifier` -> {`confidence`, `explainability`} -> `normalizer`.
//! `service` drives the normalizer over study records from a port.

pub mod classifier;
pub mod confidence;
pub mod decoder;
pub mod explainability;
pub mod normalizer;
pub mod statistics;

mod service;

pub use explainability::{ExplainabilityError, ExplainabilityExtractor, VoteBreakdown};
pub use normalizer::{normalize, Normalizer, NormalizerState};
pub use service::{cache_key, summarize, StudyResult, StudyResultService};
pub use statistics::StudyStatistics;
