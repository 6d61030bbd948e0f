//! Domain layer: Core result types and pure interpretation rules.
//!
//! This module contains plain data types with no I/O. Wire payloads are
//! decoded leniently; view-model types are serializable and pre-clamped so a
//! presentation layer can render them without further checks.

mod confidence;
mod diagnosis;
mod explainability;
mod payload;
mod severity;
mod study;
mod votes;

pub use confidence::{ConfidenceBasis, ConfidenceSet};
pub use diagnosis::{
    Anomaly, DiagnosisError, DiagnosisOutcome, DisplayState, ErrorKind, Finding, NormalizedDiagnosis,
};
pub use explainability::{
    ElectrodeAnalysis, Explainability, ExplainabilityReport, ExplanationMetadata, InfluentialFeature,
    ReportTimestamp, StatisticalSummary,
};
pub use payload::{
    ClassifiedPayload, CurrentBinaryVotes, CurrentClassificationDetails, CurrentDetails, CurrentModelVotes,
    CurrentPayload, LegacyClassificationDetails, LegacyDetails, LegacyPayload, ModelsUsed, ProcessMetadata,
    RawResult, SchemaVariant,
};
pub use severity::{ClassificationLevel, Severity, SeverityBucket};
pub use study::{StudyRecord, StudyStatus};
pub use votes::{read_vote, ClassProbabilities, ModelVotes, VoteStage};

pub(crate) use payload::lenient;
