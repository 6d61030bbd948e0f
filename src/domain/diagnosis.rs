//! Normalized diagnosis view model and its error values.
//!
//! Represents the render-safe interpretation of one ML study result.

use serde::Serialize;

use super::{
    ClassificationLevel, ConfidenceSet, Explainability, ModelVotes, ProcessMetadata, SchemaVariant, Severity,
    VoteStage,
};

/// Clinical reading of the free-text `final_diagnosis`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Finding {
    Positive,
    Negative,
    /// Diagnosis text missing or not recognized
    Indeterminate,
}

impl Finding {
    /// Classify a diagnosis text (Spanish or English, case-insensitive).
    #[must_use]
    pub fn from_diagnosis(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("positivo") || lower.contains("positive") {
            Self::Positive
        } else if lower.contains("negativo") || lower.contains("negative") {
            Self::Negative
        } else {
            Self::Indeterminate
        }
    }
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Positive => write!(f, "POSITIVE"),
            Self::Negative => write!(f, "NEGATIVE"),
            Self::Indeterminate => write!(f, "INDETERMINATE"),
        }
    }
}

/// A value that had to be corrected during normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// No classification level was reported; defaulted to 0
    LevelMissing,
    LevelOutOfRange { raw: f64, clamped: u8 },
    LevelNotIntegral { raw: f64, rounded: u8 },
    ConfidenceClamped { field: String, raw: f64, clamped: f64 },
    VoteOutOfRange { stage: VoteStage, model: String, raw: i64, clamped: i64 },
    /// A vote that is not a number was dropped
    VoteNotNumeric { stage: VoteStage, model: String },
}

/// Interpreted ML result, ready to hand to a renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedDiagnosis {
    pub final_diagnosis: String,
    pub finding: Finding,
    pub level: ClassificationLevel,
    pub severity: Severity,
    /// Description text shipped by the payload, when it carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_description: Option<String>,
    pub schema: SchemaVariant,
    pub confidence: ConfidenceSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_votes: Option<ModelVotes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification_votes: Option<ModelVotes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub was_classified: Option<bool>,
    pub explainability: Explainability,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_metadata: Option<ProcessMetadata>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub anomalies: Vec<Anomaly>,
}

impl NormalizedDiagnosis {
    /// Whether any input value had to be corrected.
    #[must_use]
    pub fn has_anomalies(&self) -> bool {
        !self.anomalies.is_empty() || self.severity.anomalous
    }
}

/// Failure category of a normalization call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Text payload is not valid JSON
    ParseError,
    /// No payload yet (study still processing)
    Empty,
    /// Payload present but carries no recognizable fields
    UnknownSchema,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ParseError => write!(f, "PARSE_ERROR"),
            Self::Empty => write!(f, "EMPTY"),
            Self::UnknownSchema => write!(f, "UNKNOWN_SCHEMA"),
        }
    }
}

/// Error value returned (never raised) by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct DiagnosisError {
    pub kind: ErrorKind,
    pub message: String,
}

impl DiagnosisError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::ParseError,
            message: message.into(),
        }
    }

    pub fn empty() -> Self {
        Self {
            kind: ErrorKind::Empty,
            message: "No result available yet".to_string(),
        }
    }

    pub fn unknown_schema(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::UnknownSchema,
            message: message.into(),
        }
    }
}

/// How a presentation layer must show an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayState {
    /// Result not produced yet
    Processing,
    /// A diagnosis is available
    Interpreted,
    /// A result exists but could not be interpreted; never a clinical negative
    Uninterpretable,
}

/// Terminal result of normalizing one payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "result", rename_all = "snake_case")]
pub enum DiagnosisOutcome {
    /// No payload yet; not a failure
    Empty,
    Done(NormalizedDiagnosis),
    Failed(DiagnosisError),
}

impl DiagnosisOutcome {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    #[must_use]
    pub fn diagnosis(&self) -> Option<&NormalizedDiagnosis> {
        match self {
            Self::Done(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&DiagnosisError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Error view of the outcome: `Empty` maps to an `EMPTY` error value.
    ///
    /// # Errors
    /// Returns the `DiagnosisError` when no diagnosis is available.
    pub fn into_result(self) -> Result<NormalizedDiagnosis, DiagnosisError> {
        match self {
            Self::Done(d) => Ok(d),
            Self::Failed(e) => Err(e),
            Self::Empty => Err(DiagnosisError::empty()),
        }
    }

    #[must_use]
    pub fn display_state(&self) -> DisplayState {
        match self {
            Self::Empty => DisplayState::Processing,
            Self::Done(_) => DisplayState::Interpreted,
            Self::Failed(_) => DisplayState::Uninterpretable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finding_from_diagnosis() {
        assert_eq!(Finding::from_diagnosis("Positivo"), Finding::Positive);
        assert_eq!(Finding::from_diagnosis("Resultado NEGATIVO"), Finding::Negative);
        assert_eq!(Finding::from_diagnosis("negative"), Finding::Negative);
        assert_eq!(Finding::from_diagnosis(""), Finding::Indeterminate);
        assert_eq!(Finding::from_diagnosis("Inconcluso"), Finding::Indeterminate);
    }

    #[test]
    fn test_error_display() {
        let err = DiagnosisError::parse("expected value at line 1 column 1");
        assert_eq!(err.to_string(), "PARSE_ERROR: expected value at line 1 column 1");
        assert_eq!(DiagnosisError::empty().kind, ErrorKind::Empty);
    }

    #[test]
    fn test_display_states() {
        assert_eq!(DiagnosisOutcome::Empty.display_state(), DisplayState::Processing);
        let failed = DiagnosisOutcome::Failed(DiagnosisError::unknown_schema("empty record"));
        assert_eq!(failed.display_state(), DisplayState::Uninterpretable);
        assert!(failed.diagnosis().is_none());
        assert_eq!(
            failed.into_result().map_err(|e| e.kind),
            Err(ErrorKind::UnknownSchema)
        );
        assert_eq!(
            DiagnosisOutcome::Empty.into_result().map_err(|e| e.kind),
            Err(ErrorKind::Empty)
        );
    }

    #[test]
    fn test_outcome_serialization_tags() {
        let json = serde_json::to_value(DiagnosisOutcome::Failed(DiagnosisError::parse("bad")))
            .expect("Should serialize");
        assert_eq!(json["state"], "failed");
        assert_eq!(json["result"]["kind"], "PARSE_ERROR");

        let empty = serde_json::to_value(DiagnosisOutcome::Empty).expect("Should serialize");
        assert_eq!(empty["state"], "empty");
    }
}
