//! Result normalizer: orchestrates decoding, classification, aggregation and
//! extraction into one `DiagnosisOutcome`.
//!
//! The pipeline is a small state machine:
//!
//! ```text
//! DECODING -> CLASSIFYING -> AGGREGATING -> DONE
//!     |            |
//!     +-> EMPTY    +-> FAILED
//!     +-> FAILED
//! ```
//!
//! Decode and classify failures are terminal. Explainability is enrichment: an
//! extractor failure degrades to `Explainability::Pending` and the pipeline
//! still reaches `DONE`.
//!
//! The normalizer is pure and holds no mutable state, so one instance can be
//! shared across threads.

use serde_json::Value;

use super::classifier;
use super::confidence;
use super::decoder::{self, Decoded};
use super::explainability::ExplainabilityExtractor;
use crate::config::NormalizerConfig;
use crate::domain::{
    Anomaly, ClassificationLevel, ClassifiedPayload, DiagnosisOutcome, Explainability, Finding,
    NormalizedDiagnosis, RawResult, Severity,
};

/// Pipeline states, as reported in trace logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizerState {
    Empty,
    Decoding,
    Classifying,
    Aggregating,
    Done,
    Failed,
}

impl std::fmt::Display for NormalizerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "EMPTY"),
            Self::Decoding => write!(f, "DECODING"),
            Self::Classifying => write!(f, "CLASSIFYING"),
            Self::Aggregating => write!(f, "AGGREGATING"),
            Self::Done => write!(f, "DONE"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// A pipeline step together with the data it works on.
enum Step<'a> {
    Decoding(Option<&'a RawResult>),
    Classifying(Value),
    Aggregating(ClassifiedPayload),
    Finished(DiagnosisOutcome),
}

impl Step<'_> {
    fn state(&self) -> NormalizerState {
        match self {
            Self::Decoding(_) => NormalizerState::Decoding,
            Self::Classifying(_) => NormalizerState::Classifying,
            Self::Aggregating(_) => NormalizerState::Aggregating,
            Self::Finished(DiagnosisOutcome::Empty) => NormalizerState::Empty,
            Self::Finished(DiagnosisOutcome::Done(_)) => NormalizerState::Done,
            Self::Finished(DiagnosisOutcome::Failed(_)) => NormalizerState::Failed,
        }
    }
}

/// Turns raw ML results into render-safe diagnoses.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    extractor: ExplainabilityExtractor,
}

impl Normalizer {
    #[must_use]
    pub fn new(config: &NormalizerConfig) -> Self {
        Self {
            extractor: ExplainabilityExtractor::new(config),
        }
    }

    /// Normalize one raw result.
    ///
    /// Never panics and never returns an error out of band: every failure is
    /// carried by `DiagnosisOutcome::Failed`.
    #[must_use]
    pub fn normalize(&self, raw: Option<&RawResult>) -> DiagnosisOutcome {
        let mut step = Step::Decoding(raw);

        loop {
            tracing::trace!("Normalizer state: {}", step.state());

            step = match step {
                Step::Decoding(raw) => match decoder::decode(raw) {
                    Ok(Decoded::Absent) => Step::Finished(DiagnosisOutcome::Empty),
                    Ok(Decoded::Record(record)) => Step::Classifying(record),
                    Err(e) => Step::Finished(DiagnosisOutcome::Failed(e)),
                },
                Step::Classifying(record) => match classifier::classify(&record) {
                    Ok(payload) => Step::Aggregating(payload),
                    Err(e) => Step::Finished(DiagnosisOutcome::Failed(e)),
                },
                Step::Aggregating(payload) => Step::Finished(DiagnosisOutcome::Done(self.assemble(payload))),
                Step::Finished(outcome) => {
                    if let DiagnosisOutcome::Failed(e) = &outcome {
                        tracing::debug!("Normalization failed: {}", e);
                    }
                    return outcome;
                }
            };
        }
    }

    fn assemble(&self, payload: ClassifiedPayload) -> NormalizedDiagnosis {
        let schema = payload.variant();
        let (confidence, mut anomalies) = confidence::aggregate(&payload);

        let votes = self.extractor.votes(&payload);
        anomalies.extend(votes.anomalies);

        let (level, severity) = resolve_level(raw_level(&payload), &mut anomalies);

        let final_diagnosis = payload.final_diagnosis().unwrap_or_default().trim().to_string();
        let finding = Finding::from_diagnosis(&final_diagnosis);

        let (explainability, was_classified, reported_description, process_metadata) = match payload {
            ClassifiedPayload::Current(p) => {
                let explainability = match p.explanations {
                    None | Some(Value::Null) => Explainability::pending(),
                    Some(ref section) => self.extractor.extract(section).unwrap_or_else(|e| {
                        tracing::warn!("Explainability extraction failed, marking as pending: {}", e);
                        Explainability::pending()
                    }),
                };
                let was_classified = p.details.and_then(|d| d.classification_details).and_then(|c| c.was_classified);
                (explainability, was_classified, None, None)
            }
            ClassifiedPayload::Legacy(p) => (
                Explainability::Unsupported,
                None,
                p.severity_description.filter(|d| !d.trim().is_empty()),
                p.process_metadata,
            ),
        };

        if !anomalies.is_empty() {
            tracing::warn!("Normalized {} result with {} corrected value(s)", schema, anomalies.len());
        }

        NormalizedDiagnosis {
            final_diagnosis,
            finding,
            level,
            severity,
            reported_description,
            schema,
            confidence,
            binary_votes: votes.binary,
            classification_votes: votes.classification,
            was_classified,
            explainability,
            process_metadata,
            anomalies,
        }
    }
}

/// Normalize with the default configuration.
#[must_use]
pub fn normalize(raw: Option<&RawResult>) -> DiagnosisOutcome {
    Normalizer::default().normalize(raw)
}

/// Reported level; CURRENT payloads fall back to `final_level_assigned`.
fn raw_level(payload: &ClassifiedPayload) -> Option<f64> {
    match payload {
        ClassifiedPayload::Legacy(p) => p.classification_level,
        ClassifiedPayload::Current(p) => p.classification_level.or_else(|| {
            p.details
                .as_ref()
                .and_then(|d| d.classification_details.as_ref())
                .and_then(|c| c.final_level_assigned)
        }),
    }
}

/// Clamp the reported level into `0..=3` and map its severity.
///
/// Out-of-range and non-integral levels are clamped/rounded and flagged; their
/// severity is `Unknown` so a corrected value is never shown as a clinical grade.
fn resolve_level(raw: Option<f64>, anomalies: &mut Vec<Anomaly>) -> (ClassificationLevel, Severity) {
    let Some(raw) = raw.filter(|v| v.is_finite()) else {
        anomalies.push(Anomaly::LevelMissing);
        return (ClassificationLevel::NORMAL, Severity::from(ClassificationLevel::NORMAL));
    };

    let rounded = raw.round() as i64;
    let level = ClassificationLevel::clamped(rounded);
    let mut severity = Severity::for_level(rounded);

    if raw.fract() != 0.0 {
        anomalies.push(Anomaly::LevelNotIntegral {
            raw,
            rounded: level.value(),
        });
        severity = Severity::unknown();
    }
    if i64::from(level.value()) != rounded {
        tracing::warn!("Classification level {} out of range, clamped to {}", raw, level);
        anomalies.push(Anomaly::LevelOutOfRange {
            raw,
            clamped: level.value(),
        });
    }

    (level, severity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConfidenceBasis, ErrorKind, SchemaVariant, SeverityBucket};
    use serde_json::json;

    fn done(outcome: DiagnosisOutcome) -> NormalizedDiagnosis {
        match outcome {
            DiagnosisOutcome::Done(d) => d,
            other => panic!("Expected DONE, got {other:?}"),
        }
    }

    #[test]
    fn test_moderate_scenario() {
        let raw = RawResult::from(
            r#"{"final_diagnosis":"Positivo","classification_level":2,"details":{"binary_model_votes":{"ensemble_confidence":0.8},"classification_details":{"model_votes":{"ensemble_confidence":0.6}}}}"#,
        );
        let diagnosis = done(normalize(Some(&raw)));

        assert_eq!(diagnosis.level, ClassificationLevel::MODERATE);
        assert_eq!(diagnosis.confidence.overall, 70);
        assert_eq!(diagnosis.severity.label, "Moderate");
        assert_eq!(diagnosis.severity.bucket, SeverityBucket::Orange);
        assert_eq!(diagnosis.finding, Finding::Positive);
        assert_eq!(diagnosis.schema, SchemaVariant::Current);
        assert!(diagnosis.explainability.is_pending());
    }

    #[test]
    fn test_invalid_text_is_parse_error() {
        for text in ["not valid json", "{not json"] {
            let outcome = normalize(Some(&RawResult::from(text)));
            assert_eq!(outcome.error().map(|e| e.kind), Some(ErrorKind::ParseError));
        }
    }

    #[test]
    fn test_absent_input_is_empty() {
        assert_eq!(normalize(None), DiagnosisOutcome::Empty);
        assert_eq!(normalize(Some(&RawResult::Structured(Value::Null))), DiagnosisOutcome::Empty);
    }

    #[test]
    fn test_empty_record_is_unknown_schema() {
        let outcome = normalize(Some(&RawResult::from("{}")));
        assert_eq!(outcome.error().map(|e| e.kind), Some(ErrorKind::UnknownSchema));
    }

    #[test]
    fn test_current_without_explanations_is_pending() {
        let raw = RawResult::Structured(json!({
            "final_diagnosis": "Negativo",
            "classification_level": 0,
            "details": {"binary_model_votes": {"predictions": {"svm": 0}, "ensemble_confidence": 0.9}}
        }));
        let diagnosis = done(normalize(Some(&raw)));
        assert_eq!(diagnosis.explainability, Explainability::pending());
        assert_eq!(diagnosis.confidence.overall, 90);
        assert_eq!(diagnosis.confidence.basis, ConfidenceBasis::BinaryOnly);
        assert_eq!(diagnosis.finding, Finding::Negative);
    }

    #[test]
    fn test_malformed_explanations_do_not_fail() {
        let raw = RawResult::Structured(json!({
            "final_diagnosis": "Positivo",
            "classification_level": 1,
            "details": {"binary_model_votes": {"predictions": {"svm": 1}}},
            "explanations": "computing"
        }));
        let diagnosis = done(normalize(Some(&raw)));
        assert!(diagnosis.explainability.is_pending());
        assert_eq!(diagnosis.severity.label, "Mild");
    }

    #[test]
    fn test_available_explanations() {
        let raw = RawResult::Structured(json!({
            "final_diagnosis": "Positivo",
            "classification_level": 3,
            "details": {"binary_model_votes": {"predictions": {"svm": 1}}},
            "explanations": {"summary_insights": {"clinical_insights": ["Fibrillation potentials at rest"]}}
        }));
        let diagnosis = done(normalize(Some(&raw)));
        let report = diagnosis.explainability.report().expect("Report should be available");
        assert_eq!(report.clinical_insights.len(), 1);
    }

    #[test]
    fn test_level_always_in_range() {
        for raw_level in [-3.0, -0.4, 0.0, 1.0, 2.5, 3.0, 4.0, 17.0, 1e12] {
            let raw = RawResult::Structured(json!({
                "final_diagnosis": "Positivo",
                "classification_level": raw_level,
                "confidence_percentage": 50
            }));
            let diagnosis = done(normalize(Some(&raw)));
            assert!(diagnosis.level.value() <= 3, "level {raw_level} escaped range");
        }
    }

    #[test]
    fn test_out_of_range_level_is_flagged() {
        let raw = RawResult::Structured(json!({"final_diagnosis": "Positivo", "classification_level": 7,
            "confidence_percentage": 88}));
        let diagnosis = done(normalize(Some(&raw)));

        assert_eq!(diagnosis.level, ClassificationLevel::SEVERE);
        assert_eq!(diagnosis.severity.label, "Unknown");
        assert!(diagnosis.severity.anomalous);
        assert!(diagnosis
            .anomalies
            .iter()
            .any(|a| matches!(a, Anomaly::LevelOutOfRange { clamped: 3, .. })));
        assert!(diagnosis.has_anomalies());
    }

    #[test]
    fn test_missing_level_defaults_to_normal() {
        let raw = RawResult::Structured(json!({"final_diagnosis": "Negativo", "confidence_percentage": 95}));
        let diagnosis = done(normalize(Some(&raw)));
        assert_eq!(diagnosis.level, ClassificationLevel::NORMAL);
        assert_eq!(diagnosis.severity.label, "Normal");
        assert_eq!(diagnosis.anomalies, vec![Anomaly::LevelMissing]);
    }

    #[test]
    fn test_final_level_assigned_fallback() {
        let raw = RawResult::Structured(json!({
            "details": {"classification_details": {
                "was_classified": true,
                "final_level_assigned": 2,
                "model_votes": {"predictions": {"rf": 2}, "ensemble_confidence": 0.74}
            }}
        }));
        let diagnosis = done(normalize(Some(&raw)));
        assert_eq!(diagnosis.level, ClassificationLevel::MODERATE);
        assert_eq!(diagnosis.was_classified, Some(true));
        assert_eq!(diagnosis.confidence.overall, 74);
        assert_eq!(diagnosis.finding, Finding::Indeterminate);
    }

    #[test]
    fn test_legacy_payload() {
        let raw = RawResult::from(
            r#"{"final_diagnosis":"Positivo","classification_level":1,"severity_description":"Leve",
                "confidence_percentage":82,
                "details":{"binary_model_votes":{"svm":1,"random_forest":1,"knn":0},"binary_ensemble_confidence":0.82},
                "process_metadata":{"voting_threshold":"majority"}}"#,
        );
        let diagnosis = done(normalize(Some(&raw)));

        assert_eq!(diagnosis.schema, SchemaVariant::Legacy);
        assert_eq!(diagnosis.confidence.overall, 82);
        assert_eq!(diagnosis.explainability, Explainability::Unsupported);
        assert_eq!(diagnosis.reported_description.as_deref(), Some("Leve"));
        assert_eq!(diagnosis.binary_votes.as_ref().map(|v| v.positive_count()), Some(2));
        assert!(diagnosis.process_metadata.is_some());
    }

    #[test]
    fn test_legacy_string_votes() {
        let raw = RawResult::from(
            r#"{"final_diagnosis":"Positivo","classification_level":1,
                "details":{"binary_model_votes":{"svm":"1","random_forest":"1","knn":"0"}}}"#,
        );
        let diagnosis = done(normalize(Some(&raw)));

        assert_eq!(diagnosis.schema, SchemaVariant::Legacy);
        let votes = diagnosis.binary_votes.as_ref().expect("Votes should be kept");
        assert_eq!(votes.len(), 3);
        assert_eq!(votes.positive_count(), 2);
        assert!(diagnosis.anomalies.is_empty());
    }

    #[test]
    fn test_pending_keeps_metadata() {
        let raw = RawResult::Structured(json!({
            "final_diagnosis": "Positivo",
            "classification_level": 1,
            "details": {"binary_model_votes": {"predictions": {"svm": 1}}},
            "explanations": {
                "summary_insights": {"statistical_summary": {"total_features_analyzed": 40}},
                "metadata": {
                    "explanation_method": "LIME",
                    "explanation_timestamp": "2025-01-02T03:04:05Z",
                    "models_explained": 3
                }
            }
        }));
        let diagnosis = done(normalize(Some(&raw)));

        assert!(diagnosis.explainability.is_pending());
        let partial = diagnosis.explainability.partial_report().expect("Partial report should be kept");
        let meta = partial.metadata.as_ref().expect("Metadata should be present");
        assert_eq!(meta.method, "LIME");
        assert_eq!(meta.models_explained_count, 3);
        assert_eq!(partial.statistical_summary.as_ref().and_then(|s| s.analyzed_count), Some(40));
    }

    #[test]
    fn test_structured_and_text_round_trip() {
        let payloads = [
            json!({"final_diagnosis": "Positivo", "classification_level": 2,
                "details": {"binary_model_votes": {"ensemble_confidence": 0.8},
                    "classification_details": {"model_votes": {"ensemble_confidence": 0.6}}}}),
            json!({"confidence_percentage": 64.5, "details": {"binary_model_votes": {"svm": 1}}}),
            json!({"details": {"binary_model_votes": {"predictions": {"a": 1}, "ensemble_confidence": 0.333}},
                "explanations": {"summary_insights": {"electrode_analysis": {"electrodes_with_anomalies": ["F3"]}},
                    "metadata": {"explanation_timestamp": "2024-11-05T08:00:00Z"}}}),
            json!([1, 2, 3]),
        ];

        let normalizer = Normalizer::default();
        for value in payloads {
            let text = serde_json::to_string(&value).expect("Should serialize");
            assert_eq!(
                normalizer.normalize(Some(&RawResult::Structured(value))),
                normalizer.normalize(Some(&RawResult::Text(text)))
            );
        }
    }

    #[test]
    fn test_normalizer_is_shareable_across_threads() {
        let normalizer = std::sync::Arc::new(Normalizer::default());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let normalizer = std::sync::Arc::clone(&normalizer);
                std::thread::spawn(move || {
                    let raw = RawResult::Structured(json!({"classification_level": i % 4, "confidence_percentage": 60}));
                    normalizer.normalize(Some(&raw))
                })
            })
            .collect();

        for handle in handles {
            let outcome = handle.join().expect("Worker should not panic");
            assert!(outcome.diagnosis().is_some());
        }
    }
}
