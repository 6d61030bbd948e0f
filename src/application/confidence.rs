//! Confidence aggregator: per-stage ensemble confidences to one percentage.
//!
//! Inputs are clamped before combination (`[0, 1]` for stage confidences and
//! scores, `[0, 100]` for reported percentages). Every clamp is recorded as an
//! anomaly; non-finite inputs count as absent.

use crate::domain::{Anomaly, ClassifiedPayload, ConfidenceSet, CurrentPayload, LegacyPayload};

/// Aggregate the confidences of a classified payload.
#[must_use]
pub fn aggregate(payload: &ClassifiedPayload) -> (ConfidenceSet, Vec<Anomaly>) {
    let mut anomalies = Vec::new();
    let set = match payload {
        ClassifiedPayload::Current(p) => aggregate_current(p, &mut anomalies),
        ClassifiedPayload::Legacy(p) => aggregate_legacy(p, &mut anomalies),
    };
    (set, anomalies)
}

fn aggregate_current(payload: &CurrentPayload, anomalies: &mut Vec<Anomaly>) -> ConfidenceSet {
    let details = payload.details.as_ref();

    let binary = details
        .and_then(|d| d.binary_model_votes.as_ref())
        .and_then(|b| b.ensemble_confidence);
    let classification = details
        .and_then(|d| d.classification_details.as_ref())
        .and_then(|c| c.model_votes.as_ref())
        .and_then(|m| m.ensemble_confidence);

    ConfidenceSet::from_stages(
        clamp_unit("details.binary_model_votes.ensemble_confidence", binary, anomalies),
        clamp_unit(
            "details.classification_details.model_votes.ensemble_confidence",
            classification,
            anomalies,
        ),
    )
}

fn aggregate_legacy(payload: &LegacyPayload, anomalies: &mut Vec<Anomaly>) -> ConfidenceSet {
    let details = payload.details.as_ref();

    let binary = clamp_unit(
        "details.binary_ensemble_confidence",
        details.and_then(|d| d.binary_ensemble_confidence),
        anomalies,
    );
    let classification = clamp_unit(
        "details.classification_details.ensemble_confidence",
        details
            .and_then(|d| d.classification_details.as_ref())
            .and_then(|c| c.ensemble_confidence),
        anomalies,
    );

    if let Some(pct) = clamp_range("confidence_percentage", payload.confidence_percentage, 100.0, anomalies) {
        return ConfidenceSet::from_reported_percentage(pct, binary, classification);
    }
    if let Some(score) = clamp_unit("confidence_score", payload.confidence_score, anomalies) {
        return ConfidenceSet::from_reported_score(score, binary, classification);
    }
    ConfidenceSet::from_stages(binary, classification)
}

fn clamp_unit(field: &str, raw: Option<f64>, anomalies: &mut Vec<Anomaly>) -> Option<f64> {
    clamp_range(field, raw, 1.0, anomalies)
}

fn clamp_range(field: &str, raw: Option<f64>, max: f64, anomalies: &mut Vec<Anomaly>) -> Option<f64> {
    let raw = raw.filter(|v| v.is_finite())?;
    let clamped = raw.clamp(0.0, max);
    if clamped != raw {
        tracing::warn!("Clamped out-of-range confidence {}={} to {}", field, raw, clamped);
        anomalies.push(Anomaly::ConfidenceClamped {
            field: field.to_string(),
            raw,
            clamped,
        });
    }
    Some(clamped)
}
