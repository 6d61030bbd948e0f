//! Aggregated ensemble confidence.

use serde::{Deserialize, Serialize};

/// Which rule produced the overall percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBasis {
    /// Mean of binary and classification stages
    BothStages,
    BinaryOnly,
    ClassificationOnly,
    /// 0-100 percentage reported by the payload itself
    ReportedPercentage,
    /// 0-1 score reported by the payload itself
    ReportedScore,
    /// No confidence information at all
    Unavailable,
}

/// Stage confidences plus the combined percentage.
///
/// `binary` and `classification` are in `[0, 1]` (absent stages report `0.0`);
/// `overall` is an integer percentage in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceSet {
    pub binary: f64,
    pub classification: f64,
    pub overall: u8,
    pub basis: ConfidenceBasis,
}

impl ConfidenceSet {
    /// Combine stage confidences (already clamped to `[0, 1]`).
    #[must_use]
    pub fn from_stages(binary: Option<f64>, classification: Option<f64>) -> Self {
        let (overall, basis) = match (binary, classification) {
            (Some(b), Some(c)) => (unit_to_percent((b + c) / 2.0), ConfidenceBasis::BothStages),
            (Some(b), None) => (unit_to_percent(b), ConfidenceBasis::BinaryOnly),
            (None, Some(c)) => (unit_to_percent(c), ConfidenceBasis::ClassificationOnly),
            (None, None) => (0, ConfidenceBasis::Unavailable),
        };

        Self {
            binary: binary.unwrap_or(0.0),
            classification: classification.unwrap_or(0.0),
            overall,
            basis,
        }
    }

    /// Use a percentage reported by the payload (already clamped to `[0, 100]`).
    #[must_use]
    pub fn from_reported_percentage(percentage: f64, binary: Option<f64>, classification: Option<f64>) -> Self {
        Self {
            binary: binary.unwrap_or(0.0),
            classification: classification.unwrap_or(0.0),
            overall: percentage.clamp(0.0, 100.0).round() as u8,
            basis: ConfidenceBasis::ReportedPercentage,
        }
    }

    /// Use a 0-1 score reported by the payload (already clamped to `[0, 1]`).
    #[must_use]
    pub fn from_reported_score(score: f64, binary: Option<f64>, classification: Option<f64>) -> Self {
        Self {
            binary: binary.unwrap_or(0.0),
            classification: classification.unwrap_or(0.0),
            overall: unit_to_percent(score),
            basis: ConfidenceBasis::ReportedScore,
        }
    }

}

fn unit_to_percent(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 100.0).round() as u8
}
