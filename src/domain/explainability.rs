//! Explainability view model.
//!
//! Describes which features and electrodes most influenced a result. This is
//! enrichment: a diagnosis is complete without it.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// State of the explainability section of a diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "report", rename_all = "snake_case")]
pub enum Explainability {
    /// Explanations were computed and extracted
    Available(ExplainabilityReport),
    /// Explanations have not been produced (yet) for this result.
    ///
    /// Secondary sections that were already reported (metadata, statistics,
    /// model factors) are kept in the partial report.
    Pending(Option<ExplainabilityReport>),
    /// The result schema never carries explanations
    Unsupported,
}

impl Explainability {
    /// Pending with nothing reported so far.
    #[must_use]
    pub fn pending() -> Self {
        Self::Pending(None)
    }

    #[must_use]
    pub fn report(&self) -> Option<&ExplainabilityReport> {
        match self {
            Self::Available(report) => Some(report),
            _ => None,
        }
    }

    /// Sections reported while explanations are still pending.
    #[must_use]
    pub fn partial_report(&self) -> Option<&ExplainabilityReport> {
        match self {
            Self::Pending(partial) => partial.as_ref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

/// Extracted explanation data. Missing sub-sections are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExplainabilityReport {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub clinical_insights: Vec<String>,

    /// Top-ranked features in source order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub influential_features: Vec<InfluentialFeature>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub electrode_analysis: Option<ElectrodeAnalysis>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistical_summary: Option<StatisticalSummary>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ExplanationMetadata>,

    /// Per-model binary decision factors, passed through verbatim
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub binary_decision_factors: Vec<Value>,

    /// Per-model severity factors, passed through verbatim
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub classification_factors: Vec<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub models_agreement: Option<Value>,
}

impl ExplainabilityReport {
    /// Whether any of the primary explanation sections carries content.
    #[must_use]
    pub fn has_findings(&self) -> bool {
        !self.clinical_insights.is_empty()
            || !self.influential_features.is_empty()
            || self
                .electrode_analysis
                .as_ref()
                .is_some_and(|e| !e.affected_electrodes.is_empty())
    }

    /// Whether no section at all was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.has_findings()
            && self.electrode_analysis.is_none()
            && self.statistical_summary.is_none()
            && self.metadata.is_none()
            && self.binary_decision_factors.is_empty()
            && self.classification_factors.is_empty()
            && self.models_agreement.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InfluentialFeature {
    pub feature: String,
    pub electrode: String,
    pub metric: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Number of ensemble models that ranked this feature
    pub mention_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ElectrodeAnalysis {
    pub affected_count: u32,
    pub affected_electrodes: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub anomaly_details: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatisticalSummary {
    pub analyzed_count: Option<u64>,
    pub high_impact_count: Option<u64>,
    pub out_of_range_count: Option<u64>,
    pub avg_z_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplanationMetadata {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<ReportTimestamp>,
    pub models_explained_count: u32,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub interpretation_notes: BTreeMap<String, String>,
}

/// Explanation timestamp as reported, with its parsed form when valid.
///
/// Unparseable values are kept verbatim and marked as not displayable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportTimestamp {
    pub raw: String,
    pub parsed: Option<DateTime<Utc>>,
    pub displayable: bool,
}

impl ReportTimestamp {
    /// Parse an RFC 3339 timestamp, a naive ISO-8601 timestamp (read as UTC),
    /// or a bare date.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let parsed = DateTime::parse_from_rfc3339(trimmed)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f"))
                    .ok()
                    .map(|naive| naive.and_utc())
            })
            .or_else(|| {
                NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
                    .map(|naive| naive.and_utc())
            });

        Self {
            raw: raw.to_string(),
            displayable: parsed.is_some(),
            parsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_timestamp_rfc3339() {
        let ts = ReportTimestamp::parse("2025-03-14T09:26:53+02:00");
        assert!(ts.displayable);
        let parsed = ts.parsed.expect("Should parse");
        assert_eq!(parsed.hour(), 7);
    }

    #[test]
    fn test_timestamp_naive_iso() {
        let ts = ReportTimestamp::parse("2025-03-14T09:26:53.123456");
        assert!(ts.displayable);
        assert_eq!(ts.parsed.map(|p| p.day()), Some(14));
    }

    #[test]
    fn test_timestamp_date_only() {
        let ts = ReportTimestamp::parse("2025-03-14");
        assert!(ts.displayable);
        assert_eq!(ts.parsed.map(|p| p.month()), Some(3));
    }

    #[test]
    fn test_invalid_timestamp_kept_raw() {
        let ts = ReportTimestamp::parse("yesterday-ish");
        assert!(!ts.displayable);
        assert!(ts.parsed.is_none());
        assert_eq!(ts.raw, "yesterday-ish");
    }

    #[test]
    fn test_has_findings() {
        let mut report = ExplainabilityReport::default();
        assert!(!report.has_findings());

        report.electrode_analysis = Some(ElectrodeAnalysis::default());
        assert!(!report.has_findings());

        report.clinical_insights.push("Reduced amplitude on C3".to_string());
        assert!(report.has_findings());
    }

    #[test]
    fn test_report_is_empty() {
        let mut report = ExplainabilityReport::default();
        assert!(report.is_empty());

        report.models_agreement = Some(Value::from(0.75));
        assert!(!report.is_empty());
        assert!(!report.has_findings());
    }

    #[test]
    fn test_pending_partial_report() {
        assert!(Explainability::pending().is_pending());
        assert!(Explainability::pending().partial_report().is_none());

        let partial = ExplainabilityReport {
            statistical_summary: Some(StatisticalSummary {
                analyzed_count: Some(40),
                ..StatisticalSummary::default()
            }),
            ..ExplainabilityReport::default()
        };
        let pending = Explainability::Pending(Some(partial));
        assert!(pending.is_pending());
        assert!(pending.report().is_none());
        assert_eq!(
            pending.partial_report().and_then(|r| r.statistical_summary.as_ref()).and_then(|s| s.analyzed_count),
            Some(40)
        );
    }
}
