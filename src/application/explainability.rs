//! Explainability extractor: model-vote breakdowns and the explanations tree.
//!
//! Every sub-section is decoded on its own. A missing or malformed section is
//! omitted from the report and never fails the extraction as a whole.

use std::collections::{BTreeMap, BTreeSet};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::NormalizerConfig;
use crate::domain::{
    lenient, read_vote, Anomaly, ClassProbabilities, ClassifiedPayload, ElectrodeAnalysis, Explainability,
    ExplainabilityReport, ExplanationMetadata, InfluentialFeature, ModelVotes, ReportTimestamp,
    StatisticalSummary, VoteStage,
};

/// Errors raised while reading an explanations section.
///
/// The normalizer downgrades these to `Explainability::Pending`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExplainabilityError {
    #[error("Explanations section is not an object")]
    Malformed,
}

/// Vote breakdowns of both ensemble stages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoteBreakdown {
    pub binary: Option<ModelVotes>,
    pub classification: Option<ModelVotes>,
    pub anomalies: Vec<Anomaly>,
}

/// Extracts vote breakdowns and explanation reports.
#[derive(Debug, Clone)]
pub struct ExplainabilityExtractor {
    top_features: usize,
    default_method: String,
}

impl Default for ExplainabilityExtractor {
    fn default() -> Self {
        Self::new(&NormalizerConfig::default())
    }
}

impl ExplainabilityExtractor {
    #[must_use]
    pub fn new(config: &NormalizerConfig) -> Self {
        Self {
            top_features: config.top_features,
            default_method: config.default_explanation_method.clone(),
        }
    }

    /// Extract per-model votes from either schema.
    #[must_use]
    pub fn votes(&self, payload: &ClassifiedPayload) -> VoteBreakdown {
        let mut anomalies = Vec::new();

        let (binary, classification) = match payload {
            ClassifiedPayload::Current(p) => {
                let details = p.details.as_ref();
                let binary = details.and_then(|d| d.binary_model_votes.as_ref()).and_then(|b| {
                    b.predictions.as_ref().map(|predictions| {
                        build_votes(
                            VoteStage::Binary,
                            predictions,
                            b.probabilities.as_ref(),
                            None,
                            &mut anomalies,
                        )
                    })
                });
                let classification = details
                    .and_then(|d| d.classification_details.as_ref())
                    .and_then(|c| c.model_votes.as_ref())
                    .and_then(|m| {
                        m.predictions.as_ref().map(|predictions| {
                            build_votes(
                                VoteStage::Classification,
                                predictions,
                                m.probabilities.as_ref(),
                                m.predicted_class,
                                &mut anomalies,
                            )
                        })
                    });
                (binary, classification)
            }
            ClassifiedPayload::Legacy(p) => {
                let details = p.details.as_ref();
                let binary = details.and_then(|d| d.binary_model_votes.as_ref()).map(|votes| {
                    build_votes(VoteStage::Binary, votes, None, None, &mut anomalies)
                });
                let classification = details
                    .and_then(|d| d.classification_details.as_ref())
                    .and_then(|c| c.model_votes.as_ref())
                    .map(|votes| build_votes(VoteStage::Classification, votes, None, None, &mut anomalies));
                (binary, classification)
            }
        };

        VoteBreakdown {
            binary,
            classification,
            anomalies,
        }
    }

    /// Extract the report from an `explanations` section.
    ///
    /// Yields `Explainability::Pending` when clinical insights, influential
    /// features and electrode anomalies are all absent. Whatever else was
    /// reported is kept as the partial report.
    ///
    /// # Errors
    /// Returns `ExplainabilityError::Malformed` if the section is not an object.
    pub fn extract(&self, explanations: &Value) -> Result<Explainability, ExplainabilityError> {
        let section = explanations.as_object().ok_or(ExplainabilityError::Malformed)?;

        let empty = Map::new();
        let insights = section
            .get("summary_insights")
            .and_then(Value::as_object)
            .unwrap_or(&empty);

        let report = ExplainabilityReport {
            clinical_insights: clinical_insights(insights),
            influential_features: self.influential_features(insights),
            electrode_analysis: electrode_analysis(insights),
            statistical_summary: statistical_summary(insights),
            metadata: section
                .get("metadata")
                .and_then(|m| sub_section::<RawMetadata>(m, "metadata"))
                .map(|m| self.metadata(m)),
            binary_decision_factors: factor_list(section, "binary_decision_factors"),
            classification_factors: factor_list(section, "classification_factors"),
            models_agreement: insights.get("models_agreement").filter(|v| !v.is_null()).cloned(),
        };

        if report.has_findings() {
            Ok(Explainability::Available(report))
        } else if report.is_empty() {
            tracing::debug!("Explanations section carries no data");
            Ok(Explainability::pending())
        } else {
            tracing::debug!("Explanations carry no insights, features or electrode anomalies; keeping partial report");
            Ok(Explainability::Pending(Some(report)))
        }
    }

    fn influential_features(&self, insights: &Map<String, Value>) -> Vec<InfluentialFeature> {
        let Some(Value::Array(entries)) = insights.get("most_influential_features") else {
            return Vec::new();
        };

        entries
            .iter()
            .filter_map(|entry| sub_section::<RawFeature>(entry, "most_influential_features[]"))
            .take(self.top_features)
            .map(|f| InfluentialFeature {
                feature: f.feature.unwrap_or_default(),
                electrode: f.electrode.unwrap_or_default(),
                metric: f.metric.unwrap_or_default(),
                status: f.status.unwrap_or_default(),
                value: f.actual_value.filter(|v| v.is_finite()),
                mention_count: f.mentions_across_models.and_then(to_count).map_or(0, saturating_u32),
            })
            .collect()
    }

    fn metadata(&self, raw: RawMetadata) -> ExplanationMetadata {
        let timestamp = raw.explanation_timestamp.map(|ts| {
            let parsed = ReportTimestamp::parse(&ts);
            if !parsed.displayable {
                tracing::warn!("Explanation timestamp is not a valid date; keeping raw value");
            }
            parsed
        });

        ExplanationMetadata {
            method: raw
                .explanation_method
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| self.default_method.clone()),
            timestamp,
            models_explained_count: raw.models_explained.and_then(to_count).map_or(0, saturating_u32),
            interpretation_notes: raw
                .interpretation_notes
                .unwrap_or_default()
                .into_iter()
                .filter_map(|(k, v)| match v {
                    Value::String(s) => Some((k, s)),
                    _ => None,
                })
                .collect(),
        }
    }
}

fn build_votes(
    stage: VoteStage,
    predictions: &BTreeMap<String, Value>,
    probabilities: Option<&BTreeMap<String, Value>>,
    predicted_class: Option<f64>,
    anomalies: &mut Vec<Anomaly>,
) -> ModelVotes {
    let (min, max) = stage.range();
    let mut votes = ModelVotes::new(stage);

    for (model, raw) in predictions {
        let Some(vote) = read_vote(raw) else {
            tracing::warn!("Dropping non-numeric {} vote for model {}", stage, model);
            anomalies.push(Anomaly::VoteNotNumeric {
                stage,
                model: model.clone(),
            });
            continue;
        };
        let clamped = vote.clamp(min, max);
        if clamped != vote {
            anomalies.push(Anomaly::VoteOutOfRange {
                stage,
                model: model.clone(),
                raw: vote,
                clamped,
            });
        }
        votes.votes.insert(model.clone(), clamped);
    }

    if let Some(probabilities) = probabilities {
        votes.probabilities = probabilities
            .iter()
            .filter_map(|(model, v)| {
                serde_json::from_value::<ClassProbabilities>(v.clone())
                    .ok()
                    .map(|p| (model.clone(), p))
            })
            .collect();
    }

    votes.predicted_class = predicted_class
        .filter(|c| c.is_finite())
        .map(|c| (c.round() as i64).clamp(min, max));

    votes
}

fn to_count(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 0.0).then(|| value.round() as u64)
}

fn saturating_u32(n: u64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// An `any[]` section kept verbatim; anything but an array is dropped.
fn factor_list(section: &Map<String, Value>, name: &str) -> Vec<Value> {
    match section.get(name) {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(_) => {
            tracing::debug!("Skipping explanations section {}: not a list", name);
            Vec::new()
        }
    }
}

fn sub_section<T: DeserializeOwned>(value: &Value, name: &str) -> Option<T> {
    if !value.is_object() {
        if !value.is_null() {
            tracing::debug!("Skipping explanations section {}: not an object", name);
        }
        return None;
    }
    match serde_json::from_value::<T>(value.clone()) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!("Skipping malformed explanations section {}: {}", name, e);
            None
        }
    }
}

fn clinical_insights(insights: &Map<String, Value>) -> Vec<String> {
    match insights.get("clinical_insights") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn electrode_analysis(insights: &Map<String, Value>) -> Option<ElectrodeAnalysis> {
    let raw = insights
        .get("electrode_analysis")
        .and_then(|v| sub_section::<RawElectrodeAnalysis>(v, "electrode_analysis"))?;

    let affected_electrodes: BTreeSet<String> = raw
        .electrodes_with_anomalies
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();

    Some(ElectrodeAnalysis {
        affected_count: raw
            .total_electrodes_affected
            .and_then(to_count)
            .map_or_else(|| saturating_u32(affected_electrodes.len() as u64), saturating_u32),
        affected_electrodes,
        anomaly_details: raw.electrode_anomaly_details.unwrap_or_default(),
    })
}

fn statistical_summary(insights: &Map<String, Value>) -> Option<StatisticalSummary> {
    let raw = insights
        .get("statistical_summary")
        .and_then(|v| sub_section::<RawStatisticalSummary>(v, "statistical_summary"))?;

    Some(StatisticalSummary {
        analyzed_count: raw.total_features_analyzed.and_then(to_count),
        high_impact_count: raw.features_with_high_impact.and_then(to_count),
        out_of_range_count: raw.features_outside_normal.and_then(to_count),
        avg_z_score: raw.average_z_score_magnitude.filter(|v| v.is_finite()),
    })
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(default, deserialize_with = "lenient")]
    feature: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    electrode: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    metric: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    status: Option<String>,
    #[serde(default, alias = "value", deserialize_with = "lenient")]
    actual_value: Option<f64>,
    #[serde(default, alias = "mention_count", deserialize_with = "lenient")]
    mentions_across_models: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawElectrodeAnalysis {
    #[serde(default, deserialize_with = "lenient")]
    total_electrodes_affected: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    electrodes_with_anomalies: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "lenient")]
    electrode_anomaly_details: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct RawStatisticalSummary {
    #[serde(default, deserialize_with = "lenient")]
    total_features_analyzed: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    features_with_high_impact: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    features_outside_normal: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    average_z_score_magnitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    #[serde(default, deserialize_with = "lenient")]
    explanation_method: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    explanation_timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    models_explained: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    interpretation_notes: Option<BTreeMap<String, Value>>,
}
