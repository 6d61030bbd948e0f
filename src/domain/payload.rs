//! Wire payload types for ML study results.
//!
//! The ML pipeline has shipped two result shapes over time:
//! - LEGACY: flat fields (`confidence_percentage`, plain vote mappings)
//! - CURRENT: nested vote sections with probabilities and an `explanations` tree
//!
//! Every field is optional and decoded leniently: a field with the wrong JSON
//! type is treated as absent rather than failing the whole payload.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Raw `ml_results` value as handed over by the backend.
///
/// The backend stores results either as a JSON string or as an embedded JSON
/// object. A `null` column deserializes to `None` at the `Option<RawResult>` level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawResult {
    /// UTF-8 JSON text, not yet decoded
    Text(String),
    /// Already-parsed JSON
    Structured(Value),
}

impl From<&str> for RawResult {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for RawResult {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Value> for RawResult {
    fn from(value: Value) -> Self {
        Self::Structured(value)
    }
}

/// Known result-schema shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVariant {
    /// Flat fields, 0-100 percentage, plain vote mappings
    Legacy,
    /// Nested vote sections, 0-1 ensemble confidences, optional explanations
    Current,
}

impl std::fmt::Display for SchemaVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Legacy => write!(f, "LEGACY"),
            Self::Current => write!(f, "CURRENT"),
        }
    }
}

/// A decoded record tagged with the schema it was classified as.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedPayload {
    Legacy(LegacyPayload),
    Current(CurrentPayload),
}

impl ClassifiedPayload {
    /// The schema tag of this payload.
    #[must_use]
    pub fn variant(&self) -> SchemaVariant {
        match self {
            Self::Legacy(_) => SchemaVariant::Legacy,
            Self::Current(_) => SchemaVariant::Current,
        }
    }

    #[must_use]
    pub fn final_diagnosis(&self) -> Option<&str> {
        match self {
            Self::Legacy(p) => p.final_diagnosis.as_deref(),
            Self::Current(p) => p.final_diagnosis.as_deref(),
        }
    }
}

/// Decode a field, treating type mismatches as absence.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match serde_json::from_value::<T>(value) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            tracing::debug!("Ignoring malformed result field: {}", e);
            Ok(None)
        }
    }
}

// ---------------------------------------------------------------------------
// CURRENT
// ---------------------------------------------------------------------------

/// Nested result shape produced by the current ML pipeline.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CurrentPayload {
    #[serde(default, deserialize_with = "lenient")]
    pub final_diagnosis: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    pub classification_level: Option<f64>,

    #[serde(default, deserialize_with = "lenient")]
    pub details: Option<CurrentDetails>,

    /// Kept raw: the explainability extractor decodes each sub-section on its own.
    #[serde(default)]
    pub explanations: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CurrentDetails {
    #[serde(default, deserialize_with = "lenient")]
    pub binary_model_votes: Option<CurrentBinaryVotes>,

    #[serde(default, deserialize_with = "lenient")]
    pub classification_details: Option<CurrentClassificationDetails>,
}

/// Binary detection stage (0 = negative, 1 = positive per model).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CurrentBinaryVotes {
    #[serde(default, deserialize_with = "lenient")]
    pub predictions: Option<BTreeMap<String, Value>>,

    #[serde(default, deserialize_with = "lenient")]
    pub probabilities: Option<BTreeMap<String, Value>>,

    #[serde(default, deserialize_with = "lenient")]
    pub ensemble_confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CurrentClassificationDetails {
    #[serde(default, deserialize_with = "lenient")]
    pub was_classified: Option<bool>,

    #[serde(default, deserialize_with = "lenient")]
    pub model_votes: Option<CurrentModelVotes>,

    #[serde(default, deserialize_with = "lenient")]
    pub final_level_assigned: Option<f64>,
}

/// Severity classification stage (0..=3 per model).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CurrentModelVotes {
    #[serde(default, deserialize_with = "lenient")]
    pub predictions: Option<BTreeMap<String, Value>>,

    #[serde(default, deserialize_with = "lenient")]
    pub probabilities: Option<BTreeMap<String, Value>>,

    #[serde(default, deserialize_with = "lenient")]
    pub predicted_class: Option<f64>,

    #[serde(default, deserialize_with = "lenient")]
    pub ensemble_confidence: Option<f64>,
}

// ---------------------------------------------------------------------------
// LEGACY
// ---------------------------------------------------------------------------

/// Flat result shape produced by earlier pipeline releases.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LegacyPayload {
    #[serde(default, deserialize_with = "lenient")]
    pub final_diagnosis: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    pub classification_level: Option<f64>,

    #[serde(default, deserialize_with = "lenient")]
    pub severity_description: Option<String>,

    /// Overall confidence, already on a 0-100 scale
    #[serde(default, deserialize_with = "lenient")]
    pub confidence_percentage: Option<f64>,

    /// Overall confidence on a 0-1 scale
    #[serde(default, deserialize_with = "lenient")]
    pub confidence_score: Option<f64>,

    #[serde(default, deserialize_with = "lenient")]
    pub details: Option<LegacyDetails>,

    #[serde(default, deserialize_with = "lenient")]
    pub process_metadata: Option<ProcessMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LegacyDetails {
    /// Plain `model -> vote` mapping
    #[serde(default, deserialize_with = "lenient")]
    pub binary_model_votes: Option<BTreeMap<String, Value>>,

    #[serde(default, deserialize_with = "lenient")]
    pub binary_ensemble_confidence: Option<f64>,

    #[serde(default, deserialize_with = "lenient")]
    pub classification_details: Option<LegacyClassificationDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LegacyClassificationDetails {
    #[serde(default, deserialize_with = "lenient")]
    pub model_votes: Option<BTreeMap<String, Value>>,

    #[serde(default, deserialize_with = "lenient")]
    pub ensemble_confidence: Option<f64>,
}

/// Pipeline bookkeeping reported by LEGACY payloads, passed through as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessMetadata {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub models_used: Option<ModelsUsed>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub voting_threshold: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub confidence_calculation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelsUsed {
    #[serde(default)]
    pub binary: Vec<String>,

    #[serde(default)]
    pub classification: Vec<String>,
}
