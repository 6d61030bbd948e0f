//! Schema classifier: decides which result shape a decoded record follows.
//!
//! Detection is by marker fields:
//! - CURRENT: `details.binary_model_votes.predictions` or
//!   `details.classification_details.model_votes.predictions`
//! - LEGACY: `confidence_percentage`, or `details.binary_model_votes` as a flat
//!   `model -> vote` mapping
//! - anything else that is a non-empty object is read as CURRENT with missing
//!   sections

use serde_json::{Map, Value};

use crate::domain::{read_vote, ClassifiedPayload, DiagnosisError, SchemaVariant};

/// Keys that only appear inside the nested (CURRENT) vote sections.
const NESTED_VOTE_KEYS: [&str; 3] = ["predictions", "probabilities", "ensemble_confidence"];

/// Classify a decoded record and build its typed payload.
///
/// # Errors
/// Returns `UNKNOWN_SCHEMA` when the record is not an object or is empty.
pub fn classify(record: &Value) -> Result<ClassifiedPayload, DiagnosisError> {
    let Some(map) = record.as_object() else {
        return Err(DiagnosisError::unknown_schema(format!(
            "Expected a JSON object, found {}",
            json_kind(record)
        )));
    };
    if map.is_empty() {
        return Err(DiagnosisError::unknown_schema("Result record is empty"));
    }

    let variant = detect_variant(record);
    tracing::debug!("Classified result payload as {}", variant);

    let payload = match variant {
        SchemaVariant::Current => serde_json::from_value(record.clone()).map(ClassifiedPayload::Current),
        SchemaVariant::Legacy => serde_json::from_value(record.clone()).map(ClassifiedPayload::Legacy),
    };
    payload.map_err(|e| DiagnosisError::unknown_schema(format!("Unreadable {variant} payload: {e}")))
}

/// Detect the schema variant of a non-empty record.
#[must_use]
pub fn detect_variant(record: &Value) -> SchemaVariant {
    let present = |pointer: &str| record.pointer(pointer).is_some_and(|v| !v.is_null());

    if present("/details/binary_model_votes/predictions")
        || present("/details/classification_details/model_votes/predictions")
    {
        return SchemaVariant::Current;
    }

    let flat_votes = record
        .pointer("/details/binary_model_votes")
        .and_then(Value::as_object)
        .is_some_and(is_flat_vote_mapping);

    if present("/confidence_percentage") || flat_votes {
        SchemaVariant::Legacy
    } else {
        SchemaVariant::Current
    }
}

/// A plain `model -> vote` mapping with no nested-section keys.
///
/// Accepts every vote form the extractor reads (numbers, numeric strings,
/// booleans).
fn is_flat_vote_mapping(map: &Map<String, Value>) -> bool {
    !map.is_empty()
        && map.keys().all(|k| !NESTED_VOTE_KEYS.contains(&k.as_str()))
        && map.values().all(|v| read_vote(v).is_some())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_current_markers() {
        let binary = json!({"details": {"binary_model_votes": {"predictions": {"svm": 1}}}});
        assert_eq!(detect_variant(&binary), SchemaVariant::Current);

        let classification = json!({
            "details": {"classification_details": {"model_votes": {"predictions": {"rf": 2}}}}
        });
        assert_eq!(detect_variant(&classification), SchemaVariant::Current);
    }

    #[test]
    fn test_legacy_markers() {
        let percentage = json!({"final_diagnosis": "Positivo", "confidence_percentage": 91});
        assert_eq!(detect_variant(&percentage), SchemaVariant::Legacy);

        let flat = json!({"details": {"binary_model_votes": {"svm": 1, "random_forest": 0}}});
        assert_eq!(detect_variant(&flat), SchemaVariant::Legacy);
    }

    #[test]
    fn test_loosely_typed_flat_votes_are_legacy() {
        let strings = json!({"details": {"binary_model_votes": {"svm": "1", "random_forest": "1", "knn": "0"}}});
        assert_eq!(detect_variant(&strings), SchemaVariant::Legacy);

        let mixed = json!({"details": {"binary_model_votes": {"svm": true, "random_forest": 1, "knn": " 0 "}}});
        assert_eq!(detect_variant(&mixed), SchemaVariant::Legacy);

        let words = json!({"details": {"binary_model_votes": {"svm": "yes", "knn": 0}}});
        assert_eq!(detect_variant(&words), SchemaVariant::Current);
    }

    #[test]
    fn test_nested_keys_are_not_flat_votes() {
        // Only an ensemble confidence: a CURRENT payload missing its predictions.
        let record = json!({"details": {"binary_model_votes": {"ensemble_confidence": 0.8}}});
        assert_eq!(detect_variant(&record), SchemaVariant::Current);
    }

    #[test]
    fn test_unmarked_record_degrades_to_current() {
        let record = json!({"final_diagnosis": "Negativo"});
        let payload = classify(&record).expect("Should classify");
        assert_eq!(payload.variant(), SchemaVariant::Current);
        assert_eq!(payload.final_diagnosis(), Some("Negativo"));
    }

    #[test]
    fn test_shapeless_records() {
        for record in [json!({}), json!([]), json!(42), json!("text"), json!(true)] {
            let err = classify(&record).expect_err("Should reject shapeless record");
            assert_eq!(err.kind, ErrorKind::UnknownSchema);
        }
    }

    #[test]
    fn test_classify_builds_typed_legacy_payload() {
        let record = json!({
            "confidence_percentage": 77,
            "details": {"binary_model_votes": {"svm": 1}, "binary_ensemble_confidence": 0.7}
        });
        match classify(&record).expect("Should classify") {
            ClassifiedPayload::Legacy(p) => {
                assert_eq!(p.confidence_percentage, Some(77.0));
                let details = p.details.expect("Details should be present");
                assert_eq!(details.binary_ensemble_confidence, Some(0.7));
            }
            other => panic!("Expected LEGACY payload, got {:?}", other.variant()),
        }
    }
}
