//! Study records as returned by the portal backend.
//!
//! Only the fields needed to interpret results are modeled; patient and staff
//! details are ignored on purpose so they never enter this crate.

use serde::{Deserialize, Serialize};

use super::RawResult;

/// Processing status of a study on the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudyStatus {
    Completed,
    #[default]
    Pending,
    #[serde(other)]
    Other,
}

/// One medical study and its (possibly missing) ML result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyRecord {
    pub id: u64,

    #[serde(default)]
    pub access_code: Option<String>,

    #[serde(default)]
    pub status: StudyStatus,

    #[serde(default)]
    pub created_at: Option<String>,

    /// `null`, a JSON string, or an embedded JSON object
    #[serde(default)]
    pub ml_results: Option<RawResult>,
}

impl StudyRecord {
    #[must_use]
    pub fn new(id: u64, status: StudyStatus, ml_results: Option<RawResult>) -> Self {
        Self {
            id,
            access_code: None,
            status,
            created_at: None,
            ml_results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_backend_record_decoding() {
        let records: Vec<StudyRecord> = serde_json::from_value(json!([
            {
                "id": 7,
                "access_code": "EMG-0007",
                "status": "COMPLETED",
                "ml_results": "{\"final_diagnosis\":\"Negativo\"}",
                "patient": {"id": 3, "name": "Ana", "dni": "30123456"}
            },
            {"id": 8, "status": "PENDING", "ml_results": null},
            {"id": 9, "status": "ARCHIVED", "ml_results": {"confidence_percentage": 80}}
        ]))
        .expect("Should decode backend records");

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].status, StudyStatus::Completed);
        assert!(matches!(records[0].ml_results, Some(RawResult::Text(_))));
        assert!(records[1].ml_results.is_none());
        assert_eq!(records[2].status, StudyStatus::Other);
        assert!(matches!(records[2].ml_results, Some(RawResult::Structured(_))));
    }
}
