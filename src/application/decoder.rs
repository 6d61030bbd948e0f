//! Payload decoder: raw `ml_results` value to a structured JSON record.
//!
//! Never panics and never raises: malformed text becomes a `PARSE_ERROR`
//! value; absent results become the non-error `Absent` sentinel.

use serde_json::Value;

use crate::domain::{DiagnosisError, RawResult};

/// Output of the decoding step.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// No result yet (study still processing)
    Absent,
    /// Structured record, not yet classified
    Record(Value),
}

/// Decode a raw result.
///
/// `None`, JSON `null`, and blank text are all treated as "no result yet".
///
/// # Errors
/// Returns a `PARSE_ERROR` when text is not valid JSON.
pub fn decode(raw: Option<&RawResult>) -> Result<Decoded, DiagnosisError> {
    match raw {
        None => Ok(Decoded::Absent),
        Some(RawResult::Structured(Value::Null)) => Ok(Decoded::Absent),
        Some(RawResult::Structured(value)) => Ok(Decoded::Record(value.clone())),
        Some(RawResult::Text(text)) => {
            if text.trim().is_empty() {
                return Ok(Decoded::Absent);
            }
            match serde_json::from_str::<Value>(text) {
                Ok(Value::Null) => Ok(Decoded::Absent),
                Ok(value) => Ok(Decoded::Record(value)),
                Err(e) => {
                    tracing::debug!("Result payload is not valid JSON: {}", e);
                    Err(DiagnosisError::parse(format!("Invalid result payload: {e}")))
                }
            }
        }
    }
}
