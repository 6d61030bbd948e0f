//! Study result service: Normalizes study results from a backend.
//!
//! This service coordinates:
//! - Record loading through a `StudySource`
//! - Memoized normalization through a `DiagnosisCache`
//! - Dashboard statistics
//!
//! Outcomes are cached per study and checked against the SHA-256 of the
//! canonical payload JSON, so a result that is re-sent as text or as an object
//! hits the same entry, and an updated result is normalized again and replaces
//! the stale entry.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::normalizer::Normalizer;
use super::statistics::StudyStatistics;
use crate::config::NormalizerConfig;
use crate::domain::{DiagnosisOutcome, RawResult, StudyRecord, StudyStatus};
use crate::ports::{CacheKey, DiagnosisCache, StudySource};
use crate::{MyodiagError, Result};

/// Normalized outcome of one study.
///
/// Access codes are not carried over; they identify the patient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudyResult {
    pub study_id: u64,
    pub status: StudyStatus,
    pub outcome: DiagnosisOutcome,
}

/// Service for interpreting the results of stored studies.
pub struct StudyResultService<S, C>
where
    S: StudySource,
    C: DiagnosisCache,
{
    source: Arc<S>,
    cache: Arc<C>,
    normalizer: Normalizer,
}

impl<S, C> StudyResultService<S, C>
where
    S: StudySource,
    C: DiagnosisCache,
    S::Error: Into<crate::adapters::SourceError>,
{
    /// Create a new study result service.
    pub fn new(source: Arc<S>, cache: Arc<C>, config: &NormalizerConfig) -> Self {
        Self {
            source,
            cache,
            normalizer: Normalizer::new(config),
        }
    }

    /// Normalize one record, reusing a cached outcome when the payload is unchanged.
    #[must_use]
    pub fn normalize_record(&self, record: &StudyRecord) -> StudyResult {
        let key = cache_key(record.id, record.ml_results.as_ref());

        let outcome = if let Some(outcome) = self.cache.get(&key) {
            tracing::trace!("Cache hit for study {}", record.id);
            outcome
        } else {
            let outcome = self.normalizer.normalize(record.ml_results.as_ref());
            if let DiagnosisOutcome::Failed(e) = &outcome {
                tracing::warn!("Study {} result could not be interpreted: {}", record.id, e.kind);
            }
            self.cache.put(key, outcome.clone());
            outcome
        };

        StudyResult {
            study_id: record.id,
            status: record.status,
            outcome,
        }
    }

    /// Load and normalize one study.
    ///
    /// # Returns
    /// `None` if the source has no study with that ID.
    ///
    /// # Errors
    /// Returns error if the source cannot be read.
    pub fn normalize_study(&self, id: u64) -> Result<Option<StudyResult>> {
        let record = self
            .source
            .load_study(id)
            .map_err(|e| MyodiagError::Source(e.into()))?;
        Ok(record.map(|r| self.normalize_record(&r)))
    }

    /// Load and normalize every study.
    ///
    /// # Errors
    /// Returns error if the source cannot be read.
    pub fn normalize_all(&self) -> Result<Vec<StudyResult>> {
        let records = self
            .source
            .load_studies()
            .map_err(|e| MyodiagError::Source(e.into()))?;

        let results: Vec<StudyResult> = records.iter().map(|r| self.normalize_record(r)).collect();
        tracing::info!("Normalized {} studies ({} cached outcomes)", results.len(), self.cache.len());
        Ok(results)
    }

    /// Dashboard statistics over every study.
    ///
    /// # Errors
    /// Returns error if the source cannot be read.
    pub fn statistics(&self) -> Result<StudyStatistics> {
        let results = self.normalize_all()?;
        Ok(summarize(&results))
    }
}

/// Statistics over already-normalized results.
#[must_use]
pub fn summarize(results: &[StudyResult]) -> StudyStatistics {
    results.iter().map(|r| (r.status, &r.outcome)).collect()
}

/// Cache key for a study payload.
///
/// Text that parses as JSON is hashed in its canonical serialized form, so it
/// shares a key with the equivalent structured value.
#[must_use]
pub fn cache_key(study_id: u64, raw: Option<&RawResult>) -> CacheKey {
    let mut hasher = Sha256::new();
    match raw {
        None => hasher.update(b"absent"),
        Some(RawResult::Structured(value)) => {
            hasher.update(b"json:");
            hasher.update(value.to_string().as_bytes());
        }
        Some(RawResult::Text(text)) => match serde_json::from_str::<Value>(text) {
            Ok(value) => {
                hasher.update(b"json:");
                hasher.update(value.to_string().as_bytes());
            }
            Err(_) => {
                hasher.update(b"text:");
                hasher.update(text.as_bytes());
            }
        },
    }

    CacheKey {
        study_id,
        payload_digest: hasher.finalize().into(),
    }
}
