//! In-memory adapter: Implementation of DiagnosisCache.
//!
//! # Mutex Behavior
//!
//! The map is protected by a `Mutex`. A poisoned mutex (panic in another
//! thread) is treated as an empty cache: lookups miss and writes are dropped.
//! Outcomes can always be recomputed, so no data is lost.
//!
//! # Eviction
//!
//! One entry is kept per study. Storing an outcome for a new payload digest
//! replaces the study's previous entry, so the map never grows past the
//! number of studies seen.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::DiagnosisOutcome;
use crate::ports::{CacheKey, DiagnosisCache};

/// A cached outcome and the payload digest it was computed from.
#[derive(Debug)]
struct Entry {
    payload_digest: [u8; 32],
    outcome: DiagnosisOutcome,
}

/// Process-local outcome cache, keyed by study ID.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<u64, Entry>>,
}

impl InMemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiagnosisCache for InMemoryCache {
    fn get(&self, key: &CacheKey) -> Option<DiagnosisOutcome> {
        match self.entries.lock() {
            Ok(entries) => entries
                .get(&key.study_id)
                .filter(|entry| entry.payload_digest == key.payload_digest)
                .map(|entry| entry.outcome.clone()),
            Err(_) => {
                tracing::warn!("Diagnosis cache lock poisoned; treating as miss");
                None
            }
        }
    }

    fn put(&self, key: CacheKey, outcome: DiagnosisOutcome) {
        match self.entries.lock() {
            Ok(mut entries) => {
                let previous = entries.insert(
                    key.study_id,
                    Entry {
                        payload_digest: key.payload_digest,
                        outcome,
                    },
                );
                if previous.is_some_and(|p| p.payload_digest != key.payload_digest) {
                    tracing::debug!("Replaced stale cached outcome for study {}", key.study_id);
                }
            }
            Err(_) => tracing::warn!("Diagnosis cache lock poisoned; dropping entry for study {}", key.study_id),
        }
    }

    fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}
