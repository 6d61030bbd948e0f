//! Diagnosis cache port: memoization of normalized outcomes.
//!
//! Normalization is pure, so an outcome can be reused for as long as the
//! study ID and the payload stay the same. Keys carry a digest of the payload
//! rather than the payload itself.

use crate::domain::DiagnosisOutcome;

/// Cache key: study ID plus SHA-256 of the canonical payload JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub study_id: u64,
    pub payload_digest: [u8; 32],
}

/// Storage for normalized outcomes.
///
/// At most one outcome is kept per study: `put` replaces whatever the study
/// had, and `get` only hits when the payload digest matches.
/// Implementations must never fail loudly: an unusable cache behaves as an
/// empty one.
pub trait DiagnosisCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<DiagnosisOutcome>;

    fn put(&self, key: CacheKey, outcome: DiagnosisOutcome);

    /// Number of cached outcomes (at most one per study).
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached outcome.
    fn clear(&self);
}
