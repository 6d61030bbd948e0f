//! Study source port: Trait for the backend that owns study records.
//!
//! This trait abstracts where records come from (portal API, export file)
//! from the application logic.

use crate::domain::StudyRecord;

/// Read access to study records.
pub trait StudySource: Send + Sync {
    /// Error type for source operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load every study record.
    ///
    /// # Errors
    /// Returns error if the backend cannot be read.
    fn load_studies(&self) -> Result<Vec<StudyRecord>, Self::Error>;

    /// Load one study by ID.
    ///
    /// # Returns
    /// `None` if no study has that ID.
    ///
    /// # Errors
    /// Returns error if the backend cannot be read.
    fn load_study(&self, id: u64) -> Result<Option<StudyRecord>, Self::Error> {
        Ok(self.load_studies()?.into_iter().find(|s| s.id == id))
    }
}
