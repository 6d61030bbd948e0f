//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the application and external systems (study backend, cache).

mod cache;
mod study_source;

pub use cache::{CacheKey, DiagnosisCache};
pub use study_source::StudySource;
