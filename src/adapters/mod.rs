//! Adapters layer: Concrete implementations of ports.
//!
//! - `json_export`: study records from a backend export file
//! - `memory`: process-local diagnosis cache
//! - `sanitize`: PII filtering for logs

pub mod json_export;
pub mod memory;
pub mod sanitize;

pub use json_export::SourceError;
