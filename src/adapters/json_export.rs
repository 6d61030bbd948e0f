//! JSON export adapter: Implementation of StudySource.
//!
//! Reads study records from a JSON file exported from the portal backend.
//! The file holds either an array of records or an object with a `studies`
//! array. Records that fail to decode are skipped with a warning so one bad
//! row does not hide the rest of the export.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::domain::StudyRecord;
use crate::ports::StudySource;

/// Error type for export operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to read export {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Export is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Export must be an array of studies or an object with a `studies` array")]
    UnexpectedShape,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExportFile {
    Records(Vec<Value>),
    Wrapped { studies: Vec<Value> },
}

/// Study source backed by an export file.
///
/// The file is re-read on every call, so edits are picked up without a
/// restart.
#[derive(Debug, Clone)]
pub struct JsonExportSource {
    path: PathBuf,
}

impl JsonExportSource {
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode an export document.
    ///
    /// # Errors
    /// Returns error if the text is not JSON or has an unexpected shape.
    pub fn parse(text: &str) -> Result<Vec<StudyRecord>, SourceError> {
        let document: Value = serde_json::from_str(text)?;
        let rows = match serde_json::from_value::<ExportFile>(document) {
            Ok(ExportFile::Records(rows) | ExportFile::Wrapped { studies: rows }) => rows,
            Err(_) => return Err(SourceError::UnexpectedShape),
        };

        let total = rows.len();
        let records: Vec<StudyRecord> = rows
            .into_iter()
            .enumerate()
            .filter_map(|(index, row)| match serde_json::from_value::<StudyRecord>(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!("Skipping export row {}: {}", index, e);
                    None
                }
            })
            .collect();

        if records.len() < total {
            tracing::warn!("Loaded {} of {} export rows", records.len(), total);
        }
        Ok(records)
    }
}

impl StudySource for JsonExportSource {
    type Error = SourceError;

    fn load_studies(&self) -> Result<Vec<StudyRecord>, Self::Error> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        let records = Self::parse(&text)?;
        tracing::debug!("Read {} studies from export", records.len());
        Ok(records)
    }
}
