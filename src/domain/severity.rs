//! Severity classification for neuromuscular findings.
//!
//! Maps the ordinal classification level (0 = normal .. 3 = severe) produced by
//! the classification stage onto a color bucket, a label, and a description.

use serde::{Deserialize, Serialize};

/// Ordinal severity level, always within `0..=3`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassificationLevel(u8);

impl ClassificationLevel {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 3;

    pub const NORMAL: Self = Self(0);
    pub const MILD: Self = Self(1);
    pub const MODERATE: Self = Self(2);
    pub const SEVERE: Self = Self(3);

    /// Build a level, returning `None` when out of range.
    #[must_use]
    pub fn new(level: u8) -> Option<Self> {
        (level <= Self::MAX).then_some(Self(level))
    }

    /// Clamp an arbitrary integer into the valid range.
    #[must_use]
    pub fn clamped(level: i64) -> Self {
        Self(level.clamp(i64::from(Self::MIN), i64::from(Self::MAX)) as u8)
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    /// All valid levels, lowest first.
    #[must_use]
    pub fn all() -> [Self; 4] {
        [Self::NORMAL, Self::MILD, Self::MODERATE, Self::SEVERE]
    }
}

impl std::fmt::Display for ClassificationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Color bucket for presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityBucket {
    Green,
    Yellow,
    Orange,
    Red,
    /// Level could not be interpreted
    Gray,
}

/// Presentation data for a classification level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Severity {
    pub bucket: SeverityBucket,
    pub label: &'static str,
    pub description: &'static str,
    /// Set when the level was not one of the known values
    pub anomalous: bool,
}

impl Severity {
    /// Map a raw level onto its severity entry.
    ///
    /// Total over all integers: anything outside `0..=3` maps to `Unknown`.
    #[must_use]
    pub fn for_level(level: i64) -> Self {
        match level {
            0 => Self::known(
                SeverityBucket::Green,
                "Normal",
                "No significant alterations were detected in the electromyographic activity.",
            ),
            1 => Self::known(
                SeverityBucket::Yellow,
                "Mild",
                "Mild alterations were detected, suggesting early changes in neuromuscular activity.",
            ),
            2 => Self::known(
                SeverityBucket::Orange,
                "Moderate",
                "Moderate alterations were identified, indicating possible pathological changes in the neuromuscular system.",
            ),
            3 => Self::known(
                SeverityBucket::Red,
                "Severe",
                "Severe alterations were found, suggesting significant neuromuscular pathology.",
            ),
            _ => Self::unknown(),
        }
    }

    /// Entry used for levels that cannot be interpreted.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            bucket: SeverityBucket::Gray,
            label: "Unknown",
            description: "Analysis completed with automatic classification.",
            anomalous: true,
        }
    }

    fn known(bucket: SeverityBucket, label: &'static str, description: &'static str) -> Self {
        Self {
            bucket,
            label,
            description,
            anomalous: false,
        }
    }
}

impl From<ClassificationLevel> for Severity {
    fn from(level: ClassificationLevel) -> Self {
        Self::for_level(i64::from(level.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_table() {
        let labels: Vec<&str> = (0..=3).map(|l| Severity::for_level(l).label).collect();
        assert_eq!(labels, vec!["Normal", "Mild", "Moderate", "Severe"]);

        assert_eq!(Severity::for_level(0).bucket, SeverityBucket::Green);
        assert_eq!(Severity::for_level(3).bucket, SeverityBucket::Red);
        assert!((0..=3).all(|l| !Severity::for_level(l).anomalous));
    }

    #[test]
    fn test_unknown_levels_are_flagged() {
        for level in [-1, 4, 99, i64::MIN, i64::MAX] {
            let severity = Severity::for_level(level);
            assert_eq!(severity.label, "Unknown");
            assert_eq!(severity.bucket, SeverityBucket::Gray);
            assert!(severity.anomalous);
        }
    }

    #[test]
    fn test_mapper_is_deterministic() {
        assert_eq!(Severity::for_level(2), Severity::for_level(2));
        assert_eq!(Severity::from(ClassificationLevel::MODERATE), Severity::for_level(2));
    }

    #[test]
    fn test_level_clamping() {
        assert_eq!(ClassificationLevel::clamped(-5), ClassificationLevel::NORMAL);
        assert_eq!(ClassificationLevel::clamped(7), ClassificationLevel::SEVERE);
        assert_eq!(ClassificationLevel::clamped(1), ClassificationLevel::MILD);
        assert!(ClassificationLevel::new(4).is_none());
        assert_eq!(ClassificationLevel::new(3), Some(ClassificationLevel::SEVERE));
    }
}
