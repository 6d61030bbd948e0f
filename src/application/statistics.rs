//! Dashboard statistics over normalized study outcomes.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{ClassificationLevel, DiagnosisOutcome, Finding, StudyStatus};

/// Counters shown on the doctor dashboard.
///
/// Positive and negative counts come only from successfully normalized
/// outcomes; a result that cannot be interpreted is counted as
/// `uninterpretable`, never as a negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudyStatistics {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    /// Studies with no result yet
    pub awaiting_results: usize,
    pub positive: usize,
    pub negative: usize,
    pub uninterpretable: usize,
    /// Interpreted studies per classification level
    pub by_level: BTreeMap<u8, usize>,
}

impl Default for StudyStatistics {
    fn default() -> Self {
        Self {
            total: 0,
            completed: 0,
            pending: 0,
            awaiting_results: 0,
            positive: 0,
            negative: 0,
            uninterpretable: 0,
            by_level: ClassificationLevel::all().into_iter().map(|l| (l.value(), 0)).collect(),
        }
    }
}

impl StudyStatistics {
    /// Count one study.
    pub fn record(&mut self, status: StudyStatus, outcome: &DiagnosisOutcome) {
        self.total += 1;
        match status {
            StudyStatus::Completed => self.completed += 1,
            StudyStatus::Pending => self.pending += 1,
            StudyStatus::Other => {}
        }

        match outcome {
            DiagnosisOutcome::Empty => self.awaiting_results += 1,
            DiagnosisOutcome::Failed(_) => self.uninterpretable += 1,
            DiagnosisOutcome::Done(diagnosis) => {
                match diagnosis.finding {
                    Finding::Positive => self.positive += 1,
                    Finding::Negative => self.negative += 1,
                    Finding::Indeterminate => {}
                }
                *self.by_level.entry(diagnosis.level.value()).or_insert(0) += 1;
            }
        }
    }

    /// Share of interpreted studies that are positive, in percent.
    #[must_use]
    pub fn positive_rate(&self) -> f64 {
        let interpreted = self.positive + self.negative;
        if interpreted == 0 {
            0.0
        } else {
            self.positive as f64 / interpreted as f64 * 100.0
        }
    }
}

impl<'a> FromIterator<(StudyStatus, &'a DiagnosisOutcome)> for StudyStatistics {
    fn from_iter<I: IntoIterator<Item = (StudyStatus, &'a DiagnosisOutcome)>>(iter: I) -> Self {
        let mut stats = Self::default();
        for (status, outcome) in iter {
            stats.record(status, outcome);
        }
        stats
    }
}
