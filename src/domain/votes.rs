//! Per-model vote breakdowns for the two ensemble stages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Read one model vote.
///
/// Numbers, numeric strings and booleans count as votes; the value is rounded
/// but not range-checked.
#[must_use]
pub fn read_vote(raw: &Value) -> Option<i64> {
    let number = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => return None,
    };
    number.is_finite().then(|| number.round() as i64)
}

/// Ensemble stage a vote belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteStage {
    /// Disease present / absent (votes 0 or 1)
    Binary,
    /// Severity level (votes 0..=3)
    Classification,
}

impl VoteStage {
    /// Inclusive range of valid votes for this stage.
    #[must_use]
    pub fn range(&self) -> (i64, i64) {
        match self {
            Self::Binary => (0, 1),
            Self::Classification => (0, 3),
        }
    }
}

impl std::fmt::Display for VoteStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Binary => write!(f, "binary"),
            Self::Classification => write!(f, "classification"),
        }
    }
}

/// Per-class probabilities reported for one model.
///
/// Binary models report a single vector; classification models report one
/// vector per analyzed window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassProbabilities {
    Vector(Vec<f64>),
    Matrix(Vec<Vec<f64>>),
}

/// Votes of every model in one ensemble stage.
///
/// Model names are unique; ordering carries no meaning (kept sorted for
/// stable output).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelVotes {
    pub stage: VoteStage,
    pub votes: BTreeMap<String, i64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub probabilities: BTreeMap<String, ClassProbabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_class: Option<i64>,
}

impl ModelVotes {
    #[must_use]
    pub fn new(stage: VoteStage) -> Self {
        Self {
            stage,
            votes: BTreeMap::new(),
            probabilities: BTreeMap::new(),
            predicted_class: None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.votes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// Number of models voting positive (binary stage) or non-normal
    /// (classification stage).
    #[must_use]
    pub fn positive_count(&self) -> usize {
        self.votes.values().filter(|&&v| v > 0).count()
    }

    /// Most common vote; ties resolve to the higher vote.
    #[must_use]
    pub fn majority(&self) -> Option<i64> {
        let mut tally: BTreeMap<i64, usize> = BTreeMap::new();
        for vote in self.votes.values() {
            *tally.entry(*vote).or_default() += 1;
        }
        tally
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(vote, _)| vote)
    }

    /// Share of models agreeing with the majority vote, in `[0, 1]`.
    #[must_use]
    pub fn agreement(&self) -> f64 {
        let Some(majority) = self.majority() else {
            return 0.0;
        };
        let agreeing = self.votes.values().filter(|&&v| v == majority).count();
        agreeing as f64 / self.votes.len() as f64
    }

    /// Human-readable model name (`random_forest` -> `random forest`).
    #[must_use]
    pub fn display_name(model: &str) -> String {
        model.replace('_', " ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_read_vote() {
        assert_eq!(read_vote(&json!(1)), Some(1));
        assert_eq!(read_vote(&json!(2.6)), Some(3));
        assert_eq!(read_vote(&json!(" 0 ")), Some(0));
        assert_eq!(read_vote(&json!(true)), Some(1));
        assert_eq!(read_vote(&json!(false)), Some(0));
        assert_eq!(read_vote(&json!("severe")), None);
        assert_eq!(read_vote(&json!(null)), None);
        assert_eq!(read_vote(&json!([1])), None);
    }

    fn votes(stage: VoteStage, entries: &[(&str, i64)]) -> ModelVotes {
        let mut v = ModelVotes::new(stage);
        for (name, vote) in entries {
            v.votes.insert((*name).to_string(), *vote);
        }
        v
    }

    #[test]
    fn test_majority_and_agreement() {
        let v = votes(VoteStage::Binary, &[("svm", 1), ("rf", 1), ("knn", 0), ("xgb", 1)]);
        assert_eq!(v.majority(), Some(1));
        assert_eq!(v.positive_count(), 3);
        assert!((v.agreement() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tie_prefers_higher_vote() {
        let v = votes(VoteStage::Classification, &[("a", 1), ("b", 2)]);
        assert_eq!(v.majority(), Some(2));
    }

    #[test]
    fn test_empty_votes() {
        let v = ModelVotes::new(VoteStage::Binary);
        assert!(v.is_empty());
        assert_eq!(v.majority(), None);
        assert_eq!(v.agreement(), 0.0);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(ModelVotes::display_name("random_forest_v2"), "random forest v2");
    }

    #[test]
    fn test_probability_shapes() {
        let vector: ClassProbabilities = serde_json::from_str("[0.2, 0.8]").expect("Should decode vector");
        assert!(matches!(vector, ClassProbabilities::Vector(_)));

        let matrix: ClassProbabilities =
            serde_json::from_str("[[0.1, 0.7, 0.1, 0.1]]").expect("Should decode matrix");
        assert!(matches!(matrix, ClassProbabilities::Matrix(ref rows) if rows.len() == 1));
    }
}
