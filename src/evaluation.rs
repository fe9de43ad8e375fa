//! Held-out evaluation of fitted classifiers

use serde::{Deserialize, Serialize};

/// Confusion counts and derived scores for a binary classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub true_positives: u64,
    pub false_positives: u64,
    pub true_negatives: u64,
    pub false_negatives: u64,
}

impl ClassificationReport {
    /// Tally predictions against ground truth. Extra elements in the longer slice are ignored.
    pub fn from_predictions(truth: &[u8], predicted: &[u8]) -> Self {
        let mut report = Self::default();
        for (&t, &p) in truth.iter().zip(predicted) {
            match (t == 1, p == 1) {
                (true, true) => report.true_positives += 1,
                (false, true) => report.false_positives += 1,
                (false, false) => report.true_negatives += 1,
                (true, false) => report.false_negatives += 1,
            }
        }
        report
    }

    pub fn total(&self) -> u64 {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positives + self.true_negatives, self.total())
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r > 0.0 {
            2.0 * p * r / (p + r)
        } else {
            0.0
        }
    }

    /// Scores as a JSON object for artifact metadata.
    pub fn to_metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "samples": self.total(),
            "accuracy": self.accuracy(),
            "precision": self.precision(),
            "recall": self.recall(),
            "f1": self.f1(),
        })
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_counts() {
        let truth = [1, 1, 0, 0, 1, 0];
        let predicted = [1, 0, 0, 1, 1, 0];

        let report = ClassificationReport::from_predictions(&truth, &predicted);

        assert_eq!(report.true_positives, 2);
        assert_eq!(report.false_negatives, 1);
        assert_eq!(report.false_positives, 1);
        assert_eq!(report.true_negatives, 2);
        assert!((report.accuracy() - 4.0 / 6.0).abs() < 1e-9);
        assert!((report.precision() - 2.0 / 3.0).abs() < 1e-9);
        assert!((report.recall() - 2.0 / 3.0).abs() < 1e-9);
        assert!((report.f1() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_report_scores_zero() {
        let report = ClassificationReport::from_predictions(&[], &[]);
        assert_eq!(report.accuracy(), 0.0);
        assert_eq!(report.f1(), 0.0);
    }
}
