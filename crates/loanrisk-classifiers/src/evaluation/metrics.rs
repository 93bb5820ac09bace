//! Binary classification metrics on the held-out rows.
use serde::{Deserialize, Serialize};

use crate::config::ModelKind;
use crate::error::{PipelineError, Result};

/// 2x2 confusion matrix for labels {0, 1}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(y_true: &[u8], y_pred: &[u8]) -> Self {
        let mut cm = ConfusionMatrix::default();
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (t, p) {
                (0, 0) => cm.true_negative += 1,
                (0, _) => cm.false_positive += 1,
                (_, 0) => cm.false_negative += 1,
                _ => cm.true_positive += 1,
            }
        }
        cm
    }

    /// Rows are true labels, columns predicted labels: `[[TN, FP], [FN, TP]]`.
    pub fn as_array(&self) -> [[usize; 2]; 2] {
        [
            [self.true_negative, self.false_positive],
            [self.false_negative, self.true_positive],
        ]
    }

    pub fn total(&self) -> usize {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_negative + self.true_positive, self.total())
    }

    /// Precision of `class` (0 or 1); 0.0 when nothing was predicted as it.
    pub fn precision(&self, class: u8) -> f64 {
        if class == 1 {
            ratio(self.true_positive, self.true_positive + self.false_positive)
        } else {
            ratio(self.true_negative, self.true_negative + self.false_negative)
        }
    }

    pub fn recall(&self, class: u8) -> f64 {
        ratio(self.hits(class), self.support(class))
    }

    pub fn f1(&self, class: u8) -> f64 {
        let (p, r) = (self.precision(class), self.recall(class));
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    pub fn support(&self, class: u8) -> usize {
        if class == 1 {
            self.true_positive + self.false_negative
        } else {
            self.true_negative + self.false_positive
        }
    }

    fn hits(&self, class: u8) -> usize {
        if class == 1 {
            self.true_positive
        } else {
            self.true_negative
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Headline metrics of one model, positive class 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricReport {
    pub model: ModelKind,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub roc_auc: f64,
}

impl MetricReport {
    pub fn compute(model: ModelKind, y_true: &[u8], y_pred: &[u8], proba: &[f64]) -> Result<Self> {
        if y_true.len() != y_pred.len() || y_true.len() != proba.len() {
            return Err(PipelineError::Evaluation {
                model,
                reason: format!(
                    "{} labels, {} predictions, {} probabilities",
                    y_true.len(),
                    y_pred.len(),
                    proba.len()
                ),
            });
        }
        let cm = ConfusionMatrix::from_predictions(y_true, y_pred);
        Ok(Self {
            model,
            accuracy: cm.accuracy(),
            precision: cm.precision(1),
            recall: cm.recall(1),
            f1: cm.f1(1),
            roc_auc: roc_auc(model, y_true, proba)?,
        })
    }
}

/// Area under the ROC curve via the Mann-Whitney rank statistic, with tied
/// scores sharing their average rank.
pub fn roc_auc(model: ModelKind, y_true: &[u8], scores: &[f64]) -> Result<f64> {
    let n_pos = y_true.iter().filter(|&&l| l == 1).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(PipelineError::Evaluation {
            model,
            reason: "ROC-AUC is undefined when the test labels contain a single class".to_string(),
        });
    }
    if scores.iter().any(|s| s.is_nan()) {
        return Err(PipelineError::Evaluation {
            model,
            reason: "probabilities contain NaN".to_string(),
        });
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut positive_rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; the tie group i..=j shares the mean rank.
        let mean_rank = (i + j) as f64 / 2.0 + 1.0;
        let positives = order[i..=j].iter().filter(|&&k| y_true[k] == 1).count();
        positive_rank_sum += mean_rank * positives as f64;
        i = j + 1;
    }

    let (p, n) = (n_pos as f64, n_neg as f64);
    Ok((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}

/// ROC curve points `(false positive rate, true positive rate)`, one per
/// distinct score, from `(0, 0)` to `(1, 1)`.
pub fn roc_curve(y_true: &[u8], scores: &[f64]) -> Vec<(f64, f64)> {
    let n_pos = y_true.iter().filter(|&&l| l == 1).count() as f64;
    let n_neg = y_true.len() as f64 - n_pos;
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut points = vec![(0.0, 0.0)];
    let (mut tp, mut fp) = (0.0, 0.0);
    for (k, &idx) in order.iter().enumerate() {
        if y_true[idx] == 1 {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_group = order
            .get(k + 1)
            .map_or(true, |&next| scores[next] != scores[idx]);
        if last_of_group {
            let fpr = if n_neg > 0.0 { fp / n_neg } else { 0.0 };
            let tpr = if n_pos > 0.0 { tp / n_pos } else { 0.0 };
            points.push((fpr, tpr));
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    const LR: ModelKind = ModelKind::LogisticRegression;

    #[test]
    fn confusion_matrix_layout() {
        let cm = ConfusionMatrix::from_predictions(&[0, 0, 1, 1, 1], &[0, 1, 0, 1, 1]);
        assert_eq!(cm.as_array(), [[1, 1], [1, 2]]);
        assert!((cm.precision(1) - 2.0 / 3.0).abs() < 1e-12);
        assert!((cm.recall(0) - 0.5).abs() < 1e-12);
        assert_eq!(cm.support(1), 3);
    }

    #[test]
    fn zero_division_yields_zero() {
        let cm = ConfusionMatrix::from_predictions(&[0, 1, 0], &[0, 0, 0]);
        assert_eq!(cm.precision(1), 0.0);
        assert_eq!(cm.f1(1), 0.0);
    }

    #[test]
    fn auc_matches_hand_computed_values() {
        assert_eq!(roc_auc(LR, &[0, 0, 1, 1], &[0.1, 0.4, 0.35, 0.8]).unwrap(), 0.75);
        assert_eq!(roc_auc(LR, &[0, 1], &[0.3, 0.3]).unwrap(), 0.5);
        assert_eq!(roc_auc(LR, &[1, 0], &[0.9, 0.1]).unwrap(), 1.0);
    }

    #[test]
    fn auc_single_class_is_an_evaluation_error() {
        let err = roc_auc(LR, &[1, 1, 1], &[0.2, 0.5, 0.9]).unwrap_err();
        assert!(matches!(err, PipelineError::Evaluation { .. }));
    }

    #[test]
    fn report_metrics_lie_in_unit_interval() {
        let y = [0, 1, 1, 0, 1, 0, 0, 1];
        let p = [0.2, 0.7, 0.4, 0.6, 0.9, 0.1, 0.3, 0.55];
        let pred: Vec<u8> = p.iter().map(|&v| u8::from(v > 0.5)).collect();
        let r = MetricReport::compute(LR, &y, &pred, &p).unwrap();
        for v in [r.accuracy, r.precision, r.recall, r.f1, r.roc_auc] {
            assert!((0.0..=1.0).contains(&v), "{}", v);
        }
        assert!((r.accuracy - 0.75).abs() < 1e-12);
    }

    #[test]
    fn roc_curve_spans_unit_square() {
        let pts = roc_curve(&[0, 0, 1, 1], &[0.1, 0.4, 0.35, 0.8]);
        assert_eq!(pts.first(), Some(&(0.0, 0.0)));
        assert_eq!(pts.last(), Some(&(1.0, 1.0)));
        assert_eq!(pts.len(), 5);
    }
}
