use std::cmp::Ordering;

use crate::evaluation::metrics::MetricReport;

/// ROC-AUC descending, then F1 descending, then the fixed family order.
pub fn ranking_order(a: &MetricReport, b: &MetricReport) -> Ordering {
    b.roc_auc
        .total_cmp(&a.roc_auc)
        .then_with(|| b.f1.total_cmp(&a.f1))
        .then_with(|| a.model.cmp(&b.model))
}

/// Indices of `reports`, best model first.
pub fn rank(reports: &[MetricReport]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..reports.len()).collect();
    order.sort_by(|&i, &j| ranking_order(&reports[i], &reports[j]));
    order
}
