use plotly::common::{DashType, Line, Mode};
use plotly::layout::{Axis, BarMode, Layout};
use plotly::{Bar, Plot, Scatter};

use crate::evaluation::{FeatureImportanceTable, ModelEvaluation};

/// One ROC curve per model plus the chance diagonal.
pub fn plot_roc_curves(evaluations: &[ModelEvaluation], title: &str) -> Plot {
    let mut plot = Plot::new();
    for e in evaluations {
        let (fpr, tpr): (Vec<f64>, Vec<f64>) = e.roc_curve.iter().copied().unzip();
        plot.add_trace(
            Scatter::new(fpr, tpr)
                .mode(Mode::Lines)
                .name(format!("{} (AUC {:.3})", e.model(), e.metrics.roc_auc)),
        );
    }
    plot.add_trace(
        Scatter::new(vec![0.0, 1.0], vec![0.0, 1.0])
            .mode(Mode::Lines)
            .name("Chance")
            .line(Line::new().color("grey").dash(DashType::Dash)),
    );
    plot.set_layout(
        Layout::new()
            .title(title)
            .x_axis(Axis::new().title("False positive rate"))
            .y_axis(Axis::new().title("True positive rate")),
    );
    plot
}

/// Grouped bars of the five headline metrics.
pub fn plot_metric_bars(evaluations: &[ModelEvaluation], title: &str) -> Plot {
    let metric_names = vec!["accuracy", "precision", "recall", "f1", "roc_auc"];
    let mut plot = Plot::new();
    for e in evaluations {
        let m = &e.metrics;
        plot.add_trace(
            Bar::new(
                metric_names.clone(),
                vec![m.accuracy, m.precision, m.recall, m.f1, m.roc_auc],
            )
            .name(e.model().display_name()),
        );
    }
    plot.set_layout(
        Layout::new()
            .title(title)
            .bar_mode(BarMode::Group)
            .y_axis(Axis::new().title("Score")),
    );
    plot
}

pub fn plot_feature_importance(table: &FeatureImportanceTable, top_n: usize) -> Plot {
    let rows = table.top(top_n);
    let features: Vec<String> = rows.iter().map(|r| r.feature.clone()).collect();
    let values: Vec<f64> = rows.iter().map(|r| r.importance).collect();

    let mut plot = Plot::new();
    plot.add_trace(Bar::new(features, values).name(table.model.display_name()));
    plot.set_layout(
        Layout::new()
            .title(format!("{} feature importance", table.model).as_str())
            .x_axis(Axis::new().title("Feature"))
            .y_axis(Axis::new().title("Importance")),
    );
    plot
}
