//! Self-contained HTML training report rendered with maud.
use maud::{html, Markup, PreEscaped, DOCTYPE};
use plotly::Plot;

use crate::config::ModelKind;
use crate::evaluation::ModelComparison;
use crate::report::plots::{plot_feature_importance, plot_metric_bars, plot_roc_curves};
use crate::store::RunManifest;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.12.1.min.js";

pub struct ReportSection {
    title: String,
    content: Vec<Markup>,
    plots: Vec<Plot>,
}

impl ReportSection {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            content: Vec::new(),
            plots: Vec::new(),
        }
    }

    pub fn add_content(&mut self, content: Markup) {
        self.content.push(content);
    }

    pub fn add_plot(&mut self, plot: Plot) {
        self.plots.push(plot);
    }
}

pub struct Report {
    title: String,
    subtitle: String,
    sections: Vec<ReportSection>,
}

impl Report {
    pub fn new(title: &str, subtitle: &str) -> Self {
        Self {
            title: title.to_string(),
            subtitle: subtitle.to_string(),
            sections: Vec::new(),
        }
    }

    pub fn add_section(&mut self, section: ReportSection) {
        self.sections.push(section);
    }

    pub fn render(&self) -> String {
        let markup = html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="utf-8";
                    title { (self.title) }
                    script src=(PLOTLY_CDN) {}
                    style {
                        "body { font-family: sans-serif; margin: 2em; }
                        table { border-collapse: collapse; }
                        th, td { border: 1px solid #ccc; padding: 4px 10px; text-align: right; }
                        th:first-child, td:first-child { text-align: left; }"
                    }
                }
                body {
                    h1 { (self.title) }
                    p { (self.subtitle) }
                    @for (s, sec) in self.sections.iter().enumerate() {
                        section {
                            h2 { (sec.title) }
                            @for block in &sec.content {
                                (block)
                            }
                            @for (i, plot) in sec.plots.iter().enumerate() {
                                @let id = format!("plot-{}-{}", s, i);
                                (PreEscaped(plot.to_inline_html(Some(&id))))
                            }
                        }
                    }
                }
            }
        };
        markup.into_string()
    }
}

/// Metric table, ROC curves and importance bars for a finished run.
pub fn render_training_report(manifest: &RunManifest, comparison: &ModelComparison) -> String {
    let mut report = Report::new(
        "Loan default model comparison",
        &format!(
            "Run {} with seed {}, {} training rows and {} test rows",
            manifest.created_at, manifest.seed, manifest.n_train, manifest.n_test
        ),
    );

    let mut overview = ReportSection::new("Model comparison");
    overview.add_content(html! {
        table {
            tr {
                th { "Model" } th { "Accuracy" } th { "Precision" } th { "Recall" }
                th { "F1" } th { "ROC-AUC" } th { "Fit (s)" } th { "Predict (ms/row)" }
            }
            @for e in comparison.ranked() {
                tr {
                    td { (e.model().display_name()) }
                    td { (format!("{:.4}", e.metrics.accuracy)) }
                    td { (format!("{:.4}", e.metrics.precision)) }
                    td { (format!("{:.4}", e.metrics.recall)) }
                    td { (format!("{:.4}", e.metrics.f1)) }
                    td { (format!("{:.4}", e.metrics.roc_auc)) }
                    td { (format!("{:.3}", e.timing.fit_seconds)) }
                    td { (format!("{:.4}", e.timing.predict_ms_per_sample)) }
                }
            }
        }
        @if let Some(best) = comparison.best() {
            p { "Best model by ROC-AUC: " strong { (best.model().display_name()) } }
        }
    });
    overview.add_plot(plot_metric_bars(comparison.ranked(), "Test metrics"));
    overview.add_plot(plot_roc_curves(comparison.ranked(), "ROC curves"));
    report.add_section(overview);

    let mut importance = ReportSection::new("Feature importance");
    for kind in ModelKind::ALL {
        if let Some(table) = comparison.get(kind).and_then(|e| e.importance.as_ref()) {
            importance.add_plot(plot_feature_importance(table, 15));
        }
    }
    report.add_section(importance);

    let mut reports = ReportSection::new("Classification reports");
    for e in comparison.ranked() {
        reports.add_content(html! {
            h3 { (e.model().display_name()) }
            pre { (e.report.render()) }
        });
    }
    report.add_section(reports);

    report.render()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_render_in_order() {
        let mut report = Report::new("Title <x>", "sub");
        let mut a = ReportSection::new("First");
        a.add_content(html! { p { "alpha" } });
        report.add_section(a);
        report.add_section(ReportSection::new("Second"));

        let out = report.render();
        assert!(out.starts_with("<!DOCTYPE html>"));
        assert!(out.contains("Title &lt;x&gt;"));
        let first = out.find("First").unwrap();
        let second = out.find("Second").unwrap();
        assert!(first < second);
        assert!(out.contains("<p>alpha</p>"));
    }
}
