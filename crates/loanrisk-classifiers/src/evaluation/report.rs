//! Plain-text classification reports.
use crate::evaluation::metrics::ConfusionMatrix;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassStats {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class breakdown in the familiar precision / recall / f1 / support layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub classes: [ClassStats; 2],
    pub accuracy: f64,
    pub macro_avg: ClassStats,
    pub weighted_avg: ClassStats,
    pub confusion: ConfusionMatrix,
}

impl ClassificationReport {
    pub fn from_confusion(cm: &ConfusionMatrix) -> Self {
        let stats = |class: u8| ClassStats {
            precision: cm.precision(class),
            recall: cm.recall(class),
            f1: cm.f1(class),
            support: cm.support(class),
        };
        let classes = [stats(0), stats(1)];
        let total = cm.total();

        let macro_avg = ClassStats {
            precision: (classes[0].precision + classes[1].precision) / 2.0,
            recall: (classes[0].recall + classes[1].recall) / 2.0,
            f1: (classes[0].f1 + classes[1].f1) / 2.0,
            support: total,
        };
        let weighted = |f: fn(&ClassStats) -> f64| {
            if total == 0 {
                0.0
            } else {
                classes
                    .iter()
                    .map(|c| f(c) * c.support as f64)
                    .sum::<f64>()
                    / total as f64
            }
        };
        let weighted_avg = ClassStats {
            precision: weighted(|c| c.precision),
            recall: weighted(|c| c.recall),
            f1: weighted(|c| c.f1),
            support: total,
        };

        Self {
            classes,
            accuracy: cm.accuracy(),
            macro_avg,
            weighted_avg,
            confusion: *cm,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{:>12} {:>10} {:>10} {:>10} {:>10}\n\n",
            "", "precision", "recall", "f1-score", "support"
        ));
        for (class, s) in self.classes.iter().enumerate() {
            out.push_str(&row(&class.to_string(), s));
        }
        out.push('\n');
        out.push_str(&format!(
            "{:>12} {:>10} {:>10} {:>10.2} {:>10}\n",
            "accuracy",
            "",
            "",
            self.accuracy,
            self.macro_avg.support
        ));
        out.push_str(&row("macro avg", &self.macro_avg));
        out.push_str(&row("weighted avg", &self.weighted_avg));

        let m = self.confusion.as_array();
        out.push_str("\nConfusion Matrix:\n");
        out.push_str(&format!("[[{:>6} {:>6}]\n", m[0][0], m[0][1]));
        out.push_str(&format!(" [{:>6} {:>6}]]\n", m[1][0], m[1][1]));
        out
    }
}

fn row(label: &str, s: &ClassStats) -> String {
    format!(
        "{:>12} {:>10.2} {:>10.2} {:>10.2} {:>10}\n",
        label, s.precision, s.recall, s.f1, s.support
    )
}
