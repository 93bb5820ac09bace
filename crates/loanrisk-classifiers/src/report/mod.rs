pub mod html;
pub mod plots;

pub use html::{render_training_report, Report, ReportSection};
