//! loanrisk-classifiers: training pipeline for loan default prediction.
//!
//! This crate loads a tabular loan dataset, encodes and scales its features,
//! performs a stratified train/test split, fits three classifier families
//! (logistic regression, random forest, gradient boosted trees) behind a
//! common trait, evaluates them on the held-out rows and persists every
//! fitted artifact so a later run can score new applications.
//!
//! The stages are driven by [`trainer::TrainingOrchestrator`]; each stage is
//! a small module that can be used and tested on its own.
pub mod config;
pub mod data_handling;
pub mod error;
pub mod evaluation;
pub mod inference;
pub mod io;
pub mod models;
pub mod preprocessing;
pub mod report;
pub mod schema;
pub mod split;
pub mod store;
pub mod trainer;

pub use error::{PipelineError, Result};
