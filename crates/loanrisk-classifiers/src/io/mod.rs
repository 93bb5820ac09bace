//! Readers for the loan application table.

pub mod loan_csv;

pub use loan_csv::{read_inference_csv, read_loan_csv, read_loan_table};
