//! Preprocessing state fitted on the training partition.
//!
//! `codec` turns categorical cells into integer codes and produces the
//! numeric feature matrix; `scaler` standardizes that matrix for the linear
//! model. Both are fitted once and are read-only afterwards.
pub mod codec;
pub mod scaler;

pub use codec::{ColumnEncoding, FittedCodec};
pub use scaler::{fit_scaler, transform_all, Scaler};
