//! Per-column standardization fitted on the training partition.
//!
//! Columns whose training standard deviation is (near) zero carry no
//! information; they transform to `0.0` instead of dividing by zero.
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::error::{PipelineError, Result};

/// Standard scaler (per-column mean / population std).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub feature_names: Vec<String>,
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Scaler {
    /// Below this the column is treated as constant.
    const MIN_STD: f64 = 1e-9;

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn is_constant(&self, column: usize) -> bool {
        self.std[column] < Self::MIN_STD
    }

    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        transform_all(x, self)
    }
}

/// Fit a `Scaler` from a matrix where rows are samples and columns follow
/// `feature_names`.
pub fn fit_scaler(x: ArrayView2<'_, f64>, feature_names: &[String]) -> Result<Scaler> {
    let (nrows, ncols) = x.dim();
    if nrows == 0 || ncols == 0 {
        return Err(PipelineError::InputSchema(
            "cannot fit a scaler on an empty matrix".to_string(),
        ));
    }
    if ncols != feature_names.len() {
        return Err(PipelineError::InputSchema(format!(
            "scaler got {} columns for {} feature names",
            ncols,
            feature_names.len()
        )));
    }

    let mut mean = Vec::with_capacity(ncols);
    let mut std = Vec::with_capacity(ncols);
    for column in x.axis_iter(Axis(1)) {
        mean.push(column.iter().mean());
        std.push(column.iter().population_std_dev());
    }

    for (name, s) in feature_names.iter().zip(std.iter()) {
        if *s < Scaler::MIN_STD {
            log::debug!("Column '{}' is constant on the training rows", name);
        }
    }

    Ok(Scaler {
        feature_names: feature_names.to_vec(),
        mean,
        std,
    })
}

/// Transform all rows using the provided `Scaler`.
pub fn transform_all(x: ArrayView2<'_, f64>, sc: &Scaler) -> Result<Array2<f64>> {
    if x.ncols() != sc.n_features() {
        return Err(PipelineError::InputSchema(format!(
            "scaler was fitted on {} columns, got {}",
            sc.n_features(),
            x.ncols()
        )));
    }
    let mut out = x.to_owned();
    for (c, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
        if sc.is_constant(c) {
            column.fill(0.0);
        } else {
            let (m, s) = (sc.mean[c], sc.std[c]);
            column.mapv_inplace(|v| (v - m) / s);
        }
    }
    Ok(out)
}
