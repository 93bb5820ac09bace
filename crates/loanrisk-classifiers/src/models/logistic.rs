//! L2-regularized logistic regression fitted by Newton's method.
//!
//! The objective is `0.5 * |w|^2 + C * sum_i s_i * logloss_i` with balanced
//! sample weights `s_i`; the intercept is not penalized. It is divided by the
//! total sample weight so the gradient tolerance does not depend on the
//! number of rows.
use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::config::ModelKind;
use crate::error::{PipelineError, Result};
use crate::models::classifier_trait::{
    balanced_class_weights, check_prediction_input, check_training_input, ClassifierModel,
};

const KIND: ModelKind = ModelKind::LogisticRegression;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
    /// Inverse regularization strength.
    pub c: f64,
    pub max_iter: usize,
    /// Stop once the largest gradient component falls below this.
    pub tol: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            tol: 1e-6,
        }
    }
}

/// Newton's method is deterministic, so unlike the tree adapters this one
/// takes no seed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogisticRegressionAdapter {
    params: LogisticParams,
    coefficients: Option<Vec<f64>>,
    intercept: f64,
}

impl LogisticRegressionAdapter {
    pub fn new() -> Self {
        Self::with_params(LogisticParams::default())
    }

    pub fn with_params(params: LogisticParams) -> Self {
        Self {
            params,
            coefficients: None,
            intercept: 0.0,
        }
    }

    pub fn coefficients(&self) -> Option<&[f64]> {
        self.coefficients.as_deref()
    }

}

impl ClassifierModel for LogisticRegressionAdapter {
    fn kind(&self) -> ModelKind {
        KIND
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[u8]) -> Result<()> {
        check_training_input(KIND, x, y)?;
        let class_weight = balanced_class_weights(y);
        let weights: Vec<f64> = y.iter().map(|&l| class_weight[l as usize]).collect();
        let problem = Problem {
            x: x.view(),
            y,
            weights: &weights,
            c: self.params.c,
            total_weight: weights.iter().sum(),
        };

        let p = x.ncols();
        let mut theta = Array1::<f64>::zeros(p + 1);
        let mut converged = false;
        let mut iterations = 0;

        for iter in 0..self.params.max_iter {
            iterations = iter + 1;
            let (grad, hess) = problem.gradient_hessian(&theta);
            let g_inf = grad.iter().fold(0.0f64, |m, g| m.max(g.abs()));
            if g_inf < self.params.tol {
                converged = true;
                break;
            }

            let step = cholesky_solve(&hess, &grad)
                .ok_or_else(|| PipelineError::model_fit(KIND, "singular Hessian"))?;
            let decrement = grad.dot(&step);
            if decrement < 1e-16 {
                // Newton decrement vanished; the remaining gradient is round-off.
                converged = true;
                break;
            }

            let current = problem.objective(&theta);
            let mut t = 1.0;
            let mut accepted = false;
            for _ in 0..60 {
                let candidate = &theta - &(&step * t);
                if problem.objective(&candidate) <= current - 1e-4 * t * decrement {
                    theta = candidate;
                    accepted = true;
                    break;
                }
                t *= 0.5;
            }
            if !accepted {
                return Err(PipelineError::model_fit(
                    KIND,
                    format!("line search failed at iteration {}", iterations),
                ));
            }
        }

        if !converged {
            return Err(PipelineError::model_fit(
                KIND,
                format!("did not converge within {} iterations", self.params.max_iter),
            ));
        }

        log::debug!("Logistic regression converged after {} Newton steps", iterations);
        self.intercept = theta[p];
        self.coefficients = Some(theta.iter().take(p).copied().collect());
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
        check_prediction_input(KIND, x, self.coefficients.as_ref().map(Vec::len))?;
        let w = self.coefficients.as_deref().unwrap_or_default();
        Ok(x
            .rows()
            .into_iter()
            .map(|row| {
                let z = row.iter().zip(w).map(|(a, b)| a * b).sum::<f64>() + self.intercept;
                sigmoid(z)
            })
            .collect())
    }

    fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| PipelineError::model_fit(KIND, e.to_string()))
    }
}

struct Problem<'a> {
    x: ArrayView2<'a, f64>,
    y: &'a [u8],
    weights: &'a [f64],
    c: f64,
    total_weight: f64,
}

impl Problem<'_> {
    fn margins(&self, theta: &Array1<f64>) -> Vec<f64> {
        let p = self.x.ncols();
        self.x
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .zip(theta.iter())
                    .map(|(a, b)| a * b)
                    .sum::<f64>()
                    + theta[p]
            })
            .collect()
    }

    fn objective(&self, theta: &Array1<f64>) -> f64 {
        let p = self.x.ncols();
        let loss: f64 = self
            .margins(theta)
            .iter()
            .zip(self.y)
            .zip(self.weights)
            .map(|((&z, &y), &s)| s * (softplus(z) - f64::from(y) * z))
            .sum();
        let penalty: f64 = theta.iter().take(p).map(|w| w * w).sum::<f64>() * 0.5;
        (self.c * loss + penalty) / self.total_weight
    }

    fn gradient_hessian(&self, theta: &Array1<f64>) -> (Array1<f64>, Array2<f64>) {
        let p = self.x.ncols();
        let mut grad = Array1::<f64>::zeros(p + 1);
        let mut hess = Array2::<f64>::zeros((p + 1, p + 1));

        for (i, (row, z)) in self.x.rows().into_iter().zip(self.margins(theta)).enumerate() {
            let prob = sigmoid(z);
            let r = self.c * self.weights[i] * (prob - f64::from(self.y[i]));
            let h = self.c * self.weights[i] * prob * (1.0 - prob);
            for a in 0..=p {
                let xa = if a == p { 1.0 } else { row[a] };
                grad[a] += r * xa;
                for b in 0..=a {
                    let xb = if b == p { 1.0 } else { row[b] };
                    hess[[a, b]] += h * xa * xb;
                }
            }
        }
        for a in 0..p {
            grad[a] += theta[a];
            hess[[a, a]] += 1.0;
        }
        for a in 0..=p {
            for b in 0..a {
                hess[[b, a]] = hess[[a, b]];
            }
        }
        grad.mapv_inplace(|g| g / self.total_weight);
        hess.mapv_inplace(|h| h / self.total_weight);
        (grad, hess)
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^z)` without overflow.
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

/// Solve `a * x = b` for symmetric positive definite `a`.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 1e-14 || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
        y[i] = (b[i] - sum) / l[[i, i]];
    }
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (y[i] - sum) / l[[i, i]];
    }
    Some(x)
}
