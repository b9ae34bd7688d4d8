//! Finite difference approximations.

use crate::error::{Result, SpecFitError};
use crate::problem::Problem;
use ndarray::{Array1, Array2};

/// Default relative step size.
const DEFAULT_EPSILON: f64 = 1e-8;

/// Step for a point at `value`, scaled with its magnitude.
fn step_for(value: f64, eps: f64) -> f64 {
    if value.abs() > eps {
        value.abs() * eps
    } else {
        eps
    }
}

/// Compute the Jacobian of the residuals using forward differences:
/// `J[i,j] = ∂residual[i]/∂param[j]`.
pub fn jacobian(
    problem: &dyn Problem,
    params: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>> {
    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);
    let n_params = params.len();
    let n_residuals = problem.residual_count();

    let residuals = problem.eval(params)?;
    if residuals.len() != n_residuals {
        return Err(SpecFitError::DimensionMismatch(format!(
            "Expected {} residuals, got {}",
            n_residuals,
            residuals.len()
        )));
    }

    let mut jac = Array2::zeros((n_residuals, n_params));
    for (j, mut column) in jac.columns_mut().into_iter().enumerate() {
        let h = step_for(params[j], eps);
        let mut shifted = params.clone();
        shifted[j] += h;
        let forward = problem.eval(&shifted)?;
        if forward.len() != n_residuals {
            return Err(SpecFitError::DimensionMismatch(format!(
                "Expected {} residuals, got {}",
                n_residuals,
                forward.len()
            )));
        }
        column.assign(&((forward - &residuals) / h));
    }

    Ok(jac)
}

/// Derivative of a scalar function of one variable, by central differences.
///
/// Uses a larger step than [`jacobian`] since the truncation error of the
/// central formula is second order.
pub fn derivative<F>(f: F, x: f64) -> f64
where
    F: Fn(f64) -> f64,
{
    let h = step_for(x, DEFAULT_EPSILON.sqrt() * 1e-1);
    (f(x + h) - f(x - h)) / (2.0 * h)
}
