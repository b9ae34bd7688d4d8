//! Problem definition trait.
//!
//! This module defines the `Problem` trait, which represents a nonlinear
//! least squares problem to be solved with the Levenberg-Marquardt algorithm.

use crate::error::Result;
use ndarray::{Array1, Array2};

/// A trait representing a nonlinear least squares problem.
///
/// This trait defines the interface for problems that can be solved using
/// the Levenberg-Marquardt algorithm.
pub trait Problem {
    /// Evaluate the residuals at the given parameters.
    ///
    /// This function calculates the vector of residuals (differences between
    /// the model and the data, usually divided by the data uncertainty) at the
    /// given parameter values.
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>>;

    /// Get the number of parameters in the problem.
    fn parameter_count(&self) -> usize;

    /// Get the number of residuals in the problem.
    fn residual_count(&self) -> usize;

    /// Evaluate the Jacobian matrix at the given parameters.
    ///
    /// The default implementation uses forward finite differences.
    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>>
    where
        Self: Sized,
    {
        crate::utils::finite_difference::jacobian(self, params, None)
    }

    /// Check if this problem provides a custom Jacobian implementation.
    ///
    /// If this returns false, the optimizer may compute the Jacobian by finite
    /// differences regardless of the configured method.
    fn has_custom_jacobian(&self) -> bool {
        false
    }

    /// Evaluate the sum of squared residuals at the given parameters.
    fn eval_cost(&self, params: &Array1<f64>) -> Result<f64> {
        let residuals = self.eval(params)?;
        Ok(residuals.iter().map(|r| r.powi(2)).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    /// Residuals of the line `y = a*x + b` against three points.
    struct LineProblem {
        x: Array1<f64>,
        y: Array1<f64>,
    }

    impl Problem for LineProblem {
        fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
            Ok(&self.x * params[0] + params[1] - &self.y)
        }

        fn parameter_count(&self) -> usize {
            2
        }

        fn residual_count(&self) -> usize {
            self.x.len()
        }
    }

    #[test]
    fn test_default_jacobian_and_cost() {
        let problem = LineProblem {
            x: array![0.0, 1.0, 2.0],
            y: array![1.0, 3.0, 5.0],
        };

        let params = array![2.0, 1.0];
        assert_relative_eq!(problem.eval_cost(&params).unwrap(), 0.0);
        assert_relative_eq!(problem.eval_cost(&array![2.0, 2.0]).unwrap(), 3.0);

        let jac = problem.jacobian(&params).unwrap();
        assert_eq!(jac.shape(), &[3, 2]);
        assert_relative_eq!(jac[[2, 0]], 2.0, epsilon = 1e-6);
        assert_relative_eq!(jac[[2, 1]], 1.0, epsilon = 1e-6);
        assert!(!problem.has_custom_jacobian());
    }
}
