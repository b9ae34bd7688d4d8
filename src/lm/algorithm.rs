//! Implementation of the Levenberg-Marquardt algorithm.
//!
//! Each iteration solves the damped normal equations
//!
//! ```text
//! (JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr
//! ```
//!
//! with a Cholesky factorization (LU when the damped matrix is not positive
//! definite). Accepted steps decrease λ, rejected steps increase it. Only
//! accepted steps and the linearized model at the current point can signal
//! convergence; a run whose λ saturates without a decrease fails.

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};
use std::fmt;

use crate::error::{Result, SpecFitError};
use crate::problem::Problem;
use crate::utils::finite_difference;
use crate::utils::matrix_convert::{
    nalgebra_vec_to_ndarray, ndarray_to_nalgebra, ndarray_vec_to_nalgebra,
};

use super::config::{DiffMethod, LmConfig};

/// Result of the Levenberg-Marquardt optimization.
#[derive(Debug, Clone)]
pub struct LmResult {
    /// Optimized parameter values
    pub params: Array1<f64>,

    /// Residuals at the solution
    pub residuals: Array1<f64>,

    /// Sum of squared residuals
    pub cost: f64,

    /// Number of accepted steps
    pub iterations: usize,

    /// Number of function evaluations
    pub func_evals: usize,

    /// Whether the optimization converged
    pub success: bool,

    /// A message describing the result
    pub message: String,

    /// The Jacobian matrix at the solution (if requested)
    pub jacobian: Option<Array2<f64>>,
}

impl fmt::Display for LmResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Result:")?;
        writeln!(f, "  Success: {}", self.success)?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.func_evals)?;
        writeln!(f, "  Parameters: {:?}", self.params)?;
        Ok(())
    }
}

/// State at the current accepted point.
struct State {
    params: Array1<f64>,
    residuals: Array1<f64>,
    cost: f64,
    iterations: usize,
    func_evals: usize,
}

fn sum_of_squares(residuals: &Array1<f64>) -> f64 {
    residuals.iter().map(|r| r.powi(2)).sum()
}

/// The Levenberg-Marquardt optimizer.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    /// Configuration options
    config: LmConfig,
}

impl LevenbergMarquardt {
    /// Create a new Levenberg-Marquardt optimizer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new Levenberg-Marquardt optimizer with the given configuration.
    pub fn with_config(config: LmConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set the tolerance for the relative decrease of the cost.
    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.config.ftol = ftol;
        self
    }

    /// Set the tolerance for the relative change of the parameters.
    pub fn with_xtol(mut self, xtol: f64) -> Self {
        self.config.xtol = xtol;
        self
    }

    /// Set the tolerance for the gradient.
    pub fn with_gtol(mut self, gtol: f64) -> Self {
        self.config.gtol = gtol;
        self
    }

    /// Set the initial value for the damping parameter.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.config.initial_lambda = lambda;
        self
    }

    /// Set the method used for calculating the Jacobian.
    pub fn with_differentiation_method(mut self, method: DiffMethod) -> Self {
        self.config.diff_method = method;
        self
    }

    /// Set whether to calculate and return the Jacobian at the solution.
    pub fn with_calc_jacobian(mut self, calc_jacobian: bool) -> Self {
        self.config.calc_jacobian = calc_jacobian;
        self
    }

    /// Minimize the sum of squared residuals for the given problem.
    ///
    /// Returns `Ok` with `success == false` when the iteration limit is
    /// reached or the damping parameter hits its maximum; errors are reserved
    /// for problems that cannot be evaluated.
    pub fn minimize<P: Problem>(&self, problem: &P, initial_params: Array1<f64>) -> Result<LmResult> {
        let n_params = problem.parameter_count();
        if initial_params.len() != n_params {
            return Err(SpecFitError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                n_params,
                initial_params.len()
            )));
        }

        let residuals = problem.eval(&initial_params)?;
        let cost = sum_of_squares(&residuals);
        if !cost.is_finite() {
            return Err(SpecFitError::InvalidInput(
                "residuals are not finite at the initial parameters".to_string(),
            ));
        }

        let mut state = State {
            params: initial_params,
            residuals,
            cost,
            iterations: 0,
            func_evals: 1,
        };
        let mut lambda = self.config.initial_lambda;

        loop {
            if state.iterations >= self.config.max_iterations {
                let message = format!(
                    "Maximum iterations ({}) reached",
                    self.config.max_iterations
                );
                return self.finish(problem, state, false, message);
            }

            let jac = self.jacobian(problem, &state.params, &mut state.func_evals)?;
            let j = ndarray_to_nalgebra(&jac);
            let r = ndarray_vec_to_nalgebra(&state.residuals);

            let jtj = j.transpose() * &j;
            let g = j.transpose() * &r;

            let gradient_norm = g.amax();
            if gradient_norm <= self.config.gtol {
                let message = format!(
                    "Gradient convergence: |g| = {:.2e} <= {:.2e}",
                    gradient_norm, self.config.gtol
                );
                return self.finish(problem, state, true, message);
            }

            // Try steps with increasing damping until one decreases the cost.
            let mut first_attempt = true;
            loop {
                let step = match solve_damped(&jtj, &g, lambda) {
                    Some(step) => step,
                    None => {
                        first_attempt = false;
                        lambda *= self.config.lambda_up_factor;
                        if lambda >= self.config.max_lambda {
                            return self.finish(
                                problem,
                                state,
                                false,
                                "Singular normal equations, and lambda reached maximum".to_string(),
                            );
                        }
                        continue;
                    }
                };

                if first_attempt {
                    first_attempt = false;
                    let predicted = state.cost - (&r + &j * &step).norm_squared();
                    if predicted <= self.config.ftol * state.cost {
                        let message = format!(
                            "Predicted reduction {:.2e} <= ftol * cost at the current parameters",
                            predicted
                        );
                        return self.finish(problem, state, true, message);
                    }
                }

                let step = nalgebra_vec_to_ndarray(&step);
                let new_params = &state.params + &step;
                let new_residuals = problem.eval(&new_params)?;
                state.func_evals += 1;
                let new_cost = sum_of_squares(&new_residuals);

                let step_norm = step.iter().map(|s| s * s).sum::<f64>().sqrt();
                let param_norm = state.params.iter().map(|p| p * p).sum::<f64>().sqrt();
                let param_change = step_norm / (param_norm + self.config.xtol);

                if new_cost.is_finite() && new_cost < state.cost {
                    let cost_change = (state.cost - new_cost) / state.cost;

                    state.params = new_params;
                    state.residuals = new_residuals;
                    state.cost = new_cost;
                    state.iterations += 1;
                    lambda = (lambda * self.config.lambda_down_factor).max(self.config.min_lambda);

                    log::debug!(
                        "LM iteration {}: cost = {:.6e}, lambda = {:.2e}",
                        state.iterations,
                        state.cost,
                        lambda
                    );

                    if new_cost == 0.0 {
                        return self.finish(problem, state, true, "Zero residual".to_string());
                    }
                    if param_change < self.config.xtol {
                        let message = format!(
                            "Parameter convergence: |dx|/|x| = {:.2e} < {:.2e}",
                            param_change, self.config.xtol
                        );
                        return self.finish(problem, state, true, message);
                    }
                    if cost_change < self.config.ftol {
                        let message = format!(
                            "Cost convergence: |df|/|f| = {:.2e} < {:.2e}",
                            cost_change, self.config.ftol
                        );
                        return self.finish(problem, state, true, message);
                    }
                    break;
                }

                lambda *= self.config.lambda_up_factor;
                if lambda >= self.config.max_lambda {
                    return self.finish(
                        problem,
                        state,
                        false,
                        "Failed to decrease cost, and lambda reached maximum".to_string(),
                    );
                }
            }
        }
    }

    fn jacobian<P: Problem>(
        &self,
        problem: &P,
        params: &Array1<f64>,
        func_evals: &mut usize,
    ) -> Result<Array2<f64>> {
        if self.config.diff_method == DiffMethod::Analytical && problem.has_custom_jacobian() {
            problem.jacobian(params)
        } else {
            *func_evals += params.len() + 1;
            finite_difference::jacobian(problem, params, None)
        }
    }

    fn finish<P: Problem>(
        &self,
        problem: &P,
        state: State,
        success: bool,
        message: String,
    ) -> Result<LmResult> {
        let jacobian = if self.config.calc_jacobian {
            let mut evals = state.func_evals;
            let jac = self.jacobian(problem, &state.params, &mut evals)?;
            Some(jac)
        } else {
            None
        };

        if success {
            log::debug!("LM finished after {} iterations: {}", state.iterations, message);
        } else {
            log::warn!("LM stopped after {} iterations: {}", state.iterations, message);
        }

        Ok(LmResult {
            params: state.params,
            residuals: state.residuals,
            cost: state.cost,
            iterations: state.iterations,
            func_evals: state.func_evals,
            success,
            message,
            jacobian,
        })
    }
}

/// Solve `(JᵀJ + λ·diag(JᵀJ)) δ = -g`.
fn solve_damped(jtj: &DMatrix<f64>, g: &DVector<f64>, lambda: f64) -> Option<DVector<f64>> {
    let mut a = jtj.clone();
    for i in 0..a.nrows() {
        a[(i, i)] += lambda * jtj[(i, i)].max(f64::EPSILON);
    }
    let rhs = -g;

    let step = match a.clone().cholesky() {
        Some(chol) => chol.solve(&rhs),
        None => a.lu().solve(&rhs)?,
    };

    if step.iter().all(|s| s.is_finite()) {
        Some(step)
    } else {
        None
    }
}
