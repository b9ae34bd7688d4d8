//! Parametric curves with analytic parameter derivatives.

use std::fmt;

use ndarray::Array1;

use crate::error::{Result, SpecFitError};

/// A curve `y = f(x; p)` with `N` parameters.
///
/// Implementors provide the partial derivatives `∂f/∂p_i`; they feed both the
/// fit's Jacobian and the analytic error of the fitted curve.
pub trait CurveFunction {
    /// Number of parameters `N`.
    fn parameter_count(&self) -> usize;

    /// Value of the curve at `x`.
    fn eval(&self, x: f64, params: &[f64]) -> f64;

    /// `∂f/∂p_index` at `x`.
    fn derivative(&self, index: usize, x: f64, params: &[f64]) -> f64;

    /// Display name of a parameter: `a`, `b`, `c`, ...
    fn parameter_name(&self, index: usize) -> String {
        match u8::try_from(index) {
            Ok(i) if i < 26 => char::from(b'a' + i).to_string(),
            _ => format!("p{}", index),
        }
    }

    /// Starting parameters when nothing better is known.
    fn initial_parameters(&self) -> Vec<f64> {
        vec![1.0; self.parameter_count()]
    }

    /// Starting parameters estimated from the data, if the curve knows how.
    fn initial_guess(&self, _x: &[f64], _y: &[f64]) -> Option<Vec<f64>> {
        None
    }

    /// All partial derivatives at `x`, checking the parameter count.
    fn derivatives(&self, x: f64, params: &[f64]) -> Result<Array1<f64>> {
        let n = self.parameter_count();
        if params.len() != n {
            return Err(SpecFitError::ParameterCountMismatch {
                expected: n,
                found: params.len(),
            });
        }
        Ok((0..n).map(|i| self.derivative(i, x, params)).collect())
    }
}

/// A boxed curve value or derivative function.
pub type CurveFn = Box<dyn Fn(f64, &[f64]) -> f64 + Send + Sync>;

/// A curve assembled from closures.
///
/// The number of parameters is the number of registered derivatives.
///
/// ```rust
/// use specfit_rs::curve::{CurveFunction, FnCurve};
///
/// // y = a + b*x
/// let line = FnCurve::from_fn(|x, p| p[0] + p[1] * x)
///     .with_derivative(|_, _| 1.0)
///     .with_derivative(|x, _| x);
/// assert_eq!(line.parameter_count(), 2);
/// assert_eq!(line.eval(2.0, &[1.0, 3.0]), 7.0);
/// ```
pub struct FnCurve {
    value: CurveFn,
    derivatives: Vec<CurveFn>,
}

impl FnCurve {
    pub fn new(value: CurveFn, derivatives: Vec<CurveFn>) -> Self {
        Self { value, derivatives }
    }

    /// Start a curve without parameters; add them with
    /// [`with_derivative`](Self::with_derivative).
    pub fn from_fn<F>(value: F) -> Self
    where
        F: Fn(f64, &[f64]) -> f64 + Send + Sync + 'static,
    {
        Self::new(Box::new(value), Vec::new())
    }

    /// Register the derivative with respect to the next parameter.
    pub fn with_derivative<D>(mut self, derivative: D) -> Self
    where
        D: Fn(f64, &[f64]) -> f64 + Send + Sync + 'static,
    {
        self.derivatives.push(Box::new(derivative));
        self
    }
}

impl fmt::Debug for FnCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCurve")
            .field("parameters", &self.derivatives.len())
            .finish()
    }
}

impl CurveFunction for FnCurve {
    fn parameter_count(&self) -> usize {
        self.derivatives.len()
    }

    fn eval(&self, x: f64, params: &[f64]) -> f64 {
        (self.value)(x, params)
    }

    /// NaN for an index past the registered derivatives.
    fn derivative(&self, index: usize, x: f64, params: &[f64]) -> f64 {
        self.derivatives
            .get(index)
            .map_or(f64::NAN, |d| d(x, params))
    }
}
