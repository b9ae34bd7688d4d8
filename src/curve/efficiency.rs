//! Detector efficiency curves.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::function::CurveFunction;

/// `ε(E) = a + b·E^-c`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerEfficiency;

impl PowerEfficiency {
    pub fn new() -> Self {
        Self
    }
}

impl CurveFunction for PowerEfficiency {
    fn parameter_count(&self) -> usize {
        3
    }

    fn eval(&self, x: f64, params: &[f64]) -> f64 {
        params[0] + params[1] * x.powf(-params[2])
    }

    fn derivative(&self, index: usize, x: f64, params: &[f64]) -> f64 {
        match index {
            0 => 1.0,
            1 => x.powf(-params[2]),
            2 => -params[1] * x.powf(-params[2]) * x.ln(),
            _ => f64::NAN,
        }
    }

    fn initial_parameters(&self) -> Vec<f64> {
        vec![0.0, 1.0, 1.0]
    }
}

/// `ε(E) = exp(Σ p_i · ln(E)^i)` for `i = 0..=degree`.
///
/// Degree 1 is a straight line on a log-log plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPolynomialEfficiency {
    degree: usize,
}

impl LogPolynomialEfficiency {
    pub fn new(degree: usize) -> Self {
        Self { degree }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    fn exponent(&self, x: f64, params: &[f64]) -> f64 {
        let ln_x = x.ln();
        // Horner scheme over ln(x)
        params[..=self.degree]
            .iter()
            .rev()
            .fold(0.0, |acc, p| acc * ln_x + p)
    }
}

impl CurveFunction for LogPolynomialEfficiency {
    fn parameter_count(&self) -> usize {
        self.degree + 1
    }

    fn eval(&self, x: f64, params: &[f64]) -> f64 {
        self.exponent(x, params).exp()
    }

    fn derivative(&self, index: usize, x: f64, params: &[f64]) -> f64 {
        if index > self.degree {
            return f64::NAN;
        }
        self.eval(x, params) * x.ln().powi(index as i32)
    }

    fn initial_parameters(&self) -> Vec<f64> {
        vec![0.0; self.parameter_count()]
    }

    /// Linear least squares of `ln(y)` against powers of `ln(x)`; exact for
    /// noise-free data. Needs positive data.
    fn initial_guess(&self, x: &[f64], y: &[f64]) -> Option<Vec<f64>> {
        let n = self.parameter_count();
        if x.len() != y.len() || x.len() < n {
            return None;
        }
        if x.iter().chain(y.iter()).any(|v| *v <= 0.0 || !v.is_finite()) {
            return None;
        }

        let design = DMatrix::from_fn(x.len(), n, |i, j| x[i].ln().powi(j as i32));
        let target = DVector::from_iterator(y.len(), y.iter().map(|v| v.ln()));

        let guess = design.svd(true, true).solve(&target, 1e-12).ok()?;
        if guess.iter().all(|g| g.is_finite()) {
            Some(guess.iter().copied().collect())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::finite_difference::derivative;
    use approx::assert_relative_eq;

    #[test]
    fn test_power_efficiency() {
        let curve = PowerEfficiency::new();
        let p = [0.01, 3.0, 0.8];
        assert_relative_eq!(curve.eval(100.0, &p), 0.01 + 3.0 * 100f64.powf(-0.8));

        for i in 0..3 {
            let numeric = derivative(
                |v| {
                    let mut q = p;
                    q[i] = v;
                    curve.eval(100.0, &q)
                },
                p[i],
            );
            assert_relative_eq!(curve.derivative(i, 100.0, &p), numeric, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_log_polynomial() {
        let curve = LogPolynomialEfficiency::new(2);
        let p = [1.5, -0.7, 0.02];
        let ln_x = 500f64.ln();
        let expected = (1.5 - 0.7 * ln_x + 0.02 * ln_x * ln_x).exp();
        assert_relative_eq!(curve.eval(500.0, &p), expected, max_relative = 1e-12);

        assert_relative_eq!(curve.derivative(0, 500.0, &p), expected, max_relative = 1e-12);
        assert_relative_eq!(curve.derivative(2, 500.0, &p), expected * ln_x * ln_x, max_relative = 1e-12);
        assert!(curve.derivative(3, 500.0, &p).is_nan());
    }

    #[test]
    fn test_log_polynomial_initial_guess() {
        let curve = LogPolynomialEfficiency::new(1);
        let x = [100.0, 300.0, 700.0, 1200.0];
        let y: Vec<f64> = x.iter().map(|&e| curve.eval(e, &[2.0, -0.8])).collect();

        let guess = curve.initial_guess(&x, &y).unwrap();
        assert_relative_eq!(guess[0], 2.0, epsilon = 1e-9);
        assert_relative_eq!(guess[1], -0.8, epsilon = 1e-9);

        assert!(curve.initial_guess(&x, &[1.0, -1.0, 1.0, 1.0]).is_none());
        assert!(curve.initial_guess(&x[..1], &y[..1]).is_none());
    }
}
