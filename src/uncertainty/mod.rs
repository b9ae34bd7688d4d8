//! # Uncertainty Calculation
//!
//! This module provides the covariance machinery behind the calibration
//! engine:
//!
//! - [`CovarianceMatrix`], a dimension-checked square matrix
//! - Covariance matrix estimation from Jacobian matrices
//! - Standard errors and correlations of parameter estimates
//! - Monte Carlo propagation of parameter uncertainties into derived values

mod covariance;
mod monte_carlo;

pub use covariance::{
    calculate_correlation, calculate_covariance, standard_errors_from_covariance,
    CovarianceMatrix,
};

pub use monte_carlo::{propagate_uncertainty, sample_parameters};

/// Reduced chi-square `chi2 / ndf`, or `None` without degrees of freedom.
pub fn reduced_chi_square(chi2: f64, ndata: usize, nparams: usize) -> Option<f64> {
    if ndata > nparams {
        Some(chi2 / (ndata - nparams) as f64)
    } else {
        None
    }
}
