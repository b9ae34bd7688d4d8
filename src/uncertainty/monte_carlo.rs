//! # Monte Carlo Methods for Uncertainty Propagation
//!
//! Parameter vectors are drawn from the multivariate normal distribution
//! `N(p, C)` defined by the best-fit parameters and their covariance matrix,
//! and a derived quantity is evaluated for every draw. The spread of the
//! results is an estimate of the derived quantity's uncertainty that does not
//! rely on linearizing the model.

use nalgebra::linalg::SymmetricEigen;
use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::error::{Result, SpecFitError};
use crate::errvalue::ErrValue;
use crate::utils::matrix_convert::{nalgebra_to_ndarray, ndarray_to_nalgebra};

use super::covariance::CovarianceMatrix;

/// Factor `A` with `A·Aᵀ = C`, from the symmetric eigen-decomposition of
/// `C`. Negative eigenvalues from round-off are clamped to zero.
fn sampling_factor(covar: &CovarianceMatrix) -> Array2<f64> {
    let eigen = SymmetricEigen::new(ndarray_to_nalgebra(covar.as_array()));
    let mut factor = eigen.eigenvectors;
    for (j, lambda) in eigen.eigenvalues.iter().enumerate() {
        let scale = lambda.max(0.0).sqrt();
        factor.column_mut(j).scale_mut(scale);
    }
    nalgebra_to_ndarray(&factor)
}

/// Draw `n_samples` parameter vectors from `N(mean, covar)`.
pub fn sample_parameters<R: Rng + ?Sized>(
    mean: &Array1<f64>,
    covar: &CovarianceMatrix,
    n_samples: usize,
    rng: &mut R,
) -> Result<Vec<Array1<f64>>> {
    let n = mean.len();
    if covar.dim() != n {
        return Err(SpecFitError::CovarianceSizeMismatch {
            expected: n,
            found: covar.dim(),
        });
    }

    let factor = sampling_factor(covar);

    let samples = (0..n_samples)
        .map(|_| {
            let z: Array1<f64> = (0..n).map(|_| StandardNormal.sample(&mut *rng)).collect();
            mean + &factor.dot(&z)
        })
        .collect();

    Ok(samples)
}

/// Propagate the parameter uncertainty into `func` by sampling.
///
/// Returns the sample mean with the sample standard deviation as error.
/// Draws for which `func` is not finite are skipped.
pub fn propagate_uncertainty<R, F>(
    mean: &Array1<f64>,
    covar: &CovarianceMatrix,
    n_samples: usize,
    rng: &mut R,
    func: F,
) -> Result<ErrValue>
where
    R: Rng + ?Sized,
    F: Fn(&Array1<f64>) -> f64,
{
    if n_samples < 2 {
        return Err(SpecFitError::InvalidInput(format!(
            "Monte Carlo propagation needs at least 2 samples, got {}",
            n_samples
        )));
    }

    let values: Vec<f64> = sample_parameters(mean, covar, n_samples, rng)?
        .iter()
        .map(&func)
        .filter(|v| v.is_finite())
        .collect();

    let skipped = n_samples - values.len();
    if skipped > 0 {
        log::warn!("skipped {} non-finite Monte Carlo samples", skipped);
    }
    if values.len() < 2 {
        return Err(SpecFitError::InvalidInput(
            "fewer than 2 finite Monte Carlo samples".to_string(),
        ));
    }

    let count = values.len() as f64;
    let mean_value = values.iter().sum::<f64>() / count;
    let variance = values
        .iter()
        .map(|v| (v - mean_value).powi(2))
        .sum::<f64>()
        / (count - 1.0);

    Ok(ErrValue::new(mean_value, variance.sqrt()))
}
