//! # Covariance Matrices
//!
//! [`CovarianceMatrix`] is a dense square matrix whose dimension is checked
//! whenever it is built or combined with a derivative vector. The free
//! functions estimate a covariance matrix from the Jacobian of a weighted
//! least-squares problem and derive standard errors and correlations.

use std::fmt;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpecFitError};
use crate::utils::matrix_convert::{nalgebra_to_ndarray, ndarray_to_nalgebra};

/// A square `N×N` covariance matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct CovarianceMatrix {
    data: Array2<f64>,
}

impl CovarianceMatrix {
    /// An `n×n` matrix of zeros.
    pub fn zeros(n: usize) -> Self {
        Self {
            data: Array2::zeros((n, n)),
        }
    }

    /// Wrap an existing array, which must be square.
    pub fn from_array(data: Array2<f64>) -> Result<Self> {
        if data.nrows() != data.ncols() {
            return Err(SpecFitError::CovarianceFormatError(format!(
                "covariance matrix must be square, got {}x{}",
                data.nrows(),
                data.ncols()
            )));
        }
        Ok(Self { data })
    }

    /// Build from rows; every row must have as many entries as there are rows.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != n) {
            return Err(SpecFitError::CovarianceFormatError(format!(
                "row {} has {} columns, expected {}",
                i + 1,
                row.len(),
                n
            )));
        }
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        let data = Array2::from_shape_vec((n, n), flat)
            .map_err(|e| SpecFitError::CovarianceFormatError(e.to_string()))?;
        Ok(Self { data })
    }

    /// Dimension `N`.
    pub fn dim(&self) -> usize {
        self.data.nrows()
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.data.get((i, j)).copied()
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.data
    }

    /// Iterate over the rows.
    pub fn rows(&self) -> impl Iterator<Item = Vec<f64>> + '_ {
        self.data.outer_iter().map(|row| row.to_vec())
    }

    /// Multiply every entry by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            data: &self.data * factor,
        }
    }

    /// `dᵀ·C·d` for a vector of matching length.
    pub fn quadratic_form(&self, d: &Array1<f64>) -> Result<f64> {
        if d.len() != self.dim() {
            return Err(SpecFitError::CovarianceSizeMismatch {
                expected: d.len(),
                found: self.dim(),
            });
        }
        Ok(d.dot(&self.data.dot(d)))
    }

    /// Square roots of the diagonal; negative variances give 0.
    pub fn standard_errors(&self) -> Array1<f64> {
        standard_errors_from_covariance(&self.data)
    }

    /// The correlation matrix.
    pub fn correlation(&self) -> Array2<f64> {
        calculate_correlation(&self.data)
    }
}

impl TryFrom<Vec<Vec<f64>>> for CovarianceMatrix {
    type Error = SpecFitError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self> {
        Self::from_rows(rows)
    }
}

impl From<CovarianceMatrix> for Vec<Vec<f64>> {
    fn from(matrix: CovarianceMatrix) -> Self {
        matrix.rows().collect()
    }
}

impl fmt::Display for CovarianceMatrix {
    /// One row per line, entries separated by single spaces.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.data.outer_iter() {
            let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}

/// Calculate the covariance matrix from the Jacobian of the (weighted)
/// residuals.
///
///   covar = scale * inv(J^T * J)
///
/// where `scale` is 1 for residuals divided by their standard errors, or the
/// reduced chi-square when the data carried no errors.
pub fn calculate_covariance(jacobian: &Array2<f64>, scale: f64) -> Result<CovarianceMatrix> {
    let j = ndarray_to_nalgebra(jacobian);
    let jtj = j.transpose() * &j;

    let inverse = jtj.try_inverse().ok_or(SpecFitError::SingularMatrix)?;
    if inverse.iter().any(|v| !v.is_finite()) {
        return Err(SpecFitError::SingularMatrix);
    }

    let covar = nalgebra_to_ndarray(&inverse) * scale;

    // Symmetrize against round-off.
    let symmetric = (&covar + &covar.t()) * 0.5;
    CovarianceMatrix::from_array(symmetric)
}

/// Calculate correlation matrix from covariance matrix.
///
///   correl[i,j] = covar[i,j] / sqrt(covar[i,i] * covar[j,j])
pub fn calculate_correlation(covar: &Array2<f64>) -> Array2<f64> {
    let n = covar.nrows();
    let mut correl = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..n {
            if i == j {
                correl[[i, j]] = 1.0;
            } else {
                let denom = (covar[[i, i]] * covar[[j, j]]).sqrt();
                if denom > 0.0 {
                    correl[[i, j]] = covar[[i, j]] / denom;
                }
            }
        }
    }

    correl
}

/// Extract standard errors from the covariance matrix.
pub fn standard_errors_from_covariance(covar: &Array2<f64>) -> Array1<f64> {
    covar
        .diag()
        .mapv(|v| if v > 0.0 { v.sqrt() } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{arr2, array};

    #[test]
    fn test_calculate_covariance() {
        let jacobian = arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);

        let covar = calculate_covariance(&jacobian, 2.0).unwrap();
        assert_eq!(covar.dim(), 2);

        // J^T J = [[35, 44], [44, 56]], det = 24
        assert_relative_eq!(covar.get(0, 0).unwrap(), 2.0 * 56.0 / 24.0, epsilon = 1e-10);
        assert_relative_eq!(covar.get(1, 1).unwrap(), 2.0 * 35.0 / 24.0, epsilon = 1e-10);
        assert_relative_eq!(covar.get(0, 1).unwrap(), -2.0 * 44.0 / 24.0, epsilon = 1e-10);
        assert_eq!(covar.get(0, 1), covar.get(1, 0));
    }

    #[test]
    fn test_singular_jacobian() {
        let jacobian = arr2(&[[1.0, 2.0], [2.0, 4.0]]);
        assert!(matches!(
            calculate_covariance(&jacobian, 1.0),
            Err(SpecFitError::SingularMatrix)
        ));
    }

    #[test]
    fn test_calculate_correlation() {
        let covar = arr2(&[[0.1, 0.05], [0.05, 0.2]]);
        let correl = calculate_correlation(&covar);

        assert_eq!(correl[[0, 0]], 1.0);
        assert_eq!(correl[[1, 1]], 1.0);
        let expected = 0.05 / (0.1f64 * 0.2f64).sqrt();
        assert_relative_eq!(correl[[0, 1]], expected, epsilon = 1e-10);
        assert_relative_eq!(correl[[1, 0]], expected, epsilon = 1e-10);
    }

    #[test]
    fn test_standard_errors() {
        let covar = CovarianceMatrix::from_rows(vec![vec![0.1, 0.05], vec![0.05, 0.2]]).unwrap();
        let errors = covar.standard_errors();
        assert_relative_eq!(errors[0], 0.1f64.sqrt());
        assert_relative_eq!(errors[1], 0.2f64.sqrt());
    }

    #[test]
    fn test_from_rows_rejects_ragged_input() {
        let ragged = vec![vec![1.0, 0.0], vec![0.0]];
        assert!(matches!(
            CovarianceMatrix::from_rows(ragged),
            Err(SpecFitError::CovarianceFormatError(_))
        ));

        let wide = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]];
        assert!(CovarianceMatrix::from_rows(wide).is_err());
        assert!(CovarianceMatrix::from_array(Array2::zeros((2, 3))).is_err());
    }

    #[test]
    fn test_quadratic_form() {
        let covar = CovarianceMatrix::from_rows(vec![vec![4.0, 1.0], vec![1.0, 9.0]]).unwrap();
        let d = array![1.0, 2.0];
        // 4 + 2*2*1 + 4*9
        assert_relative_eq!(covar.quadratic_form(&d).unwrap(), 44.0);

        assert!(matches!(
            covar.quadratic_form(&array![1.0]),
            Err(SpecFitError::CovarianceSizeMismatch { expected: 1, found: 2 })
        ));
        assert_eq!(CovarianceMatrix::zeros(2).quadratic_form(&d).unwrap(), 0.0);
    }

    #[test]
    fn test_display_and_serde() {
        let covar = CovarianceMatrix::from_rows(vec![vec![1.5, -0.25], vec![-0.25, 2.0]]).unwrap();
        assert_eq!(covar.to_string(), "1.5 -0.25\n-0.25 2\n");

        let json = serde_json::to_string(&covar).unwrap();
        assert_eq!(json, "[[1.5,-0.25],[-0.25,2.0]]");
        let back: CovarianceMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(back, covar);
        assert!(serde_json::from_str::<CovarianceMatrix>("[[1.0],[2.0]]").is_err());
    }
}
