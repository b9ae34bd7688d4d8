//! Fitted calibration curves with covariance-based uncertainties.

use std::fmt;
use std::path::Path;

use ndarray::{Array1, Array2};
use rand::Rng;

use crate::error::{Result, SpecFitError};
use crate::errvalue::ErrValue;
use crate::flatfile;
use crate::lm::LevenbergMarquardt;
use crate::problem::Problem;
use crate::uncertainty::{calculate_covariance, propagate_uncertainty, reduced_chi_square, CovarianceMatrix};
use crate::utils::finite_difference;

use super::config::CurveFitConfig;
use super::function::CurveFunction;
use super::search;

/// A data item that may carry its own uncertainty.
pub trait Measured {
    fn measured_value(&self) -> f64;

    /// The item's own error, if it has one.
    fn measured_error(&self) -> Option<f64>;
}

impl Measured for f64 {
    fn measured_value(&self) -> f64 {
        *self
    }

    fn measured_error(&self) -> Option<f64> {
        None
    }
}

impl Measured for ErrValue {
    fn measured_value(&self) -> f64 {
        self.value()
    }

    fn measured_error(&self) -> Option<f64> {
        Some(self.error())
    }
}

/// A data point of the last fit, scaled with the curve's normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationPoint {
    pub x: ErrValue,
    pub y: ErrValue,
}

/// Summary of a successful fit.
#[derive(Debug, Clone)]
pub struct FitReport {
    /// Best-fit parameters of the unnormalized curve.
    pub parameters: Array1<f64>,
    pub covariance: CovarianceMatrix,
    /// Weighted sum of squared residuals.
    pub chi2: f64,
    /// Degrees of freedom, points minus parameters.
    pub ndf: usize,
    pub iterations: usize,
}

impl fmt::Display for FitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Fit Report:")?;
        writeln!(f, "  chi2: {:.6e}", self.chi2)?;
        writeln!(f, "  ndf: {}", self.ndf)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        let errors = self.covariance.standard_errors();
        for (i, (p, e)) in self.parameters.iter().zip(errors.iter()).enumerate() {
            writeln!(f, "  p{}: {} +/- {}", i, p, e)?;
        }
        Ok(())
    }
}

fn param_slice(params: &Array1<f64>) -> Result<&[f64]> {
    params.as_slice().ok_or_else(|| {
        SpecFitError::DimensionMismatch("parameter vector is not contiguous".to_string())
    })
}

/// Weighted least-squares problem `r_i = (f(x_i; p) - y_i) / σ_i`.
///
/// `σ_i² = σy_i² + (f'(x_i)·σx_i)²` is re-evaluated with the current
/// parameters; a point with zero effective error gets unit weight.
struct CurveProblem<'a, C: CurveFunction> {
    curve: &'a C,
    x: Vec<f64>,
    y: Vec<f64>,
    x_errors: Vec<f64>,
    y_errors: Vec<f64>,
}

impl<'a, C: CurveFunction> CurveProblem<'a, C> {
    fn has_x_errors(&self) -> bool {
        self.x_errors.iter().any(|e| *e != 0.0)
    }

    fn sigmas(&self, params: &[f64]) -> Vec<f64> {
        let with_x = self.has_x_errors();
        self.x
            .iter()
            .zip(self.x_errors.iter().zip(self.y_errors.iter()))
            .map(|(&x, (&sx, &sy))| {
                let mut variance = sy * sy;
                if with_x && sx != 0.0 {
                    let slope = finite_difference::derivative(|t| self.curve.eval(t, params), x);
                    variance += (slope * sx).powi(2);
                }
                if variance > 0.0 && variance.is_finite() {
                    variance.sqrt()
                } else {
                    1.0
                }
            })
            .collect()
    }
}

impl<'a, C: CurveFunction> Problem for CurveProblem<'a, C> {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        let p = param_slice(params)?;
        let sigmas = self.sigmas(p);
        Ok(self
            .x
            .iter()
            .zip(self.y.iter())
            .zip(sigmas.iter())
            .map(|((&x, &y), &s)| (self.curve.eval(x, p) - y) / s)
            .collect())
    }

    fn parameter_count(&self) -> usize {
        self.curve.parameter_count()
    }

    fn residual_count(&self) -> usize {
        self.x.len()
    }

    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>> {
        let p = param_slice(params)?;
        let sigmas = self.sigmas(p);
        let mut jac = Array2::zeros((self.x.len(), self.parameter_count()));
        for (i, (&x, &s)) in self.x.iter().zip(sigmas.iter()).enumerate() {
            let d = self.curve.derivatives(x, p)?;
            jac.row_mut(i).assign(&(d / s));
        }
        Ok(jac)
    }

    fn has_custom_jacobian(&self) -> bool {
        true
    }
}

/// A parametric calibration curve fitted to data.
///
/// The parameters always describe the unnormalized curve `f(x; p)`; the
/// model evaluates `norm · f(x; p)`.
///
/// ```rust
/// use specfit_rs::curve::{CalibrationModel, LogPolynomialEfficiency};
///
/// let mut model = CalibrationModel::new(LogPolynomialEfficiency::new(1));
/// let energies = [122.0, 344.0, 779.0, 964.0, 1408.0];
/// let counts: Vec<f64> = energies.iter().map(|e| (3.0 - 0.9 * f64::ln(*e)).exp()).collect();
///
/// model.fit(&energies, &counts, None, None).unwrap();
/// assert!((model.parameters()[1] + 0.9).abs() < 1e-6);
/// ```
pub struct CalibrationModel<C: CurveFunction> {
    curve: C,
    parameters: Vec<f64>,
    covariance: Option<CovarianceMatrix>,
    norm: f64,
    range: (f64, f64),
    points: Vec<CalibrationPoint>,
    config: CurveFitConfig,
}

impl<C: CurveFunction> CalibrationModel<C> {
    pub fn new(curve: C) -> Self {
        Self::with_config(curve, CurveFitConfig::default())
    }

    pub fn with_config(curve: C, config: CurveFitConfig) -> Self {
        let parameters = curve.initial_parameters();
        let range = config.default_range;
        Self {
            curve,
            parameters,
            covariance: None,
            norm: 1.0,
            range,
            points: Vec::new(),
            config,
        }
    }

    /// Replace the parameters of the unnormalized curve.
    pub fn with_parameters(mut self, parameters: Vec<f64>) -> Result<Self> {
        self.check_parameter_count(parameters.len())?;
        self.parameters = parameters;
        Ok(self)
    }

    fn check_parameter_count(&self, found: usize) -> Result<()> {
        let expected = self.curve.parameter_count();
        if found != expected {
            return Err(SpecFitError::ParameterCountMismatch { expected, found });
        }
        Ok(())
    }

    pub fn curve(&self) -> &C {
        &self.curve
    }

    pub fn config(&self) -> &CurveFitConfig {
        &self.config
    }

    pub fn parameters(&self) -> &[f64] {
        &self.parameters
    }

    pub fn covariance(&self) -> Option<&CovarianceMatrix> {
        self.covariance.as_ref()
    }

    pub fn norm(&self) -> f64 {
        self.norm
    }

    pub fn range(&self) -> (f64, f64) {
        self.range
    }

    /// Data points of the last fit, scaled by the current normalization.
    pub fn points(&self) -> &[CalibrationPoint] {
        &self.points
    }

    /// Parameters with the square roots of the covariance diagonal as errors.
    pub fn parameter_values(&self) -> Vec<ErrValue> {
        match &self.covariance {
            Some(covar) => self
                .parameters
                .iter()
                .zip(covar.standard_errors().iter())
                .map(|(&p, &e)| ErrValue::new(p, e))
                .collect(),
            None => self.parameters.iter().map(|&p| ErrValue::exact(p)).collect(),
        }
    }

    /// Replace the covariance matrix, which must be `N×N`.
    pub fn set_covariance(&mut self, covariance: CovarianceMatrix) -> Result<()> {
        let expected = self.curve.parameter_count();
        if covariance.dim() != expected {
            return Err(SpecFitError::CovarianceSizeMismatch {
                expected,
                found: covariance.dim(),
            });
        }
        self.covariance = Some(covariance);
        Ok(())
    }

    /// Fit the curve to the points `(x_i, y_i)`.
    ///
    /// Explicit error slices take precedence over errors carried by the
    /// items. On any error the model is left unchanged.
    pub fn fit<X: Measured, Y: Measured>(
        &mut self,
        x: &[X],
        y: &[Y],
        x_errors: Option<&[f64]>,
        y_errors: Option<&[f64]>,
    ) -> Result<FitReport> {
        let n_points = x.len();
        if y.len() != n_points {
            return Err(SpecFitError::DimensionMismatch(format!(
                "got {} x values and {} y values",
                n_points,
                y.len()
            )));
        }
        let x_errors = collect_errors("x", x, x_errors)?;
        let y_errors = collect_errors("y", y, y_errors)?;

        let n_params = self.curve.parameter_count();
        if n_points == 0 || n_points < n_params {
            return Err(SpecFitError::InvalidInput(format!(
                "{} points cannot determine {} parameters",
                n_points, n_params
            )));
        }

        let x_values: Vec<f64> = x.iter().map(Measured::measured_value).collect();
        let y_values: Vec<f64> = y.iter().map(Measured::measured_value).collect();
        let weighted = x_errors.iter().chain(y_errors.iter()).any(|e| *e != 0.0);

        let initial = match self.curve.initial_guess(&x_values, &y_values) {
            Some(guess) if guess.len() == n_params => guess,
            _ => self.parameters.clone(),
        };

        let problem = CurveProblem {
            curve: &self.curve,
            x: x_values,
            y: y_values,
            x_errors,
            y_errors,
        };

        let optimizer = LevenbergMarquardt::with_config(self.config.lm.clone()).with_calc_jacobian(true);
        let result = optimizer.minimize(&problem, Array1::from(initial))?;
        if !result.success {
            return Err(SpecFitError::FitDidNotConverge(result.message));
        }
        let jacobian = result.jacobian.as_ref().ok_or_else(|| {
            SpecFitError::FitDidNotConverge("optimizer returned no Jacobian".to_string())
        })?;

        let chi2 = result.cost;
        let ndf = n_points - n_params;
        let scale = if !weighted && self.config.scale_by_reduced_chi2 {
            match reduced_chi_square(chi2, n_points, n_params) {
                Some(reduced) => reduced,
                None => {
                    log::warn!("no degrees of freedom, covariance left unscaled");
                    1.0
                }
            }
        } else {
            1.0
        };
        let covariance = calculate_covariance(jacobian, scale)?;

        let x_max = problem.x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = (0.0, self.config.range_factor * x_max);
        let parameters = result.params.to_vec();
        let norm = if self.config.normalize {
            self.curve_maximum(&parameters, range).map(|max| 1.0 / max)?
        } else {
            1.0
        };

        let points = problem
            .x
            .iter()
            .zip(problem.x_errors.iter())
            .zip(problem.y.iter().zip(problem.y_errors.iter()))
            .map(|((&x, &sx), (&y, &sy))| CalibrationPoint {
                x: ErrValue::new(x, sx),
                y: ErrValue::new(y, sy) * norm,
            })
            .collect();

        log::info!(
            "calibration fit converged after {} iterations: chi2 = {:.6e}, ndf = {}",
            result.iterations,
            chi2,
            ndf
        );

        self.parameters = parameters;
        self.covariance = Some(covariance.clone());
        self.range = range;
        self.norm = norm;
        self.points = points;

        Ok(FitReport {
            parameters: result.params,
            covariance,
            chi2,
            ndf,
            iterations: result.iterations,
        })
    }

    /// Largest value of the unnormalized curve over `range`.
    fn curve_maximum(&self, parameters: &[f64], range: (f64, f64)) -> Result<f64> {
        let found = search::maximum(
            |x| self.curve.eval(x, parameters),
            range.0,
            range.1,
            self.config.maximum_search_points,
        );
        match found {
            Some((_, max)) if max > 0.0 => Ok(max),
            Some((x, max)) => Err(SpecFitError::NormalizationFailed(format!(
                "curve maximum {} at {} is not positive",
                max, x
            ))),
            None => Err(SpecFitError::NormalizationFailed(format!(
                "curve has no finite value in [{}, {}]",
                range.0, range.1
            ))),
        }
    }

    /// Scale the curve to a maximum of 1 over its range.
    ///
    /// The cached points are rescaled by the change of norm. Calling this
    /// again without changing the parameters changes nothing.
    pub fn normalize(&mut self) -> Result<f64> {
        let norm = 1.0 / self.curve_maximum(&self.parameters, self.range)?;
        let factor = norm / self.norm;
        for point in &mut self.points {
            point.y = point.y * factor;
        }
        self.norm = norm;
        log::debug!("normalized curve: norm = {:.6e}", norm);
        Ok(norm)
    }

    /// `norm · f(x; p)`
    pub fn value(&self, x: f64) -> f64 {
        self.norm * self.curve.eval(x, &self.parameters)
    }

    /// `sqrt(dᵀ·C·d)` with `d_i = norm · ∂f/∂p_i` at `x`.
    pub fn error(&self, x: f64) -> Result<f64> {
        let covariance = self.checked_covariance()?;
        let d = self.curve.derivatives(x, &self.parameters)? * self.norm;
        let q = covariance.quadratic_form(&d)?;
        Ok(q.max(0.0).sqrt())
    }

    /// Value and analytic error at `x`.
    pub fn evaluate(&self, x: f64) -> Result<ErrValue> {
        Ok(ErrValue::new(self.value(x), self.error(x)?))
    }

    /// Value and error at `x` from `samples` parameter vectors drawn from
    /// `N(p, C)`.
    pub fn monte_carlo_error<R: Rng + ?Sized>(
        &self,
        x: f64,
        samples: usize,
        rng: &mut R,
    ) -> Result<ErrValue> {
        let covariance = self.checked_covariance()?;
        let mean = Array1::from(self.parameters.clone());
        propagate_uncertainty(&mean, covariance, samples, rng, |p| {
            p.as_slice()
                .map_or(f64::NAN, |p| self.norm * self.curve.eval(x, p))
        })
    }

    fn checked_covariance(&self) -> Result<&CovarianceMatrix> {
        let expected = self.curve.parameter_count();
        match &self.covariance {
            Some(covariance) if covariance.dim() == expected => Ok(covariance),
            Some(covariance) => Err(SpecFitError::CovarianceSizeMismatch {
                expected,
                found: covariance.dim(),
            }),
            None => Err(SpecFitError::CovarianceSizeMismatch { expected, found: 0 }),
        }
    }

    /// Load parameters and, optionally, the covariance matrix.
    ///
    /// Both files are parsed before anything is replaced. Without a
    /// covariance file the current covariance is kept.
    pub fn load<P: AsRef<Path>>(&mut self, parameter_file: P, covariance_file: Option<&Path>) -> Result<()> {
        let (parameters, norm) = self.read_parameters(parameter_file.as_ref())?;
        let covariance = covariance_file.map(|path| self.read_covariance(path)).transpose()?;

        self.commit_parameters(parameters, norm);
        if let Some(covariance) = covariance {
            self.covariance = Some(covariance);
        }
        log::info!(
            "loaded {} parameters from {}{}",
            self.parameters.len(),
            parameter_file.as_ref().display(),
            if covariance_file.is_some() { " with covariance" } else { "" }
        );
        Ok(())
    }

    /// Load the parameters alone, renormalizing when enabled. Cached points
    /// are cleared.
    pub fn load_parameters<P: AsRef<Path>>(&mut self, parameter_file: P) -> Result<()> {
        let (parameters, norm) = self.read_parameters(parameter_file.as_ref())?;
        self.commit_parameters(parameters, norm);
        log::info!(
            "loaded {} parameters from {}",
            self.parameters.len(),
            parameter_file.as_ref().display()
        );
        Ok(())
    }

    /// Load the covariance matrix alone.
    pub fn load_covariance<P: AsRef<Path>>(&mut self, covariance_file: P) -> Result<()> {
        let covariance = self.read_covariance(covariance_file.as_ref())?;
        self.covariance = Some(covariance);
        log::info!("loaded covariance from {}", covariance_file.as_ref().display());
        Ok(())
    }

    fn read_parameters(&self, path: &Path) -> Result<(Vec<f64>, f64)> {
        let parameters = flatfile::parse_parameters(&flatfile::read_file(path)?, self.curve.parameter_count())?;
        let norm = if self.config.normalize {
            1.0 / self.curve_maximum(&parameters, self.range)?
        } else {
            1.0
        };
        Ok((parameters, norm))
    }

    fn read_covariance(&self, path: &Path) -> Result<CovarianceMatrix> {
        flatfile::parse_covariance(&flatfile::read_file(path)?, self.curve.parameter_count())
    }

    fn commit_parameters(&mut self, parameters: Vec<f64>, norm: f64) {
        self.parameters = parameters;
        self.norm = norm;
        self.points.clear();
    }

    /// Write the parameters and, optionally, the covariance matrix.
    ///
    /// A covariance that was never set is reported before any file is
    /// written.
    pub fn save<P: AsRef<Path>>(&self, parameter_file: P, covariance_file: Option<&Path>) -> Result<()> {
        let covariance = match covariance_file {
            Some(path) => Some((path, self.checked_covariance()?)),
            None => None,
        };

        self.save_parameters(parameter_file)?;
        if let Some((path, covariance)) = covariance {
            flatfile::write_covariance(path, covariance)?;
            log::info!("saved covariance to {}", path.display());
        }
        Ok(())
    }

    /// Write the parameters, one per line.
    pub fn save_parameters<P: AsRef<Path>>(&self, parameter_file: P) -> Result<()> {
        flatfile::write_parameters(parameter_file.as_ref(), &self.parameters)?;
        log::info!("saved parameters to {}", parameter_file.as_ref().display());
        Ok(())
    }

    /// Write the covariance matrix, one row per line.
    pub fn save_covariance<P: AsRef<Path>>(&self, covariance_file: P) -> Result<()> {
        let covariance = self.checked_covariance()?;
        flatfile::write_covariance(covariance_file.as_ref(), covariance)?;
        log::info!("saved covariance to {}", covariance_file.as_ref().display());
        Ok(())
    }
}

fn collect_errors<T: Measured>(axis: &str, items: &[T], explicit: Option<&[f64]>) -> Result<Vec<f64>> {
    match explicit {
        Some(errors) if errors.len() != items.len() => Err(SpecFitError::DimensionMismatch(format!(
            "got {} {} errors for {} values",
            errors.len(),
            axis,
            items.len()
        ))),
        Some(errors) => Ok(errors.iter().map(|e| e.abs()).collect()),
        None => Ok(items
            .iter()
            .map(|item| item.measured_error().unwrap_or(0.0))
            .collect()),
    }
}

impl<C: CurveFunction> fmt::Display for CalibrationModel<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.parameter_values().iter().enumerate() {
            writeln!(f, "{} = {}", self.curve.parameter_name(i), value)?;
        }
        write!(f, "norm = {}", self.norm)
    }
}

impl<C: CurveFunction + fmt::Debug> fmt::Debug for CalibrationModel<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalibrationModel")
            .field("curve", &self.curve)
            .field("parameters", &self.parameters)
            .field("covariance", &self.covariance)
            .field("norm", &self.norm)
            .field("range", &self.range)
            .finish()
    }
}
