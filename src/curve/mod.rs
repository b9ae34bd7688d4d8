//! # Calibration Curves
//!
//! A calibration curve, such as a detector efficiency against energy, is
//! fitted once to a handful of measured points and then queried many times.
//! Every query can carry an uncertainty, computed from the covariance matrix
//! of the fit either analytically through the curve's parameter derivatives
//! or by Monte Carlo sampling of the parameters.
//!
//! - [`CurveFunction`]: the parametric curve and its derivatives
//! - [`FnCurve`]: a curve built from closures
//! - [`PowerEfficiency`] and [`LogPolynomialEfficiency`]: common efficiency shapes
//! - [`CalibrationModel`]: fit, normalization, evaluation and persistence

mod config;
mod efficiency;
mod function;
mod model;
mod search;

pub use config::CurveFitConfig;
pub use efficiency::{LogPolynomialEfficiency, PowerEfficiency};
pub use function::{CurveFn, CurveFunction, FnCurve};
pub use model::{CalibrationModel, CalibrationPoint, FitReport, Measured};
