//! # specfit-rs
//!
//! `specfit-rs` provides the numerical core of a spectrum-analysis workflow:
//!
//! - [`ErrValue`], a value with a standard error, with error propagation
//!   through arithmetic and the compact `12.345(67)` notation
//! - a parameter status model deciding, per peak, whether a fit parameter
//!   is free, shared between peaks, held fixed or not used at all
//! - calibration curves fitted by weighted least squares, with analytic and
//!   Monte Carlo uncertainties from the covariance matrix
//! - flat text files for parameters and covariance matrices
//!
//! ## Basic Usage
//!
//! ```
//! use specfit_rs::ErrValue;
//!
//! let a = ErrValue::parse("12.34(5)").unwrap();
//! let b = ErrValue::new(2.0, 0.1);
//! let sum = a + b;
//! assert!((sum.value() - 14.34).abs() < 1e-12);
//! assert!((sum.error() - 0.05f64.hypot(0.1)).abs() < 1e-12);
//! ```

pub mod calibration;
pub mod curve;
pub mod error;
pub mod errvalue;
pub mod flatfile;
pub mod lm;
pub mod problem;
pub mod status;
pub mod uncertainty;

mod utils;

// Re-exports for convenience
pub use calibration::{Calibration, LinearCalibration};
pub use curve::{CalibrationModel, CurveFitConfig, CurveFunction};
pub use error::{Result, SpecFitError};
pub use errvalue::ErrValue;
pub use lm::{LevenbergMarquardt, LmConfig};
pub use problem::Problem;
pub use status::{FitSession, ParameterStatus, ParameterStatusModel};
pub use uncertainty::CovarianceMatrix;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
