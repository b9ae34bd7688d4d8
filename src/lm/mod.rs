//! Levenberg-Marquardt algorithm implementation.
//!
//! This module provides the nonlinear least-squares optimizer behind the
//! calibration-curve fit. The fit only relies on [`LevenbergMarquardt::minimize`]
//! returning best-fit parameters and, on request, the Jacobian at the
//! solution; any other optimizer with the same contract could take its place.

pub mod algorithm;
pub mod config;

pub use algorithm::{LevenbergMarquardt, LmResult};
pub use config::{DiffMethod, LmConfig};
