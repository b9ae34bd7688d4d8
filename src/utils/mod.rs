//! Numerical helpers shared by the optimizer and the calibration engine.

pub mod finite_difference;
pub mod matrix_convert;
