//! Channel/energy calibration.
//!
//! Peak parameters are fitted in uncalibrated units (channels) while users
//! give fixed values in calibrated units (energies). The [`Calibration`]
//! trait is the conversion seam between the two; the fit machinery only ever
//! sees it as `&dyn Calibration`.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpecFitError};

/// Conversion between calibrated and uncalibrated units.
pub trait Calibration {
    /// Convert a calibrated value (e.g. an energy) to uncalibrated units.
    fn to_uncalibrated(&self, value: f64) -> f64;

    /// Convert an uncalibrated value (e.g. a channel) to calibrated units.
    fn to_calibrated(&self, value: f64) -> f64;
}

/// A linear calibration `calibrated = p1 * uncalibrated + p0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearCalibration {
    /// Offset
    pub p0: f64,
    /// Slope
    pub p1: f64,
}

impl LinearCalibration {
    /// Create a calibration from offset and slope. The slope must be finite
    /// and non-zero so the calibration can be inverted.
    pub fn new(p0: f64, p1: f64) -> Result<Self> {
        if p1 == 0.0 || !p1.is_finite() || !p0.is_finite() {
            return Err(SpecFitError::InvalidInput(format!(
                "calibration slope must be finite and non-zero, got p0={}, p1={}",
                p0, p1
            )));
        }
        Ok(Self { p0, p1 })
    }

    /// The calibration that leaves values unchanged.
    pub fn identity() -> Self {
        Self { p0: 0.0, p1: 1.0 }
    }

    /// Construct the calibration through two `(uncalibrated, calibrated)` pairs.
    pub fn from_xy_pairs(a: (f64, f64), b: (f64, f64)) -> Result<Self> {
        if a.0 == b.0 {
            return Err(SpecFitError::InvalidInput(
                "calibration pairs must have distinct uncalibrated values".to_string(),
            ));
        }
        let p1 = (b.1 - a.1) / (b.0 - a.0);
        Self::new(a.1 - p1 * a.0, p1)
    }

    /// Construct the calibration from one `(uncalibrated, calibrated)` pair
    /// and the slope.
    pub fn from_point_and_slope(point: (f64, f64), p1: f64) -> Result<Self> {
        Self::new(point.1 - p1 * point.0, p1)
    }
}

impl Default for LinearCalibration {
    fn default() -> Self {
        Self::identity()
    }
}

impl Calibration for LinearCalibration {
    fn to_uncalibrated(&self, value: f64) -> f64 {
        (value - self.p0) / self.p1
    }

    fn to_calibrated(&self, value: f64) -> f64 {
        self.p1 * value + self.p0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_conversion_roundtrip() {
        let cal = LinearCalibration::new(10.0, 0.5).unwrap();
        assert_relative_eq!(cal.to_calibrated(100.0), 60.0);
        assert_relative_eq!(cal.to_uncalibrated(60.0), 100.0);
    }

    #[test]
    fn test_from_pairs() {
        let cal = LinearCalibration::from_xy_pairs((100.0, 121.78), (1000.0, 1408.0)).unwrap();
        assert_relative_eq!(cal.to_calibrated(100.0), 121.78, epsilon = 1e-9);
        assert_relative_eq!(cal.to_calibrated(1000.0), 1408.0, epsilon = 1e-9);

        let cal = LinearCalibration::from_point_and_slope((0.0, 5.0), 2.0).unwrap();
        assert_eq!(cal, LinearCalibration { p0: 5.0, p1: 2.0 });
    }

    #[test]
    fn test_degenerate_calibration_rejected() {
        assert!(LinearCalibration::new(1.0, 0.0).is_err());
        assert!(LinearCalibration::from_xy_pairs((1.0, 2.0), (1.0, 3.0)).is_err());
    }
}
