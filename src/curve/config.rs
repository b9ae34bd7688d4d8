//! Configuration of the calibration-curve fit.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::lm::LmConfig;

/// Settings for [`CalibrationModel`](super::CalibrationModel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveFitConfig {
    /// Optimizer settings. The Jacobian at the solution is always requested.
    pub lm: LmConfig,

    /// Normalize the curve to a maximum of 1 after fits and loads. Default: true
    pub normalize: bool,

    /// The fit range is `[0, range_factor * max(x)]`. Default: 1.1
    pub range_factor: f64,

    /// Range used before the first fit. Default: (0, 10000)
    pub default_range: (f64, f64),

    /// Grid points of the maximum search. Default: 1000
    pub maximum_search_points: usize,

    /// Scale the covariance of fits without errors by the reduced
    /// chi-square. Default: true
    pub scale_by_reduced_chi2: bool,
}

impl Default for CurveFitConfig {
    fn default() -> Self {
        Self {
            lm: LmConfig::default(),
            normalize: true,
            range_factor: 1.1,
            default_range: (0.0, 10000.0),
            maximum_search_points: 1000,
            scale_by_reduced_chi2: true,
        }
    }
}

impl CurveFitConfig {
    /// Parse a configuration from JSON; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_lm_config(mut self, lm: LmConfig) -> Self {
        self.lm = lm;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpecFitError;

    #[test]
    fn test_partial_json() {
        let config =
            CurveFitConfig::from_json_str(r#"{"normalize": false, "lm": {"max_iterations": 50}}"#)
                .unwrap();
        assert!(!config.normalize);
        assert_eq!(config.lm.max_iterations, 50);
        assert_eq!(config.lm.ftol, LmConfig::default().ftol);
        assert_eq!(config.range_factor, 1.1);
        assert_eq!(config.default_range, (0.0, 10000.0));

        assert!(matches!(
            CurveFitConfig::from_json_str("{\"normalize\": 3}"),
            Err(SpecFitError::Json(_))
        ));
    }
}
