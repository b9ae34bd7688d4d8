//! Peak-shape declarations.

use crate::calibration::Calibration;

use super::{AllowedStatuses, ParameterStatus, StatusKind};

/// A parametric peak shape as seen by the status model.
///
/// The shape declares its parameter names (in display order), which statuses
/// each parameter may take, the status a parameter starts with, and how a
/// literal given in calibrated units maps into the fitter's units.
pub trait PeakShape {
    /// Name of the shape, used in messages.
    fn name(&self) -> &str;

    /// Parameter names in declared order.
    fn parameter_names(&self) -> Vec<&str>;

    /// The legal statuses of `parameter`, or `None` for an unknown name.
    fn allowed_statuses(&self, parameter: &str) -> Option<&AllowedStatuses>;

    /// The status `parameter` starts with.
    fn default_status(&self, parameter: &str) -> Option<ParameterStatus>;

    /// Value used for a held parameter when no initial value is given.
    /// `None` leaves the choice to the fitter.
    fn default_value(&self, _parameter: &str) -> Option<f64> {
        None
    }

    /// Convert a literal from calibrated to uncalibrated units.
    ///
    /// `pos_uncal` is the uncalibrated position of the peak the literal
    /// belongs to, needed by parameters that are widths rather than
    /// positions.
    fn uncalibrate(
        &self,
        _parameter: &str,
        value: f64,
        _pos_uncal: f64,
        calibration: &dyn Calibration,
    ) -> f64 {
        calibration.to_uncalibrated(value)
    }

    /// Whether `parameter` is declared by this shape.
    fn has_parameter(&self, parameter: &str) -> bool {
        self.allowed_statuses(parameter).is_some()
    }
}

/// How a parameter's literal value is converted to uncalibrated units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// The literal is an absolute position.
    Absolute,
    /// The literal is a width centered on the peak position.
    Width,
    /// The literal is unit-free and passed through unchanged.
    Unchanged,
}

#[derive(Debug, Clone)]
struct DeclaredParameter {
    name: String,
    allowed: AllowedStatuses,
    default: ParameterStatus,
    default_value: Option<f64>,
    conversion: Conversion,
}

/// A [`PeakShape`] described by a table of parameters.
///
/// ```rust
/// use specfit_rs::status::{DeclaredShape, ParameterStatus, PeakShape, StatusKind};
///
/// let shape = DeclaredShape::new("gauss")
///     .parameter("pos", [StatusKind::Free, StatusKind::FixedAtValue], ParameterStatus::Free)
///     .parameter("fwhm", [StatusKind::Free, StatusKind::Shared], ParameterStatus::Shared);
///
/// assert_eq!(shape.parameter_names(), vec!["pos", "fwhm"]);
/// assert_eq!(shape.default_status("fwhm"), Some(ParameterStatus::Shared));
/// ```
#[derive(Debug, Clone)]
pub struct DeclaredShape {
    name: String,
    parameters: Vec<DeclaredParameter>,
}

impl DeclaredShape {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parameters: Vec::new(),
        }
    }

    /// Declare a parameter whose literals are absolute positions.
    pub fn parameter<A>(self, name: &str, allowed: A, default: ParameterStatus) -> Self
    where
        A: Into<AllowedStatuses>,
    {
        self.parameter_with_conversion(name, allowed, default, Conversion::Absolute)
    }

    /// Declare a parameter with an explicit literal conversion.
    pub fn parameter_with_conversion<A>(
        mut self,
        name: &str,
        allowed: A,
        default: ParameterStatus,
        conversion: Conversion,
    ) -> Self
    where
        A: Into<AllowedStatuses>,
    {
        self.parameters.push(DeclaredParameter {
            name: name.trim().to_lowercase(),
            allowed: allowed.into(),
            default,
            default_value: None,
            conversion,
        });
        self
    }

    /// Set the held value of the most recently declared parameter.
    pub fn with_default_value(mut self, value: f64) -> Self {
        if let Some(last) = self.parameters.last_mut() {
            last.default_value = Some(value);
        }
        self
    }

    fn find(&self, parameter: &str) -> Option<&DeclaredParameter> {
        self.parameters.iter().find(|p| p.name == parameter)
    }
}

impl PeakShape for DeclaredShape {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameter_names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    fn allowed_statuses(&self, parameter: &str) -> Option<&AllowedStatuses> {
        self.find(parameter).map(|p| &p.allowed)
    }

    fn default_status(&self, parameter: &str) -> Option<ParameterStatus> {
        self.find(parameter).map(|p| p.default)
    }

    fn default_value(&self, parameter: &str) -> Option<f64> {
        self.find(parameter).and_then(|p| p.default_value)
    }

    fn uncalibrate(
        &self,
        parameter: &str,
        value: f64,
        pos_uncal: f64,
        calibration: &dyn Calibration,
    ) -> f64 {
        let conversion = self
            .find(parameter)
            .map_or(Conversion::Absolute, |p| p.conversion);

        match conversion {
            Conversion::Absolute => calibration.to_uncalibrated(value),
            Conversion::Width => {
                let pos_cal = calibration.to_calibrated(pos_uncal);
                calibration.to_uncalibrated(pos_cal + value / 2.0)
                    - calibration.to_uncalibrated(pos_cal - value / 2.0)
            }
            Conversion::Unchanged => value,
        }
    }
}

/// The Theuerkauf peak: a Gaussian core with optional exponential tails on
/// either side and an optional step.
///
/// | parameter | statuses | default | literal |
/// |---|---|---|---|
/// | `pos` | literal, free, hold | free | position |
/// | `vol` | literal, free, hold | free | unchanged |
/// | `width` | literal, free, equal | equal | width |
/// | `tl`, `tr` | literal, free, equal, none | none | width |
/// | `sh`, `sw` | literal, free, equal, none | none | unchanged |
#[derive(Debug, Clone)]
pub struct TheuerkaufShape {
    declared: DeclaredShape,
}

impl TheuerkaufShape {
    pub fn new() -> Self {
        use Conversion::*;
        use StatusKind::*;

        let held = [FixedAtValue, Free, FixedAtDefault];
        let optional = [FixedAtValue, Free, Shared, Disabled];

        let declared = DeclaredShape::new("theuerkauf")
            .parameter_with_conversion("pos", held, ParameterStatus::Free, Absolute)
            .parameter_with_conversion("vol", held, ParameterStatus::Free, Unchanged)
            .parameter_with_conversion(
                "width",
                [FixedAtValue, Free, Shared],
                ParameterStatus::Shared,
                Width,
            )
            .parameter_with_conversion("tl", optional, ParameterStatus::Disabled, Width)
            .parameter_with_conversion("tr", optional, ParameterStatus::Disabled, Width)
            .parameter_with_conversion("sh", optional, ParameterStatus::Disabled, Unchanged)
            .parameter_with_conversion("sw", optional, ParameterStatus::Disabled, Unchanged);

        Self { declared }
    }
}

impl Default for TheuerkaufShape {
    fn default() -> Self {
        Self::new()
    }
}

impl PeakShape for TheuerkaufShape {
    fn name(&self) -> &str {
        self.declared.name()
    }

    fn parameter_names(&self) -> Vec<&str> {
        self.declared.parameter_names()
    }

    fn allowed_statuses(&self, parameter: &str) -> Option<&AllowedStatuses> {
        self.declared.allowed_statuses(parameter)
    }

    fn default_status(&self, parameter: &str) -> Option<ParameterStatus> {
        self.declared.default_status(parameter)
    }

    fn uncalibrate(
        &self,
        parameter: &str,
        value: f64,
        pos_uncal: f64,
        calibration: &dyn Calibration,
    ) -> f64 {
        self.declared
            .uncalibrate(parameter, value, pos_uncal, calibration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::LinearCalibration;
    use approx::assert_relative_eq;

    #[test]
    fn test_theuerkauf_declaration() {
        let shape = TheuerkaufShape::new();
        assert_eq!(
            shape.parameter_names(),
            vec!["pos", "vol", "width", "tl", "tr", "sh", "sw"]
        );
        assert_eq!(shape.default_status("width"), Some(ParameterStatus::Shared));
        assert_eq!(shape.default_status("tl"), Some(ParameterStatus::Disabled));

        let pos = shape.allowed_statuses("pos").unwrap();
        assert!(pos.contains(StatusKind::FixedAtDefault));
        assert!(!pos.contains(StatusKind::Shared));
        assert!(shape.allowed_statuses("fwhm").is_none());
    }

    #[test]
    fn test_literal_conversions() {
        let shape = TheuerkaufShape::new();
        // 0.5 keV per channel, offset 10 keV
        let cal = LinearCalibration::new(10.0, 0.5).unwrap();

        assert_relative_eq!(shape.uncalibrate("pos", 60.0, 0.0, &cal), 100.0);
        assert_relative_eq!(shape.uncalibrate("width", 2.0, 100.0, &cal), 4.0);
        assert_relative_eq!(shape.uncalibrate("tl", 1.0, 100.0, &cal), 2.0);
        assert_relative_eq!(shape.uncalibrate("vol", 500.0, 100.0, &cal), 500.0);
        assert_relative_eq!(shape.uncalibrate("sh", 0.1, 100.0, &cal), 0.1);
    }

    #[test]
    fn test_declared_default_value() {
        let shape = DeclaredShape::new("step")
            .parameter("height", [StatusKind::FixedAtDefault], ParameterStatus::FixedAtDefault)
            .with_default_value(1.0);
        assert_eq!(shape.default_value("height"), Some(1.0));
        assert_eq!(shape.default_value("missing"), None);
        assert!(shape.has_parameter("height"));
    }
}
