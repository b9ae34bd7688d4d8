//! Validated parameter statuses for one peak shape.

use std::collections::HashMap;
use std::fmt;

use crate::calibration::Calibration;
use crate::error::{Result, SpecFitError};

use super::{
    match_keyword, AllocationRequest, FitSession, ParameterStatus, PeakShape, StatusKind,
    StatusSpec,
};

/// The statuses of all parameters of one peak shape.
///
/// Every status is checked against the shape's allowed set when it is
/// assigned, so resolution never sees an illegal status.
pub struct ParameterStatusModel {
    shape: Box<dyn PeakShape>,
    statuses: HashMap<String, StatusSpec>,
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

impl ParameterStatusModel {
    /// Create a model with every parameter at the shape's default status.
    pub fn new<S: PeakShape + 'static>(shape: S) -> Self {
        let mut model = Self {
            shape: Box::new(shape),
            statuses: HashMap::new(),
        };
        model.reset_status();
        model
    }

    pub fn shape(&self) -> &dyn PeakShape {
        self.shape.as_ref()
    }

    /// Restore every parameter to its default status.
    pub fn reset_status(&mut self) {
        let defaults: HashMap<String, StatusSpec> = self
            .shape
            .parameter_names()
            .into_iter()
            .filter_map(|name| {
                self.shape
                    .default_status(name)
                    .map(|status| (name.to_string(), StatusSpec::Uniform(status)))
            })
            .collect();
        self.statuses = defaults;
    }

    /// Parse a single status for `parameter`.
    ///
    /// The text is matched case-insensitively against unambiguous prefixes
    /// of `free`, `equal`, `none`, `hold` and `calculated`. Anything else is
    /// read as a literal value, provided the parameter accepts literals.
    pub fn parse_status(&self, parameter: &str, raw: &str) -> Result<ParameterStatus> {
        let parameter = normalize_name(parameter);
        let allowed = self
            .shape
            .allowed_statuses(&parameter)
            .ok_or_else(|| SpecFitError::UnknownParameter(parameter.clone()))?;

        let text = raw.trim().to_lowercase();
        let invalid = || SpecFitError::InvalidStatus {
            parameter: parameter.clone(),
            status: raw.trim().to_string(),
        };

        if text.is_empty() {
            return Err(invalid());
        }

        let status = match match_keyword(&text) {
            Ok(Some(kind)) => {
                let status = match kind {
                    StatusKind::Free => ParameterStatus::Free,
                    StatusKind::Shared => ParameterStatus::Shared,
                    StatusKind::FixedAtDefault => ParameterStatus::FixedAtDefault,
                    StatusKind::Disabled => ParameterStatus::Disabled,
                    StatusKind::Computed => ParameterStatus::Computed,
                    StatusKind::FixedAtValue => return Err(invalid()),
                };
                if !allowed.permits(&status) {
                    return Err(invalid());
                }
                status
            }
            Ok(None) => {
                if !allowed.contains(StatusKind::FixedAtValue) {
                    return Err(invalid());
                }
                let value: f64 = text.parse().map_err(|_| {
                    SpecFitError::Parse(format!(
                        "invalid status '{}' for parameter '{}'",
                        raw.trim(),
                        parameter
                    ))
                })?;
                if !value.is_finite() {
                    return Err(SpecFitError::Parse(format!(
                        "non-finite value '{}' for parameter '{}'",
                        raw.trim(),
                        parameter
                    )));
                }
                ParameterStatus::FixedAtValue(value)
            }
            Err(candidates) => {
                log::debug!(
                    "status '{}' for '{}' is ambiguous between {:?}",
                    text,
                    parameter,
                    candidates
                );
                return Err(invalid());
            }
        };

        Ok(status)
    }

    /// Assign the status of `parameter` from user text.
    ///
    /// A comma-separated list assigns one status per peak. On failure the
    /// previous status is kept.
    pub fn set_status(&mut self, parameter: &str, raw: &str) -> Result<()> {
        let name = normalize_name(parameter);
        if !self.shape.has_parameter(&name) {
            return Err(SpecFitError::UnknownParameter(name));
        }

        let spec = if raw.contains(',') {
            let statuses = raw
                .split(',')
                .map(|part| self.parse_status(&name, part))
                .collect::<Result<Vec<_>>>()?;
            StatusSpec::PerPeak(statuses)
        } else {
            StatusSpec::Uniform(self.parse_status(&name, raw)?)
        };

        log::debug!("status of '{}' set to {}", name, spec);
        self.statuses.insert(name, spec);
        Ok(())
    }

    /// The status of `parameter` for all peaks.
    pub fn status(&self, parameter: &str) -> Result<&StatusSpec> {
        let name = normalize_name(parameter);
        self.statuses
            .get(&name)
            .ok_or(SpecFitError::UnknownParameter(name))
    }

    /// The effective status of `parameter` for peak `peak_index`.
    pub fn status_for_peak(&self, parameter: &str, peak_index: usize) -> Result<ParameterStatus> {
        let spec = self.status(parameter)?;
        spec.for_peak(peak_index).ok_or_else(|| {
            let given = match spec {
                StatusSpec::PerPeak(statuses) => statuses.len(),
                StatusSpec::Uniform(_) => 1,
            };
            SpecFitError::MissingPeakStatus {
                parameter: normalize_name(parameter),
                needed: peak_index + 1,
                given,
            }
        })
    }

    /// Check that every per-peak status list covers at least `min_len` peaks.
    pub fn check_status_len(&self, min_len: usize) -> Result<()> {
        for name in self.shape.parameter_names() {
            if let Some(StatusSpec::PerPeak(statuses)) = self.statuses.get(name) {
                if statuses.len() < min_len {
                    return Err(SpecFitError::MissingPeakStatus {
                        parameter: name.to_string(),
                        needed: min_len,
                        given: statuses.len(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Turn the status of `parameter` for peak `peak_index` into a request
    /// for the fitter.
    ///
    /// `pos_uncal` is the uncalibrated position of the peak and
    /// `initial_value` the starting value in uncalibrated units.
    pub fn resolve(
        &self,
        session: &mut FitSession,
        parameter: &str,
        peak_index: usize,
        pos_uncal: f64,
        calibration: &dyn Calibration,
        initial_value: Option<f64>,
    ) -> Result<AllocationRequest> {
        let name = normalize_name(parameter);
        let status = self.status_for_peak(&name, peak_index)?;

        let request = match status {
            ParameterStatus::Shared => AllocationRequest::Slot(session.global_or_alloc(
                self.shape.name(),
                &name,
                initial_value,
            )),
            ParameterStatus::Free => AllocationRequest::Slot(session.alloc_param(initial_value)),
            ParameterStatus::FixedAtDefault => {
                AllocationRequest::Fixed(initial_value.or_else(|| self.shape.default_value(&name)))
            }
            ParameterStatus::Disabled => AllocationRequest::Disabled,
            ParameterStatus::FixedAtValue(value) => AllocationRequest::Fixed(Some(
                self.shape.uncalibrate(&name, value, pos_uncal, calibration),
            )),
            ParameterStatus::Computed => AllocationRequest::Computed,
        };

        log::debug!(
            "peak {} parameter '{}': {} -> {:?}",
            peak_index,
            name,
            status,
            request
        );
        Ok(request)
    }

    /// One line per parameter, in declared order.
    pub fn describe(&self) -> String {
        self.shape
            .parameter_names()
            .into_iter()
            .filter_map(|name| {
                self.statuses.get(name).map(|spec| match spec {
                    StatusSpec::Uniform(status) => format!("{}: {}", name, status.describe()),
                    StatusSpec::PerPeak(_) => format!("{}: {}", name, spec),
                })
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for ParameterStatusModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl fmt::Debug for ParameterStatusModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterStatusModel")
            .field("shape", &self.shape.name())
            .field("statuses", &self.statuses)
            .finish()
    }
}
