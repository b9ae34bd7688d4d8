//! # Parameter Status System
//!
//! Every parameter of a multi-peak model has a *status* that decides how the
//! fitter treats it: fitted independently for each peak, shared between all
//! peaks, held at a default, held at a user-supplied literal, left out of the
//! model, or computed from other parameters after the fit.
//!
//! ## Core Components
//!
//! - [`ParameterStatus`]: the closed set of statuses
//! - [`PeakShape`]: declares parameter names, legal statuses and defaults
//! - [`ParameterStatusModel`]: validated per-parameter statuses for one shape
//! - [`FitSession`]: the parameter slots of one fit, including the table of
//!   shared slots
//!
//! ## Example Usage
//!
//! ```rust
//! use specfit_rs::calibration::LinearCalibration;
//! use specfit_rs::status::{AllocationRequest, FitSession, ParameterStatusModel, TheuerkaufShape};
//!
//! let mut model = ParameterStatusModel::new(TheuerkaufShape::new());
//! model.set_status("width", "equal").unwrap();
//! model.set_status("pos", "free, hold").unwrap();
//!
//! let cal = LinearCalibration::identity();
//! let mut session = FitSession::new();
//! let w0 = model.resolve(&mut session, "width", 0, 100.0, &cal, None).unwrap();
//! let w1 = model.resolve(&mut session, "width", 1, 200.0, &cal, None).unwrap();
//! assert_eq!(w0, w1);
//!
//! let p1 = model.resolve(&mut session, "pos", 1, 200.0, &cal, Some(200.0)).unwrap();
//! assert_eq!(p1, AllocationRequest::Fixed(Some(200.0)));
//! ```

mod model;
mod session;
mod shape;

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errvalue::{ErrValue, DEFAULT_NO_ERROR_PRECISION};

pub use model::ParameterStatusModel;
pub use session::{AllocationRequest, FitSession, ParameterSlot, SlotHandle};
pub use shape::{Conversion, DeclaredShape, PeakShape, TheuerkaufShape};

/// How a single parameter of a single peak takes part in the fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParameterStatus {
    /// Fitted independently for each peak (`free`).
    Free,
    /// One fitted value shared by all peaks of the fit (`equal`).
    Shared,
    /// Held at the default or initial value (`hold`).
    FixedAtDefault,
    /// Left out of the model (`none`).
    Disabled,
    /// Derived from other parameters after the fit (`calculated`).
    Computed,
    /// Held at a literal value given in calibrated units.
    FixedAtValue(f64),
}

/// The payload-free variants of [`ParameterStatus`], used for allowed sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StatusKind {
    Free,
    Shared,
    FixedAtDefault,
    Disabled,
    Computed,
    FixedAtValue,
}

impl ParameterStatus {
    /// The variant without its payload.
    pub fn kind(&self) -> StatusKind {
        match self {
            ParameterStatus::Free => StatusKind::Free,
            ParameterStatus::Shared => StatusKind::Shared,
            ParameterStatus::FixedAtDefault => StatusKind::FixedAtDefault,
            ParameterStatus::Disabled => StatusKind::Disabled,
            ParameterStatus::Computed => StatusKind::Computed,
            ParameterStatus::FixedAtValue(_) => StatusKind::FixedAtValue,
        }
    }

    /// Long-form description used for statuses that apply to all peaks.
    pub fn describe(&self) -> String {
        match self {
            ParameterStatus::Free => "(individually) free".to_string(),
            ParameterStatus::Shared => "free and equal".to_string(),
            ParameterStatus::FixedAtDefault => "held at default value".to_string(),
            ParameterStatus::Disabled => "none (disabled)".to_string(),
            ParameterStatus::Computed => "calculated".to_string(),
            ParameterStatus::FixedAtValue(v) => format!("fixed at {:.3}", v),
        }
    }
}

impl fmt::Display for ParameterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterStatus::FixedAtValue(v) => write!(f, "{:.3}", v),
            other => match other.kind().keyword() {
                Some(keyword) => f.write_str(keyword),
                None => Ok(()),
            },
        }
    }
}

impl StatusKind {
    /// Keywords in matching order.
    pub const KEYWORDS: [(&'static str, StatusKind); 5] = [
        ("free", StatusKind::Free),
        ("equal", StatusKind::Shared),
        ("none", StatusKind::Disabled),
        ("hold", StatusKind::FixedAtDefault),
        ("calculated", StatusKind::Computed),
    ];

    /// The keyword users type for this kind; literals have none.
    pub fn keyword(&self) -> Option<&'static str> {
        Self::KEYWORDS
            .iter()
            .find(|(_, kind)| kind == self)
            .map(|(keyword, _)| *keyword)
    }
}

/// Resolve a (possibly abbreviated) keyword. `Ok(None)` means the text is no
/// keyword prefix at all, `Err` carries the candidates of an ambiguous prefix.
pub(crate) fn match_keyword(text: &str) -> std::result::Result<Option<StatusKind>, Vec<&'static str>> {
    let candidates: Vec<(&'static str, StatusKind)> = StatusKind::KEYWORDS
        .iter()
        .copied()
        .filter(|(keyword, _)| keyword.starts_with(text))
        .collect();

    match candidates.as_slice() {
        [] => Ok(None),
        [(_, kind)] => Ok(Some(*kind)),
        many => Err(many.iter().map(|(keyword, _)| *keyword).collect()),
    }
}

/// The statuses a parameter may legally take.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AllowedStatuses {
    kinds: BTreeSet<StatusKind>,
}

impl AllowedStatuses {
    /// Create an allowed set from a list of kinds.
    pub fn new<I: IntoIterator<Item = StatusKind>>(kinds: I) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }

    /// Whether `kind` is legal.
    pub fn contains(&self, kind: StatusKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Whether `status` is legal.
    pub fn permits(&self, status: &ParameterStatus) -> bool {
        self.contains(status.kind())
    }

    /// Iterate over the legal kinds in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = StatusKind> + '_ {
        self.kinds.iter().copied()
    }
}

impl<const N: usize> From<[StatusKind; N]> for AllowedStatuses {
    fn from(kinds: [StatusKind; N]) -> Self {
        Self::new(kinds)
    }
}

/// The status of a parameter across all peaks of a fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatusSpec {
    /// One status for every peak.
    Uniform(ParameterStatus),
    /// One status per peak, indexed by peak.
    PerPeak(Vec<ParameterStatus>),
}

impl StatusSpec {
    /// The status of peak `peak_index`, or `None` when a per-peak list is too
    /// short.
    pub fn for_peak(&self, peak_index: usize) -> Option<ParameterStatus> {
        match self {
            StatusSpec::Uniform(status) => Some(*status),
            StatusSpec::PerPeak(statuses) => statuses.get(peak_index).copied(),
        }
    }
}

impl fmt::Display for StatusSpec {
    /// Keyword form: `free` or `free, hold, 3.500`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusSpec::Uniform(status) => write!(f, "{}", status),
            StatusSpec::PerPeak(statuses) => {
                let parts: Vec<String> = statuses.iter().map(|s| s.to_string()).collect();
                f.write_str(&parts.join(", "))
            }
        }
    }
}

/// A fitted value together with whether it was free in the fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitValue {
    /// Value and error
    pub value: ErrValue,
    /// Whether the parameter was varied by the fitter
    pub free: bool,
}

impl FitValue {
    pub fn new(value: f64, error: f64, free: bool) -> Self {
        Self {
            value: ErrValue::new(value, error),
            free,
        }
    }

    /// Held values carry no meaningful error and are marked `(HOLD)`.
    pub fn format(&self) -> String {
        if self.free {
            self.value.format()
        } else {
            format!(
                "{} (HOLD)",
                self.value.format_no_error(DEFAULT_NO_ERROR_PRECISION)
            )
        }
    }
}

impl fmt::Display for FitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}
