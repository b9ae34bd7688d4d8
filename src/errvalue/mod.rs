//! # Values with Uncertainty
//!
//! This module provides [`ErrValue`], a measured quantity together with its
//! standard error. Arithmetic propagates the error under the assumption that
//! the operands are statistically independent:
//!
//! | operation | propagated error |
//! |-----------|------------------|
//! | `a + b`, `a - b` | `sqrt(ea² + eb²)` |
//! | `a * b` | `sqrt((va·eb)² + (vb·ea)²)` |
//! | `a / b` | `sqrt((ea/vb)² + (va·eb/vb²)²)` |
//!
//! Values can be written and read in the compact notation common in
//! spectroscopy tables, where the parenthesized digits give the error in
//! units of the last printed decimal place:
//!
//! ```rust
//! use specfit_rs::errvalue::ErrValue;
//!
//! let v: ErrValue = "0.1234(56)".parse().unwrap();
//! assert_eq!(v.value(), 0.1234);
//! assert!((v.error() - 0.0056).abs() < 1e-12);
//! assert_eq!(v.format(), "0.1234(56)");
//! ```
//!
//! ## Equality and ordering
//!
//! Two values are *equal* when they agree within their combined errors, but
//! they are *ordered* by value alone. The two relations are therefore not
//! consistent with each other: `5(1) == 5.5(1)` and `5(1) < 5.5(1)` both hold.
//! Sorting uses the point ordering, so callers that sort and then compare
//! neighbours rely on exactly this combination.

mod format;
mod parse;

pub use format::DEFAULT_NO_ERROR_PRECISION;

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpecFitError};

/// A value with a (non-negative) standard error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(from = "RawErrValue", into = "RawErrValue")]
pub struct ErrValue {
    value: f64,
    error: f64,
    rel_error: Option<f64>,
}

/// Wire form of an [`ErrValue`]; deserialization re-runs the constructor.
#[derive(Serialize, Deserialize)]
struct RawErrValue {
    value: f64,
    #[serde(default)]
    error: f64,
}

impl From<RawErrValue> for ErrValue {
    fn from(raw: RawErrValue) -> Self {
        ErrValue::new(raw.value, raw.error)
    }
}

impl From<ErrValue> for RawErrValue {
    fn from(v: ErrValue) -> Self {
        RawErrValue {
            value: v.value,
            error: v.error,
        }
    }
}

impl ErrValue {
    /// Create a value with the given error. The sign of `error` is dropped.
    pub fn new(value: f64, error: f64) -> Self {
        let error = error.abs();
        let rel_error = if value != 0.0 {
            Some(error / value * 100.0)
        } else {
            None
        };
        Self {
            value,
            error,
            rel_error,
        }
    }

    /// Create a value without uncertainty.
    pub fn exact(value: f64) -> Self {
        Self::new(value, 0.0)
    }

    /// Parse the compact notation, e.g. `"12.3456(78)"` or `"1.23(45)e7"`.
    pub fn parse(text: &str) -> Result<Self> {
        parse::parse_errvalue(text)
    }

    /// The central value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// The absolute standard error.
    pub fn error(&self) -> f64 {
        self.error
    }

    /// The error in percent of the value, undefined for a zero value.
    pub fn relative_error_percent(&self) -> Option<f64> {
        self.rel_error
    }

    /// Sum with error propagation.
    pub fn add(&self, other: &ErrValue) -> ErrValue {
        ErrValue::new(self.value + other.value, quadrature(self.error, other.error))
    }

    /// Difference with error propagation.
    pub fn subtract(&self, other: &ErrValue) -> ErrValue {
        ErrValue::new(self.value - other.value, quadrature(self.error, other.error))
    }

    /// Product with error propagation.
    pub fn multiply(&self, other: &ErrValue) -> ErrValue {
        let error = quadrature(self.value * other.error, other.value * self.error);
        ErrValue::new(self.value * other.value, error)
    }

    /// Quotient with error propagation.
    ///
    /// Fails with [`SpecFitError::DivideByZero`] when the divisor's value is
    /// exactly zero.
    pub fn divide(&self, divisor: &ErrValue) -> Result<ErrValue> {
        if divisor.value == 0.0 {
            return Err(SpecFitError::DivideByZero);
        }
        let v2 = divisor.value;
        let error = quadrature(self.error / v2, self.value * divisor.error / (v2 * v2));
        Ok(ErrValue::new(self.value / v2, error))
    }

    /// Absolute value; the error is unchanged.
    pub fn abs(&self) -> ErrValue {
        ErrValue::new(self.value.abs(), self.error)
    }
}

fn quadrature(a: f64, b: f64) -> f64 {
    (a * a + b * b).sqrt()
}

impl From<f64> for ErrValue {
    fn from(value: f64) -> Self {
        ErrValue::exact(value)
    }
}

impl From<ErrValue> for f64 {
    fn from(v: ErrValue) -> Self {
        v.value
    }
}

impl FromStr for ErrValue {
    type Err = SpecFitError;

    fn from_str(s: &str) -> Result<Self> {
        ErrValue::parse(s)
    }
}

impl fmt::Display for ErrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

impl PartialEq for ErrValue {
    /// Equal when the values agree within the sum of both errors.
    fn eq(&self, other: &Self) -> bool {
        (self.value - other.value).abs() <= self.error + other.error
    }
}

impl PartialEq<f64> for ErrValue {
    fn eq(&self, other: &f64) -> bool {
        *self == ErrValue::exact(*other)
    }
}

impl PartialOrd for ErrValue {
    /// Point ordering by value; errors are ignored.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.value.partial_cmp(&other.value)
    }
}

impl PartialOrd<f64> for ErrValue {
    fn partial_cmp(&self, other: &f64) -> Option<Ordering> {
        self.value.partial_cmp(other)
    }
}

impl Add for ErrValue {
    type Output = ErrValue;

    fn add(self, rhs: ErrValue) -> ErrValue {
        ErrValue::add(&self, &rhs)
    }
}

impl Add<f64> for ErrValue {
    type Output = ErrValue;

    fn add(self, rhs: f64) -> ErrValue {
        ErrValue::add(&self, &ErrValue::exact(rhs))
    }
}

impl Add<ErrValue> for f64 {
    type Output = ErrValue;

    fn add(self, rhs: ErrValue) -> ErrValue {
        ErrValue::add(&ErrValue::exact(self), &rhs)
    }
}

impl Sub for ErrValue {
    type Output = ErrValue;

    fn sub(self, rhs: ErrValue) -> ErrValue {
        self.subtract(&rhs)
    }
}

impl Sub<f64> for ErrValue {
    type Output = ErrValue;

    fn sub(self, rhs: f64) -> ErrValue {
        self.subtract(&ErrValue::exact(rhs))
    }
}

impl Sub<ErrValue> for f64 {
    type Output = ErrValue;

    fn sub(self, rhs: ErrValue) -> ErrValue {
        ErrValue::exact(self).subtract(&rhs)
    }
}

impl Mul for ErrValue {
    type Output = ErrValue;

    fn mul(self, rhs: ErrValue) -> ErrValue {
        self.multiply(&rhs)
    }
}

impl Mul<f64> for ErrValue {
    type Output = ErrValue;

    fn mul(self, rhs: f64) -> ErrValue {
        self.multiply(&ErrValue::exact(rhs))
    }
}

impl Mul<ErrValue> for f64 {
    type Output = ErrValue;

    fn mul(self, rhs: ErrValue) -> ErrValue {
        ErrValue::exact(self).multiply(&rhs)
    }
}

impl Neg for ErrValue {
    type Output = ErrValue;

    fn neg(self) -> ErrValue {
        ErrValue::new(-self.value, self.error)
    }
}
