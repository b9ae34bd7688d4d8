//! Locale-free rendering of [`ErrValue`]s.

use super::ErrValue;

/// Largest number of decimals ever printed.
const MAX_PRECISION: i32 = 20;

/// Decimals used when the error cannot be rendered (NaN error).
const FALLBACK_PRECISION: usize = 3;

/// Default decimals for values without error.
pub const DEFAULT_NO_ERROR_PRECISION: usize = 6;

/// Split a value into sign, magnitude and the decade used for scientific
/// notation (`None` when plain notation applies).
fn split_magnitude(value: f64) -> (&'static str, f64, Option<i32>) {
    let (sign, magnitude) = if value < 0.0 {
        ("-", -value)
    } else {
        ("", value)
    };

    let log10_val = if magnitude > 0.0 && magnitude.is_finite() {
        magnitude.log10().floor()
    } else {
        0.0
    };

    if log10_val >= 6.0 || log10_val <= -2.0 {
        (sign, magnitude, Some(log10_val as i32))
    } else {
        (sign, magnitude, None)
    }
}

fn suffix(exponent: Option<i32>) -> String {
    exponent.map(|e| format!("e{}", e)).unwrap_or_default()
}

impl ErrValue {
    /// Render the value with its error shown to two significant digits.
    ///
    /// Values whose decade is `>= 6` or `<= -2` are printed in scientific
    /// notation with the exponent after the parenthetical, e.g.
    /// `"1.00(30)e7"`. Values without error are rendered by
    /// [`format_no_error`](Self::format_no_error).
    pub fn format(&self) -> String {
        if self.error == 0.0 {
            return self.format_no_error(DEFAULT_NO_ERROR_PRECISION);
        }

        let (sign, mut value, exponent) = split_magnitude(self.value);
        let mut error = self.error;
        if let Some(e) = exponent {
            let scale = 10f64.powi(e);
            value /= scale;
            error /= scale;
        }

        let prec = if error >= 10.0 {
            0.0
        } else {
            -error.log10().floor() + 1.0
        };

        if !prec.is_finite() {
            return self.format_no_error(FALLBACK_PRECISION);
        }
        let prec = (prec as i32).min(MAX_PRECISION).max(0);

        let scaled_error = error * 10f64.powi(prec);
        format!(
            "{}{:.*}({:.0}){}",
            sign,
            prec as usize,
            value,
            scaled_error,
            suffix(exponent)
        )
    }

    /// Render the value alone with `prec` decimals, using the same switch to
    /// scientific notation as [`format`](Self::format).
    pub fn format_no_error(&self, prec: usize) -> String {
        let (sign, mut value, exponent) = split_magnitude(self.value);
        if let Some(e) = exponent {
            value /= 10f64.powi(e);
        }
        format!("{}{:.*}{}", sign, prec, value, suffix(exponent))
    }

    /// Render the value with absolute and relative error, e.g.
    /// `"10.00(50) [5.00%]"`.
    pub fn format_full(&self) -> String {
        match self.rel_error {
            Some(rel) => format!("{} [{:.2}%]", self.format(), rel),
            None => self.format(),
        }
    }
}
