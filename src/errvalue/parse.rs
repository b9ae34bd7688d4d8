//! Parser for the compact `value(error)` notation.
//!
//! Grammar (surrounding whitespace ignored):
//!
//! ```text
//! [sign] mantissa [exponent] ["(" digits ")"] [exponent]
//! ```
//!
//! The parenthesized digits count units of the mantissa's last printed
//! decimal place. An exponent may appear before or after the parenthetical,
//! but not in both places.

use nom::{
    branch::alt,
    character::complete::{char, digit0, digit1, one_of},
    combinator::{opt, recognize},
    sequence::delimited,
    IResult, Parser,
};

use super::ErrValue;
use crate::error::{Result, SpecFitError};

/// Sign, mantissa, exponent before, error digits, exponent after.
type Pieces<'a> = (
    Option<char>,
    &'a str,
    Option<&'a str>,
    Option<&'a str>,
    Option<&'a str>,
);

fn sign(input: &str) -> IResult<&str, Option<char>> {
    opt(one_of("+-")).parse(input)
}

/// `12`, `12.`, `12.34` or `.34`
fn mantissa(input: &str) -> IResult<&str, &str> {
    alt((
        recognize((digit1, opt((char('.'), digit0)))),
        recognize((char('.'), digit1)),
    ))
    .parse(input)
}

/// `e7`, `E-3`, `e+12`
fn exponent(input: &str) -> IResult<&str, &str> {
    recognize((one_of("eE"), opt(one_of("+-")), digit1)).parse(input)
}

/// `(56)`
fn error_digits(input: &str) -> IResult<&str, &str> {
    delimited(char('('), digit1, char(')')).parse(input)
}

fn compact(input: &str) -> IResult<&str, Pieces<'_>> {
    (
        sign,
        mantissa,
        opt(exponent),
        opt(error_digits),
        opt(exponent),
    )
        .parse(input)
}

pub(crate) fn parse_errvalue(text: &str) -> Result<ErrValue> {
    let malformed = || SpecFitError::Parse(format!("malformed value '{}'", text));

    let (rest, (sign, mantissa, exp_before, error, exp_after)) =
        compact(text.trim()).map_err(|_| malformed())?;
    if !rest.is_empty() {
        return Err(malformed());
    }

    let exponent: i32 = match (exp_before, exp_after) {
        (Some(_), Some(_)) => return Err(malformed()),
        (Some(e), None) | (None, Some(e)) => e[1..].parse().map_err(|_| malformed())?,
        (None, None) => 0,
    };

    let sign = if sign == Some('-') { "-" } else { "" };
    let value: f64 = format!("{}{}e{}", sign, mantissa, exponent)
        .parse()
        .map_err(|_| malformed())?;

    let error = match error {
        Some(digits) => {
            let decimals = mantissa
                .split_once('.')
                .map_or(0, |(_, fraction)| fraction.len()) as i32;
            format!("{}e{}", digits, exponent - decimals)
                .parse()
                .map_err(|_| malformed())?
        }
        None => 0.0,
    };

    Ok(ErrValue::new(value, error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_value_with_error() {
        let v = parse_errvalue("0.1234(56)").unwrap();
        assert_eq!(v.value(), 0.1234);
        assert_relative_eq!(v.error(), 0.0056, epsilon = 1e-15);

        let v = parse_errvalue("12.3456(78)").unwrap();
        assert_eq!(v.value(), 12.3456);
        assert_relative_eq!(v.error(), 0.0078, epsilon = 1e-15);
    }

    #[test]
    fn test_error_scale_follows_printed_decimals() {
        let v = parse_errvalue("12.0(5)").unwrap();
        assert_relative_eq!(v.error(), 0.5, epsilon = 1e-15);

        let v = parse_errvalue("1332(3)").unwrap();
        assert_relative_eq!(v.error(), 3.0);
    }

    #[test]
    fn test_without_error() {
        let v = parse_errvalue("  12.0 ").unwrap();
        assert_eq!(v.value(), 12.0);
        assert_eq!(v.error(), 0.0);

        let v = parse_errvalue("-.5").unwrap();
        assert_eq!(v.value(), -0.5);
    }

    #[test]
    fn test_exponent_placement() {
        let after = parse_errvalue("1.23(45)e7").unwrap();
        assert_relative_eq!(after.value(), 1.23e7);
        assert_relative_eq!(after.error(), 0.45e7);

        let before = parse_errvalue("1.0e7(3)").unwrap();
        assert_relative_eq!(before.value(), 1.0e7);
        assert_relative_eq!(before.error(), 3.0e6);

        let negative = parse_errvalue("-4.5(12)E-3").unwrap();
        assert_relative_eq!(negative.value(), -4.5e-3);
        assert_relative_eq!(negative.error(), 1.2e-3);
    }

    #[test]
    fn test_malformed_input() {
        for text in ["", "-", "abc", "1.2(3", "1.2(x)", "1.2(3)4", "1e3(2)e4", "1.5e", "(3)"] {
            assert!(
                matches!(parse_errvalue(text), Err(SpecFitError::Parse(_))),
                "'{}' should not parse",
                text
            );
        }
    }
}
