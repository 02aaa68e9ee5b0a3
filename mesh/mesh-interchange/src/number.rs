//! Locale-independent number parsing and formatting for text formats.
//!
//! The decimal separator is an explicit option threaded through every text
//! parser and writer instead of ambient process state.

use std::borrow::Cow;
use std::fmt::Display;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{IoError, IoResult};

/// Numeric text format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NumberFormat {
    /// Character separating the integer and fractional parts.
    pub decimal_separator: char,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self::INVARIANT
    }
}

impl NumberFormat {
    /// `1.5` style numbers, independent of the host locale.
    pub const INVARIANT: Self = Self {
        decimal_separator: '.',
    };

    /// Use a custom decimal separator.
    #[must_use]
    pub const fn with_decimal_separator(decimal_separator: char) -> Self {
        Self { decimal_separator }
    }

    fn normalize<'a>(&self, token: &'a str) -> Cow<'a, str> {
        if self.decimal_separator == '.' || !token.contains(self.decimal_separator) {
            Cow::Borrowed(token)
        } else {
            Cow::Owned(token.replace(self.decimal_separator, "."))
        }
    }

    /// Parse a floating point token.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::ParseFloat`] if the token is not a number.
    pub fn parse_f64(&self, token: &str) -> IoResult<f64> {
        Ok(self.normalize(token).parse::<f64>()?)
    }

    /// Parse a single precision floating point token.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::ParseFloat`] if the token is not a number.
    pub fn parse_f32(&self, token: &str) -> IoResult<f32> {
        Ok(self.normalize(token).parse::<f32>()?)
    }

    /// Parse an integer token. Integers have no decimal separator, so the
    /// format only matters for symmetry with the float parsers.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::ParseInt`] if the token is not an integer.
    pub fn parse_int<T>(&self, token: &str) -> IoResult<T>
    where
        T: FromStr<Err = std::num::ParseIntError>,
    {
        token.parse::<T>().map_err(IoError::from)
    }

    /// Format a number, substituting the decimal separator.
    #[must_use]
    pub fn format<T: Display>(&self, value: T) -> String {
        let text = value.to_string();
        if self.decimal_separator == '.' {
            text
        } else {
            text.replace('.', &self.decimal_separator.to_string())
        }
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn invariant_parsing() {
        let fmt = NumberFormat::default();
        assert_eq!(fmt.parse_f64("1.5").unwrap(), 1.5);
        assert_eq!(fmt.parse_f32("-2e3").unwrap(), -2000.0);
        assert_eq!(fmt.parse_int::<i64>("-7").unwrap(), -7);
        assert!(fmt.parse_f64("1,5").is_err());
    }

    #[test]
    fn comma_separator() {
        let fmt = NumberFormat::with_decimal_separator(',');
        assert_eq!(fmt.parse_f64("1,5").unwrap(), 1.5);
        assert_eq!(fmt.parse_f64("3").unwrap(), 3.0);
        assert_eq!(fmt.format(0.25), "0,25");
    }

    #[test]
    fn malformed_number_reports_parse_error() {
        let err = NumberFormat::INVARIANT.parse_f64("abc").unwrap_err();
        assert!(matches!(err, IoError::ParseFloat(_)));
    }
}
