//! Decimal amounts as typed into the payment form.
//!
//! [`MoneyAmount`] holds the exact decimal value of an amount string such as
//! `"0.01"` or `"1000000"`. The original precision is preserved so the amount
//! can be scaled to a token's base units without floating point rounding.
//!
//! # Accepted input
//!
//! Only plain unsigned decimals are accepted: digits with at most one dot
//! (`"10"`, `"0.5"`, `".5"`, `"5."`). The same pattern decides which keystrokes
//! the form keeps, see [`MoneyAmount::is_acceptable_input`].
//!
//! ```rust
//! use telopay::util::money_amount::MoneyAmount;
//!
//! let amount = MoneyAmount::parse("10.50").unwrap();
//! assert_eq!(amount.scale(), 2);
//! assert_eq!(amount.mantissa(), 1050);
//! ```

use regex::Regex;
use rust_decimal::Decimal;
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::LazyLock;

static AMOUNT_INPUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d*\.?\d*$").expect("valid amount regex"));

/// A non-negative decimal amount with its original precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MoneyAmount(pub Decimal);

/// Errors that can occur when parsing a monetary amount.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MoneyAmountParseError {
    /// The input string is not a plain unsigned decimal.
    #[error("Invalid number format")]
    InvalidFormat,
    /// The value does not fit into a 96-bit decimal mantissa.
    #[error("Amount is too large")]
    OutOfRange,
    /// The input has more decimal places than the token supports.
    #[error("Too big of a precision: {money} vs {token} on token")]
    WrongPrecision {
        /// Decimal places in the input.
        money: u32,
        /// Decimal places supported by the token.
        token: u32,
    },
}

impl MoneyAmount {
    /// Whether `input` may stand in the amount field at all.
    ///
    /// Empty input is acceptable (the field was cleared), as are partial
    /// entries like `"0."` that do not parse yet.
    pub fn is_acceptable_input(input: &str) -> bool {
        input.is_empty() || AMOUNT_INPUT.is_match(input)
    }

    /// Parses a plain unsigned decimal string.
    pub fn parse(input: &str) -> Result<Self, MoneyAmountParseError> {
        if input.is_empty() || !AMOUNT_INPUT.is_match(input) {
            return Err(MoneyAmountParseError::InvalidFormat);
        }
        let normalized = input.strip_suffix('.').unwrap_or(input);
        let normalized = match normalized.strip_prefix('.') {
            Some(fraction) => format!("0.{fraction}"),
            None => normalized.to_string(),
        };
        if normalized.is_empty() {
            return Err(MoneyAmountParseError::InvalidFormat);
        }
        // The pattern already guarantees digits and a single dot, so a parse
        // failure here can only be an overflow.
        let parsed =
            Decimal::from_str(&normalized).map_err(|_| MoneyAmountParseError::OutOfRange)?;
        Ok(MoneyAmount(parsed))
    }

    /// Returns the number of digits after the decimal point in the original input.
    pub fn scale(&self) -> u32 {
        self.0.scale()
    }

    /// Returns the value as an unsigned integer without the decimal point.
    ///
    /// For example, `"12.34"` returns `1234`.
    pub fn mantissa(&self) -> u128 {
        self.0.mantissa().unsigned_abs()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl FromStr for MoneyAmount {
    type Err = MoneyAmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MoneyAmount::parse(s)
    }
}

impl TryFrom<&str> for MoneyAmount {
    type Error = MoneyAmountParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        MoneyAmount::from_str(value)
    }
}

impl From<Decimal> for MoneyAmount {
    fn from(value: Decimal) -> Self {
        MoneyAmount(value)
    }
}

impl Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole_and_fraction() {
        let amount = MoneyAmount::parse("10.50").unwrap();
        assert_eq!(amount.scale(), 2);
        assert_eq!(amount.mantissa(), 1050);
        assert_eq!(amount.to_string(), "10.5");
    }

    #[test]
    fn test_parse_leading_and_trailing_dot() {
        assert_eq!(MoneyAmount::parse(".5").unwrap().0, Decimal::new(5, 1));
        assert_eq!(MoneyAmount::parse("5.").unwrap().0, Decimal::from(5));
    }

    #[test]
    fn test_parse_zero() {
        assert!(MoneyAmount::parse("0").unwrap().is_zero());
        assert!(MoneyAmount::parse("0.000").unwrap().is_zero());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(MoneyAmount::parse(""), Err(MoneyAmountParseError::InvalidFormat));
        assert_eq!(MoneyAmount::parse("."), Err(MoneyAmountParseError::InvalidFormat));
        assert_eq!(MoneyAmount::parse("-1"), Err(MoneyAmountParseError::InvalidFormat));
        assert_eq!(MoneyAmount::parse("1e5"), Err(MoneyAmountParseError::InvalidFormat));
        assert_eq!(MoneyAmount::parse("$10"), Err(MoneyAmountParseError::InvalidFormat));
        assert_eq!(MoneyAmount::parse("1.2.3"), Err(MoneyAmountParseError::InvalidFormat));
    }

    #[test]
    fn test_parse_too_large() {
        let huge = "9".repeat(40);
        assert_eq!(MoneyAmount::parse(&huge), Err(MoneyAmountParseError::OutOfRange));
    }

    #[test]
    fn test_acceptable_input() {
        assert!(MoneyAmount::is_acceptable_input(""));
        assert!(MoneyAmount::is_acceptable_input("0."));
        assert!(MoneyAmount::is_acceptable_input("."));
        assert!(MoneyAmount::is_acceptable_input("123.456"));
        assert!(!MoneyAmount::is_acceptable_input("12a"));
        assert!(!MoneyAmount::is_acceptable_input("1,000"));
        assert!(!MoneyAmount::is_acceptable_input(" 1"));
    }

    #[test]
    fn test_ordering_follows_value() {
        let small = MoneyAmount::parse("0.00005").unwrap();
        let min = MoneyAmount::parse("0.0001").unwrap();
        assert!(small < min);
    }
}
