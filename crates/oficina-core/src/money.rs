//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Minor Units                                      │
//! │    R$ 150,00 is stored as 15000 centavos (i64)                         │
//! │    All arithmetic stays in integers from storage to display            │
//! │                                                                         │
//! │  Decimal input ("150.00" typed by a clerk) is converted ONCE at the    │
//! │  boundary via parse_decimal. Nothing downstream ever touches floats.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Currency Tag
//! Every value carries a 3-letter ISO code. Operations on mismatched
//! currencies fail with a `ValidationError` instead of producing garbage.
//!
//! ## Usage
//! ```rust
//! use oficina_core::money::{Currency, Money};
//!
//! let price = Money::from_cents(10_000, Currency::BRL); // R$ 100,00
//! let line = price.multiply_quantity(2);                // R$ 200,00
//! assert_eq!(line.cents(), 20_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Mul;
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Currency
// =============================================================================

/// A 3-letter uppercase ISO 4217 currency code.
///
/// Stored inline as bytes so `Money` stays `Copy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

impl Currency {
    /// Brazilian real, the shop's default currency.
    pub const BRL: Currency = Currency(*b"BRL");

    /// Parses a currency code. Must be exactly 3 ASCII uppercase letters.
    pub fn from_code(code: &str) -> Result<Currency, ValidationError> {
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(|b| b.is_ascii_uppercase()) {
            return Err(ValidationError::InvalidFormat {
                field: "currency".to_string(),
                reason: "must be a 3-letter uppercase code".to_string(),
            });
        }
        Ok(Currency([bytes[0], bytes[1], bytes[2]]))
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        // Invariant: constructed only from validated ASCII uppercase bytes.
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::BRL
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Currency {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::from_code(&value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.as_str().to_string()
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (centavos for BRL).
///
/// ## Design Decisions
/// - **i64 (signed)**: intermediate deltas may be negative; stored totals
///   are validated non-negative before persistence
/// - **Currency tag**: mixing currencies is a validation failure, never
///   silent coercion
/// - **No Add/Sub operators**: cross-currency addition must not look
///   innocent; use `checked_add`/`checked_sub`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money {
    cents: i64,
    #[ts(as = "String")]
    currency: Currency,
}

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ## Example
    /// ```rust
    /// use oficina_core::money::{Currency, Money};
    ///
    /// let price = Money::from_cents(15_000, Currency::BRL); // R$ 150,00
    /// assert_eq!(price.cents(), 15_000);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64, currency: Currency) -> Self {
        Money { cents, currency }
    }

    /// Convenience constructor for the default currency.
    #[inline]
    pub const fn brl(cents: i64) -> Self {
        Money::from_cents(cents, Currency::BRL)
    }

    /// Returns zero money in the given currency.
    #[inline]
    pub const fn zero(currency: Currency) -> Self {
        Money { cents: 0, currency }
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the currency tag.
    #[inline]
    pub const fn currency(&self) -> Currency {
        self.currency
    }

    /// Returns the major unit portion (reais for BRL).
    #[inline]
    pub const fn major_units(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the minor unit portion, always 0-99.
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.cents % 100).abs()
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.cents == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.cents > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity (for line totals).
    ///
    /// ## Example
    /// ```rust
    /// use oficina_core::money::Money;
    ///
    /// let unit_price = Money::brl(5_000); // R$ 50,00
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 15_000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money {
            cents: self.cents * qty,
            currency: self.currency,
        }
    }

    /// Adds two values of the SAME currency.
    ///
    /// Fails with `ValidationError::CurrencyMismatch` otherwise.
    pub fn checked_add(&self, other: Money) -> Result<Money, ValidationError> {
        self.require_same_currency(other)?;
        Ok(Money {
            cents: self.cents + other.cents,
            currency: self.currency,
        })
    }

    /// Subtracts a value of the SAME currency.
    pub fn checked_sub(&self, other: Money) -> Result<Money, ValidationError> {
        self.require_same_currency(other)?;
        Ok(Money {
            cents: self.cents - other.cents,
            currency: self.currency,
        })
    }

    fn require_same_currency(&self, other: Money) -> Result<(), ValidationError> {
        if self.currency != other.currency {
            return Err(ValidationError::CurrencyMismatch {
                expected: self.currency.as_str().to_string(),
                actual: other.currency.as_str().to_string(),
            });
        }
        Ok(())
    }

    /// Converts a decimal string ("150.00", "150.5", "150") to Money.
    ///
    /// This is THE boundary conversion: callers supplying decimal amounts
    /// (payment forms, imports) go through here exactly once. Integer math
    /// only; more than two fraction digits is rejected rather than rounded.
    ///
    /// ## Example
    /// ```rust
    /// use oficina_core::money::{Currency, Money};
    ///
    /// let amount = Money::parse_decimal("150.00", Currency::BRL).unwrap();
    /// assert_eq!(amount.cents(), 15_000);
    ///
    /// assert!(Money::parse_decimal("1.005", Currency::BRL).is_err());
    /// ```
    pub fn parse_decimal(input: &str, currency: Currency) -> Result<Money, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        if unsigned.is_empty() {
            return Err(invalid("amount is empty"));
        }

        let (major_str, minor_str) = match unsigned.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (unsigned, ""),
        };
        if major_str.is_empty() && minor_str.is_empty() {
            return Err(invalid("amount is empty"));
        }
        if minor_str.len() > 2 {
            return Err(invalid("more than two decimal places"));
        }
        if !major_str.chars().all(|c| c.is_ascii_digit())
            || !minor_str.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid("must contain only digits and one decimal point"));
        }

        let major: i64 = if major_str.is_empty() {
            0
        } else {
            major_str
                .parse()
                .map_err(|_| invalid("integer part out of range"))?
        };

        // "5" means 50 cents, "05" means 5 cents
        let minor: i64 = match minor_str.len() {
            0 => 0,
            1 => minor_str.parse::<i64>().map_err(|_| invalid("bad cents"))? * 10,
            _ => minor_str.parse().map_err(|_| invalid("bad cents"))?,
        };

        let cents = major
            .checked_mul(100)
            .and_then(|c| c.checked_add(minor))
            .ok_or_else(|| invalid("amount out of range"))?;

        Ok(Money {
            cents: if negative { -cents } else { cents },
            currency,
        })
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows `CODE major.minor`, e.g. `BRL 150.00`.
///
/// Locale-aware formatting (R$ 150,00) belongs to the frontend.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        write!(
            f,
            "{} {}{}.{:02}",
            self.currency,
            sign,
            self.major_units().abs(),
            self.minor_part()
        )
    }
}

/// Multiplication by integer quantity. Safe: cannot mix currencies.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

// =============================================================================
// sqlx Integration (feature-gated)
// =============================================================================
// Currency is persisted as its 3-letter TEXT code. These impls let row
// structs hold a typed Currency field while FromRow does the mapping.

#[cfg(feature = "sqlx")]
mod sqlx_impls {
    use std::borrow::Cow;

    use sqlx::encode::IsNull;
    use sqlx::error::BoxDynError;
    use sqlx::sqlite::{Sqlite, SqliteArgumentValue, SqliteTypeInfo, SqliteValueRef};
    use sqlx::{Decode, Encode, Type};

    use super::Currency;

    impl Type<Sqlite> for Currency {
        fn type_info() -> SqliteTypeInfo {
            <&str as Type<Sqlite>>::type_info()
        }

        fn compatible(ty: &SqliteTypeInfo) -> bool {
            <&str as Type<Sqlite>>::compatible(ty)
        }
    }

    impl<'q> Encode<'q, Sqlite> for Currency {
        fn encode_by_ref(
            &self,
            buf: &mut Vec<SqliteArgumentValue<'q>>,
        ) -> Result<IsNull, BoxDynError> {
            buf.push(SqliteArgumentValue::Text(Cow::Owned(
                self.as_str().to_owned(),
            )));
            Ok(IsNull::No)
        }
    }

    impl<'r> Decode<'r, Sqlite> for Currency {
        fn decode(value: SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
            let text = <&str as Decode<Sqlite>>::decode(value)?;
            Ok(Currency::from_code(text)?)
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(15_000, Currency::BRL);
        assert_eq!(money.cents(), 15_000);
        assert_eq!(money.major_units(), 150);
        assert_eq!(money.minor_part(), 0);
        assert_eq!(money.currency(), Currency::BRL);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::brl(15_000)), "BRL 150.00");
        assert_eq!(format!("{}", Money::brl(1_099)), "BRL 10.99");
        assert_eq!(format!("{}", Money::brl(-550)), "BRL -5.50");
        assert_eq!(format!("{}", Money::brl(0)), "BRL 0.00");
    }

    #[test]
    fn test_checked_arithmetic_same_currency() {
        let a = Money::brl(10_000);
        let b = Money::brl(5_000);

        assert_eq!(a.checked_add(b).unwrap().cents(), 15_000);
        assert_eq!(a.checked_sub(b).unwrap().cents(), 5_000);
    }

    #[test]
    fn test_checked_arithmetic_rejects_mismatch() {
        let real = Money::brl(100);
        let dollar = Money::from_cents(100, Currency::from_code("USD").unwrap());

        assert!(matches!(
            real.checked_add(dollar),
            Err(ValidationError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn test_multiply_quantity() {
        let unit_price = Money::brl(5_000);
        assert_eq!(unit_price.multiply_quantity(3).cents(), 15_000);
        assert_eq!((unit_price * 2).cents(), 10_000);
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(
            Money::parse_decimal("150.00", Currency::BRL).unwrap().cents(),
            15_000
        );
        assert_eq!(
            Money::parse_decimal("150.5", Currency::BRL).unwrap().cents(),
            15_050
        );
        assert_eq!(
            Money::parse_decimal("150", Currency::BRL).unwrap().cents(),
            15_000
        );
        assert_eq!(
            Money::parse_decimal("0.01", Currency::BRL).unwrap().cents(),
            1
        );
        assert_eq!(
            Money::parse_decimal("-3.25", Currency::BRL).unwrap().cents(),
            -325
        );
    }

    #[test]
    fn test_parse_decimal_rejects_bad_input() {
        for bad in ["", "-", ".", "1.005", "abc", "1,50", "1.2.3"] {
            assert!(
                Money::parse_decimal(bad, Currency::BRL).is_err(),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_currency_from_code() {
        assert!(Currency::from_code("BRL").is_ok());
        assert!(Currency::from_code("usd").is_err());
        assert!(Currency::from_code("BRLX").is_err());
        assert!(Currency::from_code("B1").is_err());
    }

    #[test]
    fn test_zero_and_sign_checks() {
        let zero = Money::zero(Currency::BRL);
        assert!(zero.is_zero());
        assert!(!zero.is_positive());

        assert!(Money::brl(100).is_positive());
        assert!(Money::brl(-100).is_negative());
    }
}
