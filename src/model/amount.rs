//! Amount type for handling monetary values.
//!
//! This module provides the `Amount` type which wraps `Decimal`. The stored document holds amounts
//! as JSON numbers, but older documents may hold numeric strings, and a hand-edited document may
//! hold anything at all. Deserialization is tolerant: anything that is not a number becomes zero.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;
use tracing::warn;

/// Represents an amount of money.
///
/// # Examples
///
/// ```
/// # use cashflow_sync::model::Amount;
/// # use std::str::FromStr;
/// let amount = Amount::from_str("1234.5").unwrap();
/// assert_eq!(amount.to_string(), "1,234.50");
/// assert_eq!(amount.text(), "1234.5");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount {
    value: Decimal,
}

/// New transactions may not exceed this, so that no realistic number of them can overflow a sum.
const MAX_NEW: i64 = 1_000_000_000_000_000;

impl Amount {
    pub const ZERO: Amount = Amount::new(Decimal::ZERO);

    pub const fn new(value: Decimal) -> Self {
        Self { value }
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.value
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Returns true if the amount is greater than zero.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.value.is_sign_positive()
    }

    /// The literal decimal text of the amount, without formatting, e.g. `1234.5`. This is what
    /// free-text searches match against.
    pub fn text(&self) -> String {
        self.value.normalize().to_string()
    }

    /// True when the amount is small enough for a new transaction.
    pub fn within_limit(&self) -> bool {
        self.value <= Decimal::from(MAX_NEW)
    }

    /// True when the amount reads back unchanged after being written to the stored document,
    /// where it is a JSON number with double precision. `0.1` does, `12345678901234567.89` does
    /// not.
    pub fn round_trips(&self) -> bool {
        serde_json::to_value(self)
            .and_then(|json| Amount::deserialize(&json))
            .is_ok_and(|back| back == *self)
    }

    /// Formats the amount with a currency symbol, e.g. `₱1,234.50` or `-₱40.00`.
    pub fn with_symbol(&self, symbol: &str) -> String {
        if self.value.is_sign_negative() && !self.is_zero() {
            format!("-{symbol}{}", Amount::new(self.value.abs()))
        } else {
            format!("{symbol}{self}")
        }
    }
}

/// An error that can occur when parsing strings into `Amount` values.
pub struct AmountError(rust_decimal::Error);

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::error::Error for AmountError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let value = Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map_err(AmountError)?;
        Ok(Amount::new(value))
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let rounded = self.value.round_dp(2);
        write!(
            f,
            "{}",
            format_num::format_num!(",.2", rounded.to_f64().unwrap_or_default())
        )
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.value.fract().is_zero() {
            if let Some(i) = self.value.to_i64() {
                return serializer.serialize_i64(i);
            }
        }
        serializer.serialize_f64(self.value.to_f64().unwrap_or_default())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(AmountVisitor)
    }
}

struct AmountVisitor;

impl AmountVisitor {
    fn malformed<E: de::Error>(what: impl Display) -> Result<Amount, E> {
        warn!("Treating malformed amount {what} as 0");
        Ok(Amount::ZERO)
    }
}

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("a number or a numeric string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        Ok(Amount::new(Decimal::from(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        Ok(Amount::new(Decimal::from(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
        // The shortest representation that round-trips the f64, e.g. 0.1 rather than
        // 0.1000000000000000055511151231257827.
        match Amount::from_str(&v.to_string()) {
            Ok(amount) => Ok(amount),
            Err(_) => match Decimal::from_f64(v) {
                Some(value) => Ok(Amount::new(value)),
                None => Self::malformed(v),
            },
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        match Amount::from_str(v) {
            Ok(amount) => Ok(amount),
            Err(_) => Self::malformed(format!("'{v}'")),
        }
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Amount, E> {
        Self::malformed(v)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Amount, E> {
        Self::malformed("null")
    }

    fn visit_none<E: de::Error>(self) -> Result<Amount, E> {
        Self::malformed("null")
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Amount, A::Error> {
        while seq.next_element::<de::IgnoredAny>()?.is_some() {}
        Self::malformed("array")
    }

    fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<Amount, A::Error> {
        while map.next_entry::<de::IgnoredAny, de::IgnoredAny>()?.is_some() {}
        Self::malformed("object")
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}
