//! Value Objects for Orders

use serde::{Deserialize, Serialize};
use std::fmt;

/// Money value object, integer minor units of the store currency
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor(minor: i64) -> Result<Self, MoneyError> {
        if minor < 0 { return Err(MoneyError::Negative(minor)); }
        Ok(Self(minor))
    }
    pub fn minor(&self) -> i64 { self.0 }
    pub fn checked_add(&self, other: Money) -> Result<Money, MoneyError> {
        self.0.checked_add(other.0).map(Money).ok_or(MoneyError::Overflow)
    }
    pub fn times(&self, qty: Quantity) -> Result<Money, MoneyError> {
        self.0.checked_mul(i64::from(qty.value())).map(Money).ok_or(MoneyError::Overflow)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum MoneyError { Negative(i64), Overflow }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Negative(v) => write!(f, "negative amount {v}"),
            Self::Overflow => write!(f, "amount overflow"),
        }
    }
}

/// Line quantity, always at least one
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Quantity(i32);

impl Quantity {
    pub fn new(value: i32) -> Option<Self> { (value >= 1).then_some(Self(value)) }
    pub fn value(&self) -> i32 { self.0 }
}

impl TryFrom<i32> for Quantity {
    type Error = String;
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("quantity must be at least 1, got {value}"))
    }
}

impl From<Quantity> for i32 { fn from(q: Quantity) -> i32 { q.0 } }

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_money_rejects_negative() { assert_eq!(Money::from_minor(-1), Err(MoneyError::Negative(-1))); }
    #[test]
    fn test_line_total() {
        let price = Money::from_minor(50_000).unwrap();
        assert_eq!(price.times(Quantity::new(2).unwrap()).unwrap().minor(), 100_000);
    }
    #[test]
    fn test_overflow_is_reported() {
        let big = Money::from_minor(i64::MAX).unwrap();
        assert_eq!(big.checked_add(Money::from_minor(1).unwrap()), Err(MoneyError::Overflow));
        assert_eq!(big.times(Quantity::new(2).unwrap()), Err(MoneyError::Overflow));
    }
    #[test]
    fn test_quantity_bounds() {
        assert!(Quantity::new(0).is_none());
        assert!(Quantity::new(-3).is_none());
        assert_eq!(Quantity::new(1).map(|q| q.value()), Some(1));
        assert!(serde_json::from_str::<Quantity>("0").is_err());
    }
}
