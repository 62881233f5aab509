//! Cart Aggregate
//!
//! The cart itself belongs to the cart service; checkout only sees its summary.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;
use crate::domain::value_objects::{Money, MoneyError, Quantity};

/// Whose cart: an authenticated user or a guest session
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CartOwner { User(Uuid), Session(String) }

impl fmt::Display for CartOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::User(id) => write!(f, "user:{id}"), Self::Session(s) => write!(f, "session:{s}") }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub final_price_minor: Money,
    pub quantity: Quantity,
}

impl CartLine {
    pub fn line_total(&self) -> Result<Money, MoneyError> { self.final_price_minor.times(self.quantity) }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub items: Vec<CartLine>,
    pub total_value_minor: Money,
}

impl CartSummary {
    pub fn from_lines(items: Vec<CartLine>) -> Result<Self, MoneyError> {
        let total_value_minor = items.iter().try_fold(Money::ZERO, |acc, l| acc.checked_add(l.line_total()?))?;
        Ok(Self { items, total_value_minor })
    }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn quantities(&self) -> HashMap<Uuid, i32> {
        self.items.iter().map(|l| (l.product_id, l.quantity.value())).collect()
    }
    pub fn line(&self, product_id: Uuid) -> Option<&CartLine> { self.items.iter().find(|l| l.product_id == product_id) }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_summary_totals() {
        let a = Uuid::new_v4();
        let summary = CartSummary::from_lines(vec![
            CartLine { product_id: a, product_name: "Blender".into(), final_price_minor: Money::from_minor(50_000).unwrap(), quantity: Quantity::new(2).unwrap() },
            CartLine { product_id: Uuid::new_v4(), product_name: "Toaster".into(), final_price_minor: Money::from_minor(12_000).unwrap(), quantity: Quantity::new(1).unwrap() },
        ]).unwrap();
        assert_eq!(summary.total_value_minor.minor(), 112_000);
        assert_eq!(summary.quantities()[&a], 2);
    }
}
