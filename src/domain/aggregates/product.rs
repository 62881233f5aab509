//! Catalog-side views consumed by the order engine

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::Money;

/// Read-only product view, price already discounted
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub id: Uuid,
    pub name: String,
    pub price_minor: Money,
    pub final_price_minor: Money,
    pub stock_quantity: i32,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOption { pub id: Uuid, pub base_cost_minor: Money, pub is_active: bool }

/// Outcome of a conditional stock decrement
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StockDecrement {
    Applied { new_stock: i32 },
    Insufficient { available: i32 },
}
