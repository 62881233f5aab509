//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;
use crate::domain::value_objects::{Money, MoneyError, Quantity};

/// Orders are always paid on delivery
pub const PAYMENT_CASH_ON_DELIVERY: &str = "cash-on-delivery";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { Pending, Confirmed, Shipped, Delivered, Cancelled }

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [Self::Pending, Self::Confirmed, Self::Shipped, Self::Delivered, Self::Cancelled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Stored status text that is not one of the five known values
#[derive(Debug, Clone, PartialEq, Eq)] pub struct UnknownStatus(pub String);
impl std::error::Error for UnknownStatus {}
impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "unknown order status {:?}", self.0) }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|st| st.as_str() == s).ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Address as submitted at checkout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub province: String,
    pub city: String,
    pub phone_number1: String,
    pub phone_number2: Option<String>,
}

/// Shipping details frozen onto the order header
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingSnapshot { pub province: String, pub city: String, pub phone1: String, pub phone2: Option<String> }

impl From<&ShippingAddress> for ShippingSnapshot {
    fn from(a: &ShippingAddress) -> Self {
        Self { province: a.province.clone(), city: a.city.clone(), phone1: a.phone_number1.clone(), phone2: a.phone_number2.clone() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_full_name: String,
    pub status: OrderStatus,
    pub total_amount_minor: Money,
    pub payment_method: String,
    pub shipping: ShippingSnapshot,
    pub notes: Option<String>,
    pub delivery_service_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub price_minor: Money,
    pub quantity: Quantity,
    pub subtotal_minor: Money,
}

impl OrderItem {
    pub fn line(order_id: Uuid, product_id: Uuid, product_name: impl Into<String>, price_minor: Money, quantity: Quantity) -> Result<Self, MoneyError> {
        Ok(Self {
            id: Uuid::now_v7(), order_id, product_id, product_name: product_name.into(),
            price_minor, quantity, subtotal_minor: price_minor.times(quantity)?,
        })
    }
}

/// Header plus all of its lines, read as one unit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl OrderWithItems {
    pub fn items_total(&self) -> Result<Money, MoneyError> {
        self.items.iter().try_fold(Money::ZERO, |acc, i| acc.checked_add(i.subtotal_minor))
    }
}

/// Row-level effect of a status transition
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusChange {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl StatusChange {
    pub fn entering(order: &Order, status: OrderStatus, now: DateTime<Utc>) -> Self {
        Self {
            order_id: order.id, status, updated_at: now,
            completed_at: if status == OrderStatus::Delivered { Some(now) } else { order.completed_at },
            cancelled_at: if status == OrderStatus::Cancelled { Some(now) } else { order.cancelled_at },
        }
    }
}

impl Order {
    pub fn apply(&mut self, change: &StatusChange) {
        self.status = change.status;
        self.updated_at = change.updated_at;
        self.completed_at = change.completed_at;
        self.cancelled_at = change.cancelled_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::now_v7(), user_id: Uuid::new_v4(), user_full_name: "Ada Obi".into(), status: OrderStatus::Shipped,
            total_amount_minor: Money::from_minor(1000).unwrap(), payment_method: PAYMENT_CASH_ON_DELIVERY.into(),
            shipping: ShippingSnapshot { province: "Lagos".into(), city: "Ikeja".into(), phone1: "0801".into(), phone2: None },
            notes: None, delivery_service_id: Uuid::new_v4(), created_at: now, updated_at: now, completed_at: None, cancelled_at: None,
        }
    }

    #[test]
    fn test_status_text() {
        for st in OrderStatus::ALL { assert_eq!(st.as_str().parse::<OrderStatus>(), Ok(st)); }
        assert_eq!("Pending".parse::<OrderStatus>(), Err(UnknownStatus("Pending".into())));
        assert_eq!(serde_json::to_string(&OrderStatus::Cancelled).unwrap(), "\"cancelled\"");
    }

    #[test]
    fn test_delivery_sets_completed_at() {
        let mut o = order();
        let now = Utc::now();
        let change = StatusChange::entering(&o, OrderStatus::Delivered, now);
        o.apply(&change);
        assert_eq!(o.status, OrderStatus::Delivered);
        assert_eq!(o.completed_at, Some(now));
        assert_eq!(o.cancelled_at, None);
    }

    #[test]
    fn test_line_subtotal() {
        let item = OrderItem::line(Uuid::now_v7(), Uuid::new_v4(), "Kettle", Money::from_minor(12_000).unwrap(), Quantity::new(3).unwrap()).unwrap();
        assert_eq!(item.subtotal_minor.minor(), 36_000);
    }

    #[test]
    fn test_json_shape() {
        let v = serde_json::to_value(OrderWithItems { order: order(), items: vec![] }).unwrap();
        assert_eq!(v["status"], "shipped");
        assert_eq!(v["totalAmountMinor"], 1000);
        assert_eq!(v["paymentMethod"], "cash-on-delivery");
        assert!(v["items"].as_array().unwrap().is_empty());
    }
}
