//! Domain events
use crate::domain::aggregates::{Order, OrderStatus};
use crate::domain::value_objects::Money;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { order_id: Uuid, user_id: Uuid, total_amount_minor: Money, item_count: usize, at: DateTime<Utc> },
    StatusChanged { order_id: Uuid, from: OrderStatus, to: OrderStatus, at: DateTime<Utc> },
    Cancelled { order_id: Uuid, from: OrderStatus, stock_released: bool, at: DateTime<Utc> },
}

impl OrderEvent {
    pub fn transition(order: &Order, from: OrderStatus) -> Self {
        match order.status {
            OrderStatus::Cancelled => Self::Cancelled {
                order_id: order.id, from, stock_released: from == OrderStatus::Confirmed, at: order.updated_at,
            },
            to => Self::StatusChanged { order_id: order.id, from, to, at: order.updated_at },
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            Self::Created { .. } => "orders.created",
            Self::StatusChanged { .. } => "orders.status_changed",
            Self::Cancelled { .. } => "orders.cancelled",
        }
    }

    pub fn order_id(&self) -> Uuid {
        match self { Self::Created { order_id, .. } | Self::StatusChanged { order_id, .. } | Self::Cancelled { order_id, .. } => *order_id }
    }
}
