//! Ports the order engine consumes.
//!
//! The engine codes against these traits only. `store::postgres` implements them
//! over sqlx, `store::memory` in process.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::{CartOwner, CartSummary, DeliveryOption, Order, OrderItem, OrderStatus, OrderWithItems, ProductSnapshot, StatusChange, StockDecrement};
use crate::domain::events::OrderEvent;
use crate::error::Result;

/// Filter for the paginated order listing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub page: u32,
    pub limit: u32,
}

impl OrderFilter {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            user_id: None, status: None,
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT),
        }
    }
    pub fn offset(&self) -> u64 { u64::from(self.page - 1) * u64::from(self.limit) }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> { pub data: Vec<T>, pub total: i64, pub page: u32, pub limit: u32 }

/// Transactional store for orders and the product stock they touch
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>>;
    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>>;
    /// Header and items in one consistent read
    async fn find_order_with_items(&self, order_id: Uuid) -> Result<Option<OrderWithItems>>;
    async fn list_orders(&self, filter: &OrderFilter) -> Result<Page<Order>>;
}

/// One open transaction. Dropping it without `commit` rolls it back.
#[async_trait]
pub trait StoreTx: Send {
    async fn insert_order(&mut self, order: &Order) -> Result<()>;
    async fn insert_items(&mut self, items: &[OrderItem]) -> Result<()>;
    /// Reads the header and holds its row lock until the transaction ends
    async fn lock_order(&mut self, order_id: Uuid) -> Result<Option<Order>>;
    async fn order_items(&mut self, order_id: Uuid) -> Result<Vec<OrderItem>>;
    async fn update_status(&mut self, change: &StatusChange) -> Result<Order>;

    /// Atomic conditional decrement; never lets stock go below zero
    async fn decrement_if_sufficient(&mut self, product_id: Uuid, amount: i32) -> Result<StockDecrement>;
    async fn increment(&mut self, product_id: Uuid, amount: i32) -> Result<i32>;

    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait CartService: Send + Sync {
    async fn summarize(&self, owner: &CartOwner) -> Result<CartSummary>;
    async fn clear(&self, owner: &CartOwner) -> Result<()>;
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn product_snapshot(&self, product_id: Uuid) -> Result<Option<ProductSnapshot>>;
}

#[async_trait]
pub trait DeliveryDirectory: Send + Sync {
    async fn lookup(&self, delivery_service_id: Uuid) -> Result<Option<DeliveryOption>>;
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &OrderEvent) -> anyhow::Result<()>;
}
