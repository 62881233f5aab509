//! In-process implementation of every port, for tests and local runs.
//!
//! Stock mutations are applied immediately under the store mutex, which keeps
//! the conditional decrement atomic, and are undone if the transaction rolls
//! back or is dropped. Order rows become visible on commit. `lock_order`
//! holds a per-order async lock until the transaction ends.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::aggregates::{CartLine, CartOwner, CartSummary, DeliveryOption, Order, OrderItem, OrderWithItems, ProductSnapshot, StatusChange, StockDecrement};
use crate::domain::value_objects::{Money, MoneyError, Quantity};
use crate::error::{OrderError, Result};
use crate::ports::{CartService, Catalog, DeliveryDirectory, OrderFilter, OrderStore, Page, StoreTx};

#[derive(Clone, Debug)]
struct ProductRecord { name: String, price_minor: Money, discount_percent: i64, stock_quantity: i32, active: bool }

impl ProductRecord {
    fn final_price(&self) -> std::result::Result<Money, MoneyError> {
        let price = self.price_minor.minor();
        let discount = price.checked_mul(self.discount_percent).ok_or(MoneyError::Overflow)? / 100;
        Money::from_minor(price - discount)
    }
}

#[derive(Default)]
struct State {
    orders: HashMap<Uuid, Order>,
    items: HashMap<Uuid, Vec<OrderItem>>,
    products: HashMap<Uuid, ProductRecord>,
    carts: HashMap<CartOwner, Vec<(Uuid, Quantity)>>,
    deliveries: HashMap<Uuid, DeliveryOption>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    row_locks: Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>,
    write_latency: Duration,
    commit_latency: Duration,
    fail_cart_clear: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Every transactional write sleeps this long first
    pub fn with_write_latency(mut self, latency: Duration) -> Self { self.write_latency = latency; self }

    /// Commit applies its writes, then takes this long to acknowledge
    pub fn with_commit_latency(mut self, latency: Duration) -> Self { self.commit_latency = latency; self }

    pub fn add_product(&self, name: &str, price_minor: i64, stock_quantity: i32) -> Uuid {
        let id = Uuid::now_v7();
        let price_minor = Money::from_minor(price_minor).unwrap_or(Money::ZERO);
        self.state.lock().products.insert(id, ProductRecord { name: name.to_string(), price_minor, discount_percent: 0, stock_quantity, active: true });
        id
    }

    pub fn set_discount(&self, product_id: Uuid, percent: i64) {
        if let Some(p) = self.state.lock().products.get_mut(&product_id) { p.discount_percent = percent.clamp(0, 100); }
    }

    pub fn set_price(&self, product_id: Uuid, price_minor: i64) {
        if let (Some(p), Ok(price)) = (self.state.lock().products.get_mut(&product_id), Money::from_minor(price_minor)) { p.price_minor = price; }
    }

    pub fn set_stock(&self, product_id: Uuid, stock_quantity: i32) {
        if let Some(p) = self.state.lock().products.get_mut(&product_id) { p.stock_quantity = stock_quantity; }
    }

    pub fn set_product_active(&self, product_id: Uuid, active: bool) {
        if let Some(p) = self.state.lock().products.get_mut(&product_id) { p.active = active; }
    }

    pub fn remove_product(&self, product_id: Uuid) { self.state.lock().products.remove(&product_id); }

    pub fn stock(&self, product_id: Uuid) -> Option<i32> { self.state.lock().products.get(&product_id).map(|p| p.stock_quantity) }

    pub fn add_delivery_option(&self, base_cost_minor: i64) -> Uuid {
        let id = Uuid::now_v7();
        let base_cost_minor = Money::from_minor(base_cost_minor).unwrap_or(Money::ZERO);
        self.state.lock().deliveries.insert(id, DeliveryOption { id, base_cost_minor, is_active: true });
        id
    }

    pub fn set_delivery_active(&self, id: Uuid, active: bool) {
        if let Some(d) = self.state.lock().deliveries.get_mut(&id) { d.is_active = active; }
    }

    /// Sets the cart line for `product_id`, replacing any previous quantity
    pub fn put_in_cart(&self, owner: &CartOwner, product_id: Uuid, quantity: i32) {
        let mut st = self.state.lock();
        let lines = st.carts.entry(owner.clone()).or_default();
        lines.retain(|(id, _)| *id != product_id);
        if let Some(q) = Quantity::new(quantity) { lines.push((product_id, q)); }
    }

    pub fn fail_cart_clear(&self, fail: bool) { self.fail_cart_clear.store(fail, Ordering::SeqCst); }

    pub fn order_count(&self) -> usize { self.state.lock().orders.len() }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        Ok(Box::new(MemoryTx {
            state: self.state.clone(), row_locks: self.row_locks.clone(),
            write_latency: self.write_latency, commit_latency: self.commit_latency,
            new_orders: vec![], new_items: vec![], updates: HashMap::new(), stock_undo: vec![],
            locked: HashSet::new(), guards: vec![], done: false,
        }))
    }

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>> {
        Ok(self.state.lock().orders.get(&order_id).cloned())
    }

    async fn find_order_with_items(&self, order_id: Uuid) -> Result<Option<OrderWithItems>> {
        let st = self.state.lock();
        Ok(st.orders.get(&order_id).map(|order| OrderWithItems {
            order: order.clone(),
            items: st.items.get(&order_id).cloned().unwrap_or_default(),
        }))
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Page<Order>> {
        let st = self.state.lock();
        let mut matching: Vec<&Order> = st.orders.values()
            .filter(|o| filter.user_id.map_or(true, |u| o.user_id == u))
            .filter(|o| filter.status.map_or(true, |s| o.status == s))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let total = matching.len() as i64;
        let data = matching.into_iter().skip(filter.offset() as usize).take(filter.limit as usize).cloned().collect();
        Ok(Page { data, total, page: filter.page, limit: filter.limit })
    }
}

struct MemoryTx {
    state: Arc<Mutex<State>>,
    write_latency: Duration,
    new_orders: Vec<Order>,
    new_items: Vec<OrderItem>,
    updates: HashMap<Uuid, Order>,
    row_locks: Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>,
    commit_latency: Duration,
    /// Stock deltas to add back on rollback
    stock_undo: Vec<(Uuid, i32)>,
    locked: HashSet<Uuid>,
    guards: Vec<OwnedMutexGuard<()>>,
    done: bool,
}

impl MemoryTx {
    async fn pause(&self) {
        if !self.write_latency.is_zero() { tokio::time::sleep(self.write_latency).await; }
    }

    fn visible_order(&self, order_id: Uuid) -> Option<Order> {
        if let Some(o) = self.updates.get(&order_id) { return Some(o.clone()); }
        if let Some(o) = self.new_orders.iter().find(|o| o.id == order_id) { return Some(o.clone()); }
        self.state.lock().orders.get(&order_id).cloned()
    }

    fn undo_stock(&mut self) {
        let mut st = self.state.lock();
        for (product_id, delta) in self.stock_undo.drain(..).rev() {
            if let Some(p) = st.products.get_mut(&product_id) { p.stock_quantity = p.stock_quantity.saturating_add(delta); }
        }
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if !self.done { self.undo_stock(); }
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        self.pause().await;
        if self.visible_order(order.id).is_some() {
            return Err(OrderError::Infrastructure(format!("duplicate order id {}", order.id)));
        }
        self.new_orders.push(order.clone());
        Ok(())
    }

    async fn insert_items(&mut self, items: &[OrderItem]) -> Result<()> {
        self.pause().await;
        self.new_items.extend_from_slice(items);
        Ok(())
    }

    async fn lock_order(&mut self, order_id: Uuid) -> Result<Option<Order>> {
        if self.locked.insert(order_id) {
            let row = self.row_locks.lock().entry(order_id).or_default().clone();
            self.guards.push(row.lock_owned().await);
        }
        Ok(self.visible_order(order_id))
    }

    async fn order_items(&mut self, order_id: Uuid) -> Result<Vec<OrderItem>> {
        let mut items = self.state.lock().items.get(&order_id).cloned().unwrap_or_default();
        items.extend(self.new_items.iter().filter(|i| i.order_id == order_id).cloned());
        Ok(items)
    }

    async fn update_status(&mut self, change: &StatusChange) -> Result<Order> {
        self.pause().await;
        let mut order = self.visible_order(change.order_id).ok_or(OrderError::OrderNotFound(change.order_id))?;
        order.apply(change);
        self.updates.insert(order.id, order.clone());
        Ok(order)
    }

    async fn decrement_if_sufficient(&mut self, product_id: Uuid, amount: i32) -> Result<StockDecrement> {
        self.pause().await;
        let mut st = self.state.lock();
        let product = st.products.get_mut(&product_id).ok_or(OrderError::ProductNotFound(product_id))?;
        if product.stock_quantity < amount {
            return Ok(StockDecrement::Insufficient { available: product.stock_quantity });
        }
        product.stock_quantity -= amount;
        let new_stock = product.stock_quantity;
        drop(st);
        self.stock_undo.push((product_id, amount));
        Ok(StockDecrement::Applied { new_stock })
    }

    async fn increment(&mut self, product_id: Uuid, amount: i32) -> Result<i32> {
        self.pause().await;
        let mut st = self.state.lock();
        let product = st.products.get_mut(&product_id).ok_or(OrderError::ProductNotFound(product_id))?;
        product.stock_quantity = product.stock_quantity.checked_add(amount)
            .ok_or_else(|| OrderError::Infrastructure(format!("stock overflow for product {product_id}")))?;
        let new_stock = product.stock_quantity;
        drop(st);
        self.stock_undo.push((product_id, -amount));
        Ok(new_stock)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut tx = self;
        {
            let mut st = tx.state.lock();
            for order in tx.new_orders.drain(..) { st.orders.insert(order.id, order); }
            for item in tx.new_items.drain(..) { st.items.entry(item.order_id).or_default().push(item); }
            for (id, order) in tx.updates.drain() { st.orders.insert(id, order); }
        }
        tx.stock_undo.clear();
        tx.done = true;
        let ack = tx.commit_latency;
        drop(tx);
        if !ack.is_zero() { tokio::time::sleep(ack).await; }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let mut tx = self;
        tx.undo_stock();
        tx.done = true;
        Ok(())
    }
}

#[async_trait]
impl CartService for MemoryStore {
    async fn summarize(&self, owner: &CartOwner) -> Result<CartSummary> {
        let st = self.state.lock();
        let mut lines = Vec::new();
        for (product_id, quantity) in st.carts.get(owner).into_iter().flatten() {
            if let Some(p) = st.products.get(product_id) {
                lines.push(CartLine { product_id: *product_id, product_name: p.name.clone(), final_price_minor: p.final_price()?, quantity: *quantity });
            }
        }
        Ok(CartSummary::from_lines(lines)?)
    }

    async fn clear(&self, owner: &CartOwner) -> Result<()> {
        if self.fail_cart_clear.load(Ordering::SeqCst) {
            return Err(OrderError::Infrastructure("cart service unavailable".into()));
        }
        self.state.lock().carts.remove(owner);
        Ok(())
    }
}

#[async_trait]
impl Catalog for MemoryStore {
    async fn product_snapshot(&self, product_id: Uuid) -> Result<Option<ProductSnapshot>> {
        self.state.lock().products.get(&product_id).map(|p| -> Result<ProductSnapshot> { Ok(ProductSnapshot {
            id: product_id, name: p.name.clone(), price_minor: p.price_minor, final_price_minor: p.final_price()?,
            stock_quantity: p.stock_quantity, active: p.active,
        }) }).transpose()
    }
}

#[async_trait]
impl DeliveryDirectory for MemoryStore {
    async fn lookup(&self, delivery_service_id: Uuid) -> Result<Option<DeliveryOption>> {
        Ok(self.state.lock().deliveries.get(&delivery_service_id).cloned())
    }
}
