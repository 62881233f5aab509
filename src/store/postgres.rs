//! Postgres implementation of the order ports

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPool, FromRow, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::domain::aggregates::{CartLine, CartOwner, CartSummary, DeliveryOption, Order, OrderItem, OrderWithItems, ProductSnapshot, ShippingSnapshot, StatusChange, StockDecrement};
use crate::domain::value_objects::{Money, Quantity};
use crate::error::{OrderError, Result};
use crate::ports::{CartService, Catalog, DeliveryDirectory, OrderFilter, OrderStore, Page, StoreTx};

const ORDER_COLUMNS: &str = "o.id, o.user_id, o.user_full_name, o.status, o.total_amount_minor, o.payment_method, \
    o.shipping_province, o.shipping_city, o.shipping_phone1, o.shipping_phone2, o.notes, o.delivery_service_id, \
    o.created_at, o.updated_at, o.completed_at, o.cancelled_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, price_minor, quantity, subtotal_minor";

/// Active discount, if any, joined onto `products p`
const DISCOUNT_JOIN: &str = "LEFT JOIN LATERAL (\
    SELECT pd.percent FROM product_discounts pd \
    WHERE pd.product_id = p.id AND pd.is_active AND pd.starts_at <= NOW() AND NOW() < pd.ends_at \
    ORDER BY pd.percent DESC LIMIT 1) d ON TRUE";

const FINAL_PRICE: &str = "(p.price_minor - p.price_minor * COALESCE(d.percent, 0) / 100)::BIGINT";

fn money(value: i64, column: &str) -> Result<Money> {
    Money::from_minor(value).map_err(|e| OrderError::Infrastructure(format!("{column}: {e}")))
}

fn quantity(value: i32, column: &str) -> Result<Quantity> {
    Quantity::new(value).ok_or_else(|| OrderError::Infrastructure(format!("{column}: stored quantity {value} is below 1")))
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    user_full_name: String,
    status: String,
    total_amount_minor: i64,
    payment_method: String,
    shipping_province: String,
    shipping_city: String,
    shipping_phone1: String,
    shipping_phone2: Option<String>,
    notes: Option<String>,
    delivery_service_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderRow> for Order {
    type Error = OrderError;
    fn try_from(r: OrderRow) -> Result<Self> {
        Ok(Order {
            id: r.id,
            user_id: r.user_id,
            user_full_name: r.user_full_name,
            status: r.status.parse()?,
            total_amount_minor: money(r.total_amount_minor, "orders.total_amount_minor")?,
            payment_method: r.payment_method,
            shipping: ShippingSnapshot { province: r.shipping_province, city: r.shipping_city, phone1: r.shipping_phone1, phone2: r.shipping_phone2 },
            notes: r.notes,
            delivery_service_id: r.delivery_service_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
            completed_at: r.completed_at,
            cancelled_at: r.cancelled_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderItemRow { id: Uuid, order_id: Uuid, product_id: Uuid, product_name: String, price_minor: i64, quantity: i32, subtotal_minor: i64 }

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = OrderError;
    fn try_from(r: OrderItemRow) -> Result<Self> {
        Ok(OrderItem {
            id: r.id, order_id: r.order_id, product_id: r.product_id, product_name: r.product_name,
            price_minor: money(r.price_minor, "order_items.price_minor")?,
            quantity: quantity(r.quantity, "order_items.quantity")?,
            subtotal_minor: money(r.subtotal_minor, "order_items.subtotal_minor")?,
        })
    }
}

/// One row of the header LEFT JOIN items read
#[derive(Debug, FromRow)]
struct OrderJoinRow {
    #[sqlx(flatten)]
    order: OrderRow,
    item_id: Option<Uuid>,
    item_product_id: Option<Uuid>,
    item_product_name: Option<String>,
    item_price_minor: Option<i64>,
    item_quantity: Option<i32>,
    item_subtotal_minor: Option<i64>,
}

impl OrderJoinRow {
    fn item(&self) -> Result<Option<OrderItem>> {
        match (self.item_id, self.item_product_id, &self.item_product_name, self.item_price_minor, self.item_quantity, self.item_subtotal_minor) {
            (Some(id), Some(product_id), Some(name), Some(price), Some(qty), Some(subtotal)) => Ok(Some(OrderItem {
                id, order_id: self.order.id, product_id, product_name: name.clone(),
                price_minor: money(price, "order_items.price_minor")?,
                quantity: quantity(qty, "order_items.quantity")?,
                subtotal_minor: money(subtotal, "order_items.subtotal_minor")?,
            })),
            (None, ..) => Ok(None),
            _ => Err(OrderError::Infrastructure(format!("incomplete item row for order {}", self.order.id))),
        }
    }
}

#[derive(Debug, FromRow)]
struct CartLineRow { product_id: Uuid, product_name: String, final_price_minor: i64, quantity: i32 }

#[derive(Debug, FromRow)]
struct ProductRow { id: Uuid, name: String, price_minor: i64, final_price_minor: i64, stock_quantity: i32, active: bool }

#[derive(Debug, FromRow)]
struct DeliveryRow { id: Uuid, base_cost_minor: i64, is_active: bool }

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    qb.push(" WHERE TRUE");
    if let Some(user_id) = filter.user_id { qb.push(" AND o.user_id = ").push_bind(user_id); }
    if let Some(status) = filter.status { qb.push(" AND o.status = ").push_bind(status.as_str()); }
}

fn owner_keys(owner: &CartOwner) -> (Option<Uuid>, Option<String>) {
    match owner {
        CartOwner::User(id) => (Some(*id), None),
        CartOwner::Session(s) => (None, Some(s.clone())),
    }
}

#[derive(Clone)]
pub struct PgStore { pool: PgPool }

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        Ok(Box::new(PgStoreTx { tx: self.pool.begin().await? }))
    }

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1");
        sqlx::query_as::<_, OrderRow>(&sql).bind(order_id).fetch_optional(&self.pool).await?
            .map(Order::try_from).transpose()
    }

    async fn find_order_with_items(&self, order_id: Uuid) -> Result<Option<OrderWithItems>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS}, i.id AS item_id, i.product_id AS item_product_id, i.product_name AS item_product_name, \
             i.price_minor AS item_price_minor, i.quantity AS item_quantity, i.subtotal_minor AS item_subtotal_minor \
             FROM orders o LEFT JOIN order_items i ON i.order_id = o.id WHERE o.id = $1 ORDER BY i.id"
        );
        let rows = sqlx::query_as::<_, OrderJoinRow>(&sql).bind(order_id).fetch_all(&self.pool).await?;
        let items = rows.iter().filter_map(|r| r.item().transpose()).collect::<Result<Vec<_>>>()?;
        match rows.into_iter().next() {
            Some(first) => Ok(Some(OrderWithItems { order: Order::try_from(first.order)?, items })),
            None => Ok(None),
        }
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Page<Order>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders o");
        push_filters(&mut count, filter);
        let (total,): (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {ORDER_COLUMNS} FROM orders o"));
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY o.created_at DESC, o.id DESC LIMIT ").push_bind(i64::from(filter.limit))
            .push(" OFFSET ").push_bind(filter.offset() as i64);
        let rows: Vec<OrderRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        let data = rows.into_iter().map(Order::try_from).collect::<Result<Vec<_>>>()?;
        Ok(Page { data, total, page: filter.page, limit: filter.limit })
    }
}

/// Wraps a sqlx transaction; sqlx rolls it back on drop
pub struct PgStoreTx { tx: Transaction<'static, Postgres> }

impl PgStoreTx {
    /// New stock, or `None` when the row is missing or holds less than `amount`
    async fn conditional_decrement(&mut self, product_id: Uuid, amount: i32) -> Result<Option<i32>> {
        let updated: Option<(i32,)> = sqlx::query_as(
            "UPDATE products SET stock_quantity = stock_quantity - $2, updated_at = NOW() \
             WHERE id = $1 AND stock_quantity >= $2 RETURNING stock_quantity",
        )
        .bind(product_id).bind(amount)
        .fetch_optional(&mut *self.tx).await?;
        Ok(updated.map(|(s,)| s))
    }
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn insert_order(&mut self, o: &Order) -> Result<()> {
        sqlx::query(
            "INSERT INTO orders (id, user_id, user_full_name, status, total_amount_minor, payment_method, shipping_province, \
             shipping_city, shipping_phone1, shipping_phone2, notes, delivery_service_id, created_at, updated_at, completed_at, cancelled_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(o.id).bind(o.user_id).bind(&o.user_full_name).bind(o.status.as_str()).bind(o.total_amount_minor.minor())
        .bind(&o.payment_method).bind(&o.shipping.province).bind(&o.shipping.city).bind(&o.shipping.phone1)
        .bind(&o.shipping.phone2).bind(&o.notes).bind(o.delivery_service_id).bind(o.created_at).bind(o.updated_at)
        .bind(o.completed_at).bind(o.cancelled_at)
        .execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn insert_items(&mut self, items: &[OrderItem]) -> Result<()> {
        if items.is_empty() { return Ok(()); }
        let mut qb = QueryBuilder::<Postgres>::new(format!("INSERT INTO order_items ({ITEM_COLUMNS}) "));
        qb.push_values(items, |mut b, i| {
            b.push_bind(i.id).push_bind(i.order_id).push_bind(i.product_id).push_bind(i.product_name.clone())
                .push_bind(i.price_minor.minor()).push_bind(i.quantity.value()).push_bind(i.subtotal_minor.minor());
        });
        qb.build().execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn lock_order(&mut self, order_id: Uuid) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1 FOR UPDATE");
        sqlx::query_as::<_, OrderRow>(&sql).bind(order_id).fetch_optional(&mut *self.tx).await?
            .map(Order::try_from).transpose()
    }

    async fn order_items(&mut self, order_id: Uuid) -> Result<Vec<OrderItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY product_id");
        sqlx::query_as::<_, OrderItemRow>(&sql).bind(order_id).fetch_all(&mut *self.tx).await?
            .into_iter().map(OrderItem::try_from).collect()
    }

    async fn update_status(&mut self, change: &StatusChange) -> Result<Order> {
        let sql = format!(
            "UPDATE orders o SET status = $2, updated_at = $3, completed_at = $4, cancelled_at = $5 WHERE o.id = $1 RETURNING {ORDER_COLUMNS}"
        );
        sqlx::query_as::<_, OrderRow>(&sql)
            .bind(change.order_id).bind(change.status.as_str()).bind(change.updated_at).bind(change.completed_at).bind(change.cancelled_at)
            .fetch_optional(&mut *self.tx).await?
            .ok_or(OrderError::OrderNotFound(change.order_id))
            .and_then(Order::try_from)
    }

    async fn decrement_if_sufficient(&mut self, product_id: Uuid, amount: i32) -> Result<StockDecrement> {
        if let Some(new_stock) = self.conditional_decrement(product_id, amount).await? {
            return Ok(StockDecrement::Applied { new_stock });
        }
        // Row lock: the quantity read here cannot change before the transaction ends
        let current: Option<(i32,)> = sqlx::query_as("SELECT stock_quantity FROM products WHERE id = $1 FOR UPDATE")
            .bind(product_id).fetch_optional(&mut *self.tx).await?;
        match current {
            None => Err(OrderError::ProductNotFound(product_id)),
            Some((available,)) if available < amount => Ok(StockDecrement::Insufficient { available }),
            // Restocked between the two statements
            Some((available,)) => match self.conditional_decrement(product_id, amount).await? {
                Some(new_stock) => Ok(StockDecrement::Applied { new_stock }),
                None => Ok(StockDecrement::Insufficient { available }),
            },
        }
    }

    async fn increment(&mut self, product_id: Uuid, amount: i32) -> Result<i32> {
        let updated: Option<(i32,)> = sqlx::query_as(
            "UPDATE products SET stock_quantity = stock_quantity + $2, updated_at = NOW() WHERE id = $1 RETURNING stock_quantity",
        )
        .bind(product_id).bind(amount)
        .fetch_optional(&mut *self.tx).await?;
        updated.map(|(s,)| s).ok_or(OrderError::ProductNotFound(product_id))
    }

    async fn commit(self: Box<Self>) -> Result<()> { Ok(self.tx.commit().await?) }

    async fn rollback(self: Box<Self>) -> Result<()> { Ok(self.tx.rollback().await?) }
}

#[async_trait]
impl CartService for PgStore {
    async fn summarize(&self, owner: &CartOwner) -> Result<CartSummary> {
        let (user_id, session_id) = owner_keys(owner);
        let sql = format!(
            "SELECT c.product_id, p.name AS product_name, {FINAL_PRICE} AS final_price_minor, c.quantity \
             FROM cart_items c JOIN products p ON p.id = c.product_id {DISCOUNT_JOIN} \
             WHERE c.user_id = $1 OR c.session_id = $2 ORDER BY c.created_at, c.product_id"
        );
        let rows = sqlx::query_as::<_, CartLineRow>(&sql).bind(user_id).bind(session_id).fetch_all(&self.pool).await?;
        let lines = rows.into_iter().map(|r| Ok(CartLine {
            product_id: r.product_id, product_name: r.product_name,
            final_price_minor: money(r.final_price_minor, "final_price_minor")?,
            quantity: quantity(r.quantity, "cart_items.quantity")?,
        })).collect::<Result<Vec<_>>>()?;
        Ok(CartSummary::from_lines(lines)?)
    }

    async fn clear(&self, owner: &CartOwner) -> Result<()> {
        let (user_id, session_id) = owner_keys(owner);
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1 OR session_id = $2")
            .bind(user_id).bind(session_id).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Catalog for PgStore {
    async fn product_snapshot(&self, product_id: Uuid) -> Result<Option<ProductSnapshot>> {
        let sql = format!(
            "SELECT p.id, p.name, p.price_minor, {FINAL_PRICE} AS final_price_minor, p.stock_quantity, p.status = 'active' AS active \
             FROM products p {DISCOUNT_JOIN} WHERE p.id = $1"
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql).bind(product_id).fetch_optional(&self.pool).await?;
        row.map(|r| Ok(ProductSnapshot {
            id: r.id, name: r.name,
            price_minor: money(r.price_minor, "products.price_minor")?,
            final_price_minor: money(r.final_price_minor, "final_price_minor")?,
            stock_quantity: r.stock_quantity, active: r.active,
        })).transpose()
    }
}

#[async_trait]
impl DeliveryDirectory for PgStore {
    async fn lookup(&self, delivery_service_id: Uuid) -> Result<Option<DeliveryOption>> {
        let row = sqlx::query_as::<_, DeliveryRow>("SELECT id, base_cost_minor, is_active FROM delivery_services WHERE id = $1")
            .bind(delivery_service_id).fetch_optional(&self.pool).await?;
        row.map(|r| Ok(DeliveryOption { id: r.id, base_cost_minor: money(r.base_cost_minor, "delivery_services.base_cost_minor")?, is_active: r.is_active }))
            .transpose()
    }
}
