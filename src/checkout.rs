//! Checkout: turns the caller's live cart into a pending order.
//!
//! The submitted line list is only proof that the client saw the current cart.
//! Names and prices always come from the cart summary read here, and nothing
//! is reserved until the order is confirmed.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{CartOwner, CartSummary, Order, OrderItem, OrderStatus, OrderWithItems, ShippingAddress, ShippingSnapshot, PAYMENT_CASH_ON_DELIVERY};
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::Money;
use crate::engine::{finish, OrderEngine, Staged};
use crate::error::{OrderError, Result};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLine { pub product_id: Uuid, pub quantity: i32 }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutLine>,
    pub shipping_address: ShippingAddress,
    pub delivery_service_id: Uuid,
    pub notes: Option<String>,
}

/// Shape checks that need no I/O
pub fn check_lines(lines: &[CheckoutLine], max_lines: usize) -> Result<()> {
    if lines.is_empty() { return Err(OrderError::EmptyOrder); }
    if lines.len() > max_lines { return Err(OrderError::TooManyLines { count: lines.len(), max: max_lines }); }
    let mut seen = HashSet::with_capacity(lines.len());
    for line in lines {
        if line.quantity <= 0 {
            return Err(OrderError::InvalidQuantity { product_id: line.product_id, quantity: line.quantity });
        }
        if !seen.insert(line.product_id) { return Err(OrderError::DuplicateLine(line.product_id)); }
    }
    Ok(())
}

/// Request lines must equal the cart exactly, in both directions
pub fn reconcile(lines: &[CheckoutLine], cart: &CartSummary) -> Result<()> {
    let in_cart = cart.quantities();
    for line in lines {
        match in_cart.get(&line.product_id) {
            Some(qty) if *qty == line.quantity => {}
            other => {
                return Err(OrderError::CartDesynchronized { product_id: line.product_id, requested: line.quantity, in_cart: other.copied() });
            }
        }
    }
    let requested: HashSet<Uuid> = lines.iter().map(|l| l.product_id).collect();
    if let Some(extra) = cart.items.iter().find(|l| !requested.contains(&l.product_id)) {
        return Err(OrderError::CartDesynchronized { product_id: extra.product_id, requested: 0, in_cart: Some(extra.quantity.value()) });
    }
    Ok(())
}

fn validate_address(address: &ShippingAddress) -> Result<()> {
    let required = [("fullName", &address.full_name), ("province", &address.province), ("city", &address.city), ("phoneNumber1", &address.phone_number1)];
    match required.iter().find(|(_, v)| v.trim().is_empty()) {
        Some((field, _)) => Err(OrderError::Validation(format!("shippingAddress.{field} is required"))),
        None => Ok(()),
    }
}

impl OrderEngine {
    #[instrument(skip_all, fields(%user_id, lines = request.items.len()))]
    pub async fn checkout(&self, user_id: Uuid, request: CheckoutRequest) -> Result<OrderWithItems> {
        let owner = CartOwner::User(user_id);
        let (tx, outcome) = self.within_deadline(self.place_order(user_id, &owner, &request)).await?;
        let order_id = finish(tx, outcome).await?;

        // Committed: a failed cart clear is logged, never surfaced
        if let Err(e) = self.carts.clear(&owner).await {
            error!(%order_id, %owner, error = %e, "CRITICAL: order committed but cart could not be cleared");
        }

        let placed = self.store.find_order_with_items(order_id).await?
            .ok_or_else(|| OrderError::Infrastructure(format!("order {order_id} missing after commit")))?;
        self.publish(OrderEvent::Created {
            order_id, user_id, total_amount_minor: placed.order.total_amount_minor,
            item_count: placed.items.len(), at: placed.order.created_at,
        }).await;
        info!(%order_id, total = %placed.order.total_amount_minor, "order placed");
        Ok(placed)
    }

    /// Everything up to, not including, the commit
    async fn place_order(&self, user_id: Uuid, owner: &CartOwner, request: &CheckoutRequest) -> Result<Staged<Uuid>> {
        check_lines(&request.items, self.settings.max_lines_per_order)?;
        validate_address(&request.shipping_address)?;

        let cart = self.carts.summarize(owner).await?;
        if cart.is_empty() { return Err(OrderError::EmptyOrder); }
        reconcile(&request.items, &cart)?;

        let delivery = self.delivery.lookup(request.delivery_service_id).await?
            .filter(|d| d.is_active)
            .ok_or(OrderError::UnknownDeliveryOption(request.delivery_service_id))?;

        let order_id = Uuid::now_v7();
        let mut items = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let snapshot = match self.catalog.product_snapshot(line.product_id).await? {
                Some(p) if p.active => p,
                _ => return Err(OrderError::ProductNotFound(line.product_id)),
            };
            let cart_line = cart.line(line.product_id).ok_or(OrderError::CartDesynchronized {
                product_id: line.product_id, requested: line.quantity, in_cart: None,
            })?;
            items.push(OrderItem::line(order_id, snapshot.id, cart_line.product_name.clone(), cart_line.final_price_minor, cart_line.quantity)?);
        }

        let subtotal = items.iter().try_fold(Money::ZERO, |acc, i| acc.checked_add(i.subtotal_minor))?;
        let now = Utc::now();
        let order = Order {
            id: order_id,
            user_id,
            user_full_name: request.shipping_address.full_name.trim().to_string(),
            status: OrderStatus::Pending,
            total_amount_minor: subtotal.checked_add(delivery.base_cost_minor)?,
            payment_method: PAYMENT_CASH_ON_DELIVERY.to_string(),
            shipping: ShippingSnapshot::from(&request.shipping_address),
            notes: request.notes.clone().filter(|n| !n.trim().is_empty()),
            delivery_service_id: delivery.id,
            created_at: now,
            updated_at: now,
            completed_at: None,
            cancelled_at: None,
        };

        let mut tx = self.store.begin().await?;
        let outcome = async {
            tx.insert_order(&order).await?;
            tx.insert_items(&items).await?;
            Ok::<_, OrderError>(order_id)
        }.await;
        Ok((tx, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::CartLine;
    use crate::domain::value_objects::Quantity;

    fn cart(lines: &[(Uuid, i32)]) -> CartSummary {
        CartSummary::from_lines(lines.iter().map(|(id, q)| CartLine {
            product_id: *id, product_name: "x".into(), final_price_minor: Money::from_minor(100).unwrap(), quantity: Quantity::new(*q).unwrap(),
        }).collect()).unwrap()
    }
    fn line(product_id: Uuid, quantity: i32) -> CheckoutLine { CheckoutLine { product_id, quantity } }

    #[test]
    fn test_check_lines() {
        let a = Uuid::new_v4();
        assert!(matches!(check_lines(&[], 10), Err(OrderError::EmptyOrder)));
        assert!(matches!(check_lines(&[line(a, 0)], 10), Err(OrderError::InvalidQuantity { quantity: 0, .. })));
        assert!(matches!(check_lines(&[line(a, 1), line(a, 2)], 10), Err(OrderError::DuplicateLine(id)) if id == a));
        assert!(matches!(check_lines(&[line(a, 1), line(Uuid::new_v4(), 1)], 1), Err(OrderError::TooManyLines { count: 2, max: 1 })));
        assert!(check_lines(&[line(a, 3)], 10).is_ok());
    }

    #[test]
    fn test_reconcile_quantity_mismatch() {
        let a = Uuid::new_v4();
        let err = reconcile(&[line(a, 3)], &cart(&[(a, 2)])).unwrap_err();
        assert!(matches!(err, OrderError::CartDesynchronized { product_id, requested: 3, in_cart: Some(2) } if product_id == a));
    }

    #[test]
    fn test_reconcile_missing_and_extra() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(matches!(reconcile(&[line(b, 1)], &cart(&[(b, 1), (a, 1)])), Err(OrderError::CartDesynchronized { requested: 0, in_cart: Some(1), .. })));
        assert!(matches!(reconcile(&[line(a, 1), line(b, 1)], &cart(&[(a, 1)])), Err(OrderError::CartDesynchronized { in_cart: None, .. })));
        assert!(reconcile(&[line(a, 1), line(b, 1)], &cart(&[(b, 1), (a, 1)])).is_ok());
    }
}
