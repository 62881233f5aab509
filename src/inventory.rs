//! Inventory reservation over an open store transaction.
//!
//! Reserve batches decrement in ascending product id so that concurrent
//! transactions acquire product row locks in the same order.

use std::collections::BTreeMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::aggregates::{OrderItem, StockDecrement};
use crate::error::{OrderError, Result};
use crate::ports::StoreTx;

/// Quantities per product, iterated in ascending product id
pub fn batch(items: &[OrderItem]) -> Result<BTreeMap<Uuid, i32>> {
    let mut lines = BTreeMap::new();
    for item in items {
        let qty: &mut i32 = lines.entry(item.product_id).or_default();
        *qty = qty.checked_add(item.quantity.value())
            .ok_or_else(|| OrderError::Validation(format!("quantity overflow for product {}", item.product_id)))?;
    }
    Ok(lines)
}

/// Decrements every line or fails on the first shortfall. On error the caller
/// must roll the transaction back.
pub async fn reserve(tx: &mut dyn StoreTx, items: &[OrderItem]) -> Result<()> {
    for (product_id, amount) in batch(items)? {
        match tx.decrement_if_sufficient(product_id, amount).await? {
            StockDecrement::Applied { new_stock } => debug!(%product_id, amount, new_stock, "stock reserved"),
            StockDecrement::Insufficient { available } => {
                return Err(OrderError::InsufficientStock { product_id, available, requested: amount });
            }
        }
    }
    Ok(())
}

/// Increments every line. A product deleted since the order was placed has
/// nothing to return stock to and is skipped.
pub async fn release(tx: &mut dyn StoreTx, items: &[OrderItem]) -> Result<()> {
    for (product_id, amount) in batch(items)? {
        match tx.increment(product_id, amount).await {
            Ok(new_stock) => debug!(%product_id, amount, new_stock, "stock released"),
            Err(OrderError::ProductNotFound(_)) => warn!(%product_id, amount, "released stock for a deleted product"),
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{Money, Quantity};

    fn item(product_id: Uuid, qty: i32) -> OrderItem {
        OrderItem::line(Uuid::nil(), product_id, "p", Money::ZERO, Quantity::new(qty).unwrap()).unwrap()
    }

    #[test]
    fn test_batch_is_sorted_and_merged() {
        let hi = Uuid::from_u128(9);
        let lo = Uuid::from_u128(1);
        let lines = batch(&[item(hi, 1), item(lo, 2), item(hi, 3)]).unwrap();
        assert_eq!(lines.into_iter().collect::<Vec<_>>(), vec![(lo, 2), (hi, 4)]);
    }
}
