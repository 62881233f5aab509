//! Order lifecycle: status transitions with their stock effects, and readback.

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderStatus, OrderWithItems, StatusChange};
use crate::domain::events::OrderEvent;
use crate::domain::status::{classify, is_cancellable, Transition};
use crate::engine::{finish, OrderEngine, Staged};
use crate::error::{OrderError, Result};
use crate::inventory;
use crate::ports::{OrderFilter, Page};

fn decide(current: OrderStatus, requested: OrderStatus, cancelling: bool) -> Result<Transition> {
    if cancelling && !is_cancellable(current) { return Err(OrderError::CannotCancel(current)); }
    match classify(current, requested) {
        Transition::Forbidden => Err(OrderError::InvalidTransition { current, requested }),
        allowed => Ok(allowed),
    }
}

impl OrderEngine {
    /// Requesting the current status is rejected, never treated as success.
    #[instrument(skip_all, fields(%order_id, %requested))]
    pub async fn update_status(&self, order_id: Uuid, requested: OrderStatus) -> Result<Order> {
        self.transition(order_id, requested, false).await
    }

    #[instrument(skip_all, fields(%order_id))]
    pub async fn cancel(&self, order_id: Uuid) -> Result<Order> {
        self.transition(order_id, OrderStatus::Cancelled, true).await
    }

    async fn transition(&self, order_id: Uuid, requested: OrderStatus, cancelling: bool) -> Result<Order> {
        let (tx, outcome) = self.within_deadline(self.apply_transition(order_id, requested, cancelling)).await?;
        let (order, from) = finish(tx, outcome).await?;
        info!(%order_id, %from, to = %order.status, "order status changed");
        self.publish(OrderEvent::transition(&order, from)).await;
        Ok(order)
    }

    async fn apply_transition(&self, order_id: Uuid, requested: OrderStatus, cancelling: bool) -> Result<Staged<(Order, OrderStatus)>> {
        let current = self.store.find_order(order_id).await?.ok_or(OrderError::OrderNotFound(order_id))?;
        decide(current.status, requested, cancelling)?;

        let mut tx = self.store.begin().await?;
        let outcome = async {
            // Re-check under the row lock; a concurrent transition may have won
            let locked = tx.lock_order(order_id).await?.ok_or(OrderError::OrderNotFound(order_id))?;
            match decide(locked.status, requested, cancelling)? {
                Transition::Reserve => {
                    let items = tx.order_items(order_id).await?;
                    inventory::reserve(tx.as_mut(), &items).await?;
                }
                Transition::Release => {
                    let items = tx.order_items(order_id).await?;
                    inventory::release(tx.as_mut(), &items).await?;
                }
                Transition::Neutral | Transition::Forbidden => {}
            }
            let updated = tx.update_status(&StatusChange::entering(&locked, requested, Utc::now())).await?;
            Ok::<_, OrderError>((updated, locked.status))
        }.await;
        Ok((tx, outcome))
    }

    #[instrument(skip_all, fields(%order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderWithItems> {
        self.within_deadline(self.store.find_order_with_items(order_id)).await?
            .ok_or(OrderError::OrderNotFound(order_id))
    }

    pub async fn list_orders(&self, filter: &OrderFilter) -> Result<Page<Order>> {
        self.within_deadline(self.store.list_orders(filter)).await
    }
}
