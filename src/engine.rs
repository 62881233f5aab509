//! Order engine facade: the collaborators plus shared plumbing for
//! checkout and the order lifecycle.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::domain::events::OrderEvent;
use crate::error::{OrderError, Result};
use crate::ports::{CartService, Catalog, DeliveryDirectory, EventPublisher, OrderStore, StoreTx};
use crate::publisher::NoopEventPublisher;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    /// Deadline for the part of an operation that runs before commit
    pub request_timeout: Duration,
    pub max_lines_per_order: usize,
}

impl Default for EngineSettings {
    fn default() -> Self { Self { request_timeout: Duration::from_secs(10), max_lines_per_order: 1000 } }
}

#[derive(Clone)]
pub struct OrderEngine {
    pub(crate) store: Arc<dyn OrderStore>,
    pub(crate) carts: Arc<dyn CartService>,
    pub(crate) catalog: Arc<dyn Catalog>,
    pub(crate) delivery: Arc<dyn DeliveryDirectory>,
    pub(crate) events: Arc<dyn EventPublisher>,
    pub(crate) settings: EngineSettings,
}

impl OrderEngine {
    pub fn new(store: Arc<dyn OrderStore>, carts: Arc<dyn CartService>, catalog: Arc<dyn Catalog>, delivery: Arc<dyn DeliveryDirectory>) -> Self {
        Self { store, carts, catalog, delivery, events: Arc::new(NoopEventPublisher), settings: EngineSettings::default() }
    }

    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self { self.events = events; self }
    pub fn with_settings(mut self, settings: EngineSettings) -> Self { self.settings = settings; self }
    pub fn settings(&self) -> &EngineSettings { &self.settings }

    /// Runs `fut` under the request deadline. Expiry drops the future, which
    /// rolls back any transaction it holds. Commits belong outside: see `Staged`.
    pub(crate) async fn within_deadline<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.settings.request_timeout, fut).await.map_err(|_| OrderError::Cancelled)?
    }

    pub(crate) async fn publish(&self, event: OrderEvent) {
        if let Err(e) = self.events.publish(&event).await {
            warn!(order_id = %event.order_id(), subject = event.subject(), error = %e, "failed to publish order event");
        }
    }
}

/// An open transaction with the outcome of the work done in it, returned from
/// the timed section so that `finish` runs after the deadline
pub(crate) type Staged<T> = (Box<dyn StoreTx>, Result<T>);

/// Commits on success, rolls back otherwise
pub(crate) async fn finish<T>(tx: Box<dyn StoreTx>, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, "transaction rollback failed");
            }
            Err(e)
        }
    }
}
