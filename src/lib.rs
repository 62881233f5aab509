//! OpenSASE Orders - checkout and order lifecycle engine
//!
//! Converts a customer's cart into a priced, immutable order and drives it
//! through its status machine.
//!
//! ## Features
//! - Checkout with cart reconciliation and price snapshots
//! - Status transitions with stock reservation and release
//! - Admin cancellation
//! - Postgres and in-memory stores behind the same ports
//! - Order events over NATS

pub mod checkout;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod http;
pub mod inventory;
pub mod lifecycle;
pub mod ports;
pub mod publisher;
pub mod store;

pub use checkout::{CheckoutLine, CheckoutRequest};
pub use config::AppConfig;
pub use domain::aggregates::{Order, OrderItem, OrderStatus, OrderWithItems, ShippingAddress};
pub use engine::{EngineSettings, OrderEngine};
pub use error::{ApiError, ErrorKind, OrderError, Result};
pub use ports::{OrderFilter, Page};
