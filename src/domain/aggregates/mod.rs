//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::{DeliveryOption, ProductSnapshot, StockDecrement};
pub use order::{Order, OrderItem, OrderStatus, OrderWithItems, ShippingAddress, ShippingSnapshot, StatusChange, UnknownStatus, PAYMENT_CASH_ON_DELIVERY};
pub use cart::{CartLine, CartOwner, CartSummary};
