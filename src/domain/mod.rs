//! Order domain: aggregates, value objects, the status machine and events
pub mod aggregates;
pub mod events;
pub mod status;
pub mod value_objects;
