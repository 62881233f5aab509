//! Shared fixtures: an in-memory shop with one customer and one delivery option
#![allow(dead_code)]

use std::sync::Arc;
use uuid::Uuid;

use opensase_orders::domain::aggregates::CartOwner;
use opensase_orders::store::MemoryStore;
use opensase_orders::{CheckoutLine, CheckoutRequest, EngineSettings, OrderEngine, ShippingAddress};

pub struct Shop {
    pub store: MemoryStore,
    pub engine: OrderEngine,
    pub user: Uuid,
    pub delivery: Uuid,
}

impl Shop {
    pub fn new() -> Self { Self::with_store(MemoryStore::new(), EngineSettings::default()) }

    pub fn with_store(store: MemoryStore, settings: EngineSettings) -> Self {
        let delivery = store.add_delivery_option(5_000);
        let engine = engine_over(&store).with_settings(settings);
        Self { store, engine, user: Uuid::new_v4(), delivery }
    }

    pub fn owner(&self) -> CartOwner { CartOwner::User(self.user) }

    pub fn fill_cart(&self, lines: &[(Uuid, i32)]) {
        for (product_id, quantity) in lines { self.store.put_in_cart(&self.owner(), *product_id, *quantity); }
    }

    pub fn request(&self, lines: &[(Uuid, i32)]) -> CheckoutRequest {
        CheckoutRequest {
            items: lines.iter().map(|(product_id, quantity)| CheckoutLine { product_id: *product_id, quantity: *quantity }).collect(),
            shipping_address: address(),
            delivery_service_id: self.delivery,
            notes: Some("leave at the gate".into()),
        }
    }

    /// Fills the cart with `lines` and checks it out, returning the order id
    pub async fn place(&self, lines: &[(Uuid, i32)]) -> Uuid {
        self.fill_cart(lines);
        self.engine.checkout(self.user, self.request(lines)).await.unwrap().order.id
    }
}

pub fn engine_over(store: &MemoryStore) -> OrderEngine {
    let s = Arc::new(store.clone());
    OrderEngine::new(s.clone(), s.clone(), s.clone(), s)
}

pub fn address() -> ShippingAddress {
    ShippingAddress {
        full_name: "Ada Obi".into(),
        province: "Lagos".into(),
        city: "Ikeja".into(),
        phone_number1: "08012345678".into(),
        phone_number2: None,
    }
}
