//! Request bodies and query strings

use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::checkout::{CheckoutLine, CheckoutRequest};
use crate::domain::aggregates::{OrderStatus, ShippingAddress};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddressBody {
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    #[validate(length(min = 1, max = 100))]
    pub province: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 5, max = 20))]
    pub phone_number1: String,
    #[validate(length(min = 5, max = 20))]
    pub phone_number2: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineBody { pub product_id: Uuid, pub quantity: i32 }

/// Line-level rules (empty, quantity, duplicates, count) are the engine's
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderBody {
    pub items: Vec<OrderLineBody>,
    #[validate]
    pub shipping_address: ShippingAddressBody,
    pub delivery_service_id: Uuid,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl From<CreateOrderBody> for CheckoutRequest {
    fn from(b: CreateOrderBody) -> Self {
        let a = b.shipping_address;
        CheckoutRequest {
            items: b.items.into_iter().map(|l| CheckoutLine { product_id: l.product_id, quantity: l.quantity }).collect(),
            shipping_address: ShippingAddress { full_name: a.full_name, province: a.province, city: a.city, phone_number1: a.phone_number1, phone_number2: a.phone_number2 },
            delivery_service_id: b.delivery_service_id,
            notes: b.notes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusBody { pub status: OrderStatus }

#[derive(Debug, Default, Deserialize)]
pub struct ListParams { pub page: Option<u32>, pub limit: Option<u32>, pub status: Option<OrderStatus> }
