//! Invariants that must hold across many orders and concurrent transitions.

mod common;

use std::collections::HashMap;

use common::Shop;
use futures::future::join_all;
use opensase_orders::domain::status::{classify, is_terminal, Transition};
use opensase_orders::{OrderError, OrderStatus};
use uuid::Uuid;

#[tokio::test]
async fn delivered_totals_equal_items_plus_delivery() {
    let shop = Shop::new();
    let a = shop.store.add_product("Rice 50kg", 61_500, 20);
    let b = shop.store.add_product("Palm oil", 8_250, 20);
    shop.store.set_discount(b, 20);

    for lines in [vec![(a, 1)], vec![(b, 3)], vec![(a, 2), (b, 1)]] {
        let id = shop.place(&lines).await;
        for status in [OrderStatus::Confirmed, OrderStatus::Shipped, OrderStatus::Delivered] {
            shop.engine.update_status(id, status).await.unwrap();
        }
        let read = shop.engine.get_order(id).await.unwrap();
        assert!(is_terminal(read.order.status));
        assert_eq!(read.items_total().unwrap().minor() + 5_000, read.order.total_amount_minor.minor());
    }
}

#[tokio::test]
async fn stock_delta_equals_quantities_of_live_confirmed_orders() {
    let shop = Shop::new();
    let products: Vec<Uuid> = (0..3).map(|i| shop.store.add_product(&format!("Item {i}"), 1_000 * (i + 1), 50)).collect();
    let plans: Vec<(Vec<(Uuid, i32)>, &[OrderStatus])> = vec![
        (vec![(products[0], 2), (products[1], 1)], &[OrderStatus::Confirmed]),
        (vec![(products[1], 4)], &[OrderStatus::Confirmed, OrderStatus::Cancelled]),
        (vec![(products[2], 3), (products[0], 1)], &[OrderStatus::Confirmed, OrderStatus::Shipped]),
        (vec![(products[2], 5)], &[OrderStatus::Cancelled]),
        (vec![(products[0], 7)], &[]),
    ];

    let mut reserved: HashMap<Uuid, i32> = HashMap::new();
    for (lines, path) in plans {
        let id = shop.place(&lines).await;
        for status in path {
            shop.engine.update_status(id, *status).await.unwrap();
        }
        let live = path.contains(&OrderStatus::Confirmed) && !path.contains(&OrderStatus::Cancelled);
        if live {
            for (product, qty) in &lines { *reserved.entry(*product).or_default() += qty; }
        }
    }

    for product in products {
        let delta = 50 - shop.store.stock(product).unwrap();
        assert_eq!(delta, reserved.get(&product).copied().unwrap_or(0), "product {product}");
    }
}

#[tokio::test]
async fn cancel_restores_pre_confirmation_stock() {
    let shop = Shop::new();
    let a = shop.store.add_product("Generator", 250_000, 4);
    let b = shop.store.add_product("Fuel can", 4_000, 9);
    let id = shop.place(&[(b, 5), (a, 4)]).await;
    let before = (shop.store.stock(a), shop.store.stock(b));

    shop.engine.update_status(id, OrderStatus::Confirmed).await.unwrap();
    assert_eq!((shop.store.stock(a), shop.store.stock(b)), (Some(0), Some(4)));
    shop.engine.cancel(id).await.unwrap();

    assert_eq!((shop.store.stock(a), shop.store.stock(b)), before);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_confirms_never_oversell() {
    let shop = Shop::new();
    let a = shop.store.add_product("Solar panel", 180_000, 3);
    let b = shop.store.add_product("Inverter", 320_000, 10);

    let mut orders = Vec::new();
    for _ in 0..4 {
        let buyer = Shop { user: Uuid::new_v4(), store: shop.store.clone(), engine: shop.engine.clone(), delivery: shop.delivery };
        orders.push(buyer.place(&[(b, 1), (a, 2)]).await);
    }

    let results = join_all(orders.iter().map(|id| {
        let engine = shop.engine.clone();
        let id = *id;
        tokio::spawn(async move { engine.update_status(id, OrderStatus::Confirmed).await })
    }))
    .await;

    let mut confirmed = 0;
    for result in results {
        match result.unwrap() {
            Ok(_) => confirmed += 1,
            Err(OrderError::InsufficientStock { product_id, .. }) => assert_eq!(product_id, a),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(confirmed, 1);
    assert_eq!(shop.store.stock(a), Some(1));
    assert_eq!(shop.store.stock(b), Some(9));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_confirms_of_one_order_reserve_once() {
    let shop = Shop::new();
    let a = shop.store.add_product("Freezer", 410_000, 10);
    let id = shop.place(&[(a, 3)]).await;

    let results = join_all((0..5).map(|_| {
        let engine = shop.engine.clone();
        tokio::spawn(async move { engine.update_status(id, OrderStatus::Confirmed).await })
    }))
    .await;

    let mut confirmed = 0;
    for result in results {
        match result.unwrap() {
            Ok(_) => confirmed += 1,
            Err(e) => assert!(matches!(e, OrderError::InvalidTransition { current: OrderStatus::Confirmed, .. }), "{e}"),
        }
    }
    assert_eq!(confirmed, 1);
    assert_eq!(shop.store.stock(a), Some(7));
}

#[test]
fn classify_is_total_with_five_allowed_edges() {
    let mut allowed = Vec::new();
    for current in OrderStatus::ALL {
        for requested in OrderStatus::ALL {
            let t = classify(current, requested);
            if current == requested { assert_eq!(t, Transition::Forbidden); }
            if t.is_allowed() { allowed.push((current, requested, t)); }
        }
    }
    use OrderStatus::*;
    assert_eq!(allowed, vec![
        (Pending, Confirmed, Transition::Reserve),
        (Pending, Cancelled, Transition::Neutral),
        (Confirmed, Shipped, Transition::Neutral),
        (Confirmed, Cancelled, Transition::Release),
        (Shipped, Delivered, Transition::Neutral),
    ]);
}
