//! HTTP surface over the order engine

pub mod auth;
pub mod dto;
mod handlers;

use axum::{routing::{get, put}, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::engine::OrderEngine;

#[derive(Clone)]
pub struct AppState { pub engine: Arc<OrderEngine> }

impl AppState {
    pub fn new(engine: OrderEngine) -> Self { Self { engine: Arc::new(engine) } }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/orders", get(handlers::list_orders).post(handlers::create_order))
        .route("/api/v1/orders/:id", get(handlers::get_order))
        .route("/api/v1/admin/orders/:id/status", put(handlers::update_status))
        .route("/api/v1/admin/orders/:id/cancel", put(handlers::cancel_order))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
