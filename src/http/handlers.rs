use axum::{
    extract::{rejection::{JsonRejection, PathRejection, QueryRejection}, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use super::auth::{Admin, Caller};
use super::dto::{CreateOrderBody, ListParams, StatusBody};
use super::AppState;
use crate::domain::aggregates::{Order, OrderWithItems};
use crate::error::ApiError;
use crate::ports::{OrderFilter, Page};

type ApiResult<T> = Result<T, ApiError>;

fn order_id(path: Result<Path<Uuid>, PathRejection>) -> ApiResult<Uuid> {
    path.map(|Path(id)| id).map_err(|e| ApiError::InvalidRequest(e.body_text()))
}

pub async fn health() -> Json<Value> {
    Json(json!({"status": "healthy", "service": "opensase-orders"}))
}

pub async fn create_order(
    State(s): State<AppState>,
    caller: Caller,
    body: Result<Json<CreateOrderBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<OrderWithItems>)> {
    let Json(body) = body.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    body.validate()?;
    let placed = s.engine.checkout(caller.user_id, body.into()).await?;
    Ok((StatusCode::CREATED, Json(placed)))
}

pub async fn get_order(State(s): State<AppState>, caller: Caller, path: Result<Path<Uuid>, PathRejection>) -> ApiResult<Json<OrderWithItems>> {
    let id = order_id(path)?;
    let order = s.engine.get_order(id).await?;
    if !caller.can_read(&order.order) { return Err(ApiError::Forbidden); }
    Ok(Json(order))
}

pub async fn list_orders(
    State(s): State<AppState>,
    caller: Caller,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<Page<Order>>> {
    let Query(p) = params.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    let mut filter = OrderFilter::new(p.page, p.limit);
    filter.status = p.status;
    if !caller.is_admin() { filter.user_id = Some(caller.user_id); }
    Ok(Json(s.engine.list_orders(&filter).await?))
}

pub async fn update_status(
    State(s): State<AppState>,
    Admin(admin): Admin,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<StatusBody>, JsonRejection>,
) -> ApiResult<Json<Order>> {
    let id = order_id(path)?;
    let Json(body) = body.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    tracing::info!(order_id = %id, admin = %admin.user_id, status = %body.status, "status change requested");
    Ok(Json(s.engine.update_status(id, body.status).await?))
}

pub async fn cancel_order(State(s): State<AppState>, Admin(admin): Admin, path: Result<Path<Uuid>, PathRejection>) -> ApiResult<Json<Order>> {
    let id = order_id(path)?;
    tracing::info!(order_id = %id, admin = %admin.user_id, "cancellation requested");
    Ok(Json(s.engine.cancel(id).await?))
}
