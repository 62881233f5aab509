//! Caller identity forwarded by the upstream token service

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::domain::aggregates::Order;
use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const ROLE_HEADER: &str = "x-user-role";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role { Customer, Admin }

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Caller { pub user_id: Uuid, pub role: Role }

impl Caller {
    pub fn is_admin(&self) -> bool { self.role == Role::Admin }
    pub fn can_read(&self, order: &Order) -> bool { self.is_admin() || order.user_id == self.user_id }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER).and_then(|v| Uuid::parse_str(v).ok()).ok_or(ApiError::Unauthorized)?;
        let role = match header(parts, ROLE_HEADER) {
            Some(r) if r.eq_ignore_ascii_case("admin") => Role::Admin,
            _ => Role::Customer,
        };
        Ok(Caller { user_id, role })
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

/// A caller holding the admin role
#[derive(Clone, Copy, Debug)]
pub struct Admin(pub Caller);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Admin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let caller = Caller::from_request_parts(parts, state).await?;
        if !caller.is_admin() { return Err(ApiError::Forbidden); }
        Ok(Admin(caller))
    }
}
