//! Caller identity.
//!
//! Authentication happens upstream; the gateway forwards the authenticated
//! user id in `x-actor-id`.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use docflow_core::types::UserId;

use crate::error::AppError;

pub const ACTOR_HEADER: &str = "x-actor-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Actor(v.to_string()))
            .ok_or(AppError::MissingActor)
    }
}
