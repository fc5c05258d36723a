//! Request extractors resolving the identity header into an [`Actor`].

use super::AppState;
use crate::error::AppError;
use crate::services::Actor;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::request::Parts;

/// JSON body whose rejections render as [`AppError::InvalidInput`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path parameters with JSON error rejections.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Query string with JSON error rejections.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Raw identity-provider id from the trusted header.
#[derive(Debug, Clone)]
pub struct Identity(pub String);

fn header_id(parts: &Parts, state: &AppState) -> Option<String> {
    parts
        .headers
        .get(&state.user_header)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        header_id(parts, state).map(Identity).ok_or(AppError::Unauthenticated)
    }
}

/// A synced, non-blocked user. Missing or unknown identities are rejected.
#[axum::async_trait]
impl FromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let id = header_id(parts, state).ok_or(AppError::Unauthenticated)?;
        state.services.users.resolve_actor(&id).await
    }
}

/// Like [`Actor`], but anonymous and never-synced callers yield `None`.
/// Blocked users are still rejected.
#[derive(Debug, Clone)]
pub struct MaybeActor(pub Option<Actor>);

impl MaybeActor {
    pub fn as_ref(&self) -> Option<&Actor> {
        self.0.as_ref()
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for MaybeActor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(id) = header_id(parts, state) else {
            return Ok(MaybeActor(None));
        };
        match state.services.users.resolve_actor(&id).await {
            Ok(actor) => Ok(MaybeActor(Some(actor))),
            Err(AppError::Unauthenticated) => Ok(MaybeActor(None)),
            Err(e) => Err(e),
        }
    }
}
