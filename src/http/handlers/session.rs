use crate::db::{User, UserProfile};
use crate::error::{AppError, AppResult};
use crate::http::AppState;
use crate::http::extract::{ApiJson, Identity};
use crate::services::Actor;
use axum::Json;
use axum::extract::State;

/// Sync the signed-in user's profile. The body must describe the caller.
pub async fn sync(
    State(state): State<AppState>,
    Identity(id): Identity,
    ApiJson(profile): ApiJson<UserProfile>,
) -> AppResult<Json<User>> {
    if profile.id != id {
        return Err(AppError::forbidden("profile id does not match the signed-in user"));
    }
    Ok(Json(state.services.users.sync_profile(&profile).await?))
}

pub async fn me(State(state): State<AppState>, actor: Actor) -> AppResult<Json<User>> {
    Ok(Json(state.services.users.current_user(&actor).await?))
}
