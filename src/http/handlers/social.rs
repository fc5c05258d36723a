//! Comments and likes.

use crate::db::Comment;
use crate::error::AppResult;
use crate::http::AppState;
use crate::http::extract::{ApiJson, ApiPath, MaybeActor};
use crate::services::Actor;
use crate::services::likes::LikeState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct NewComment {
    pub text: String,
}

pub async fn list_comments(
    State(state): State<AppState>,
    actor: MaybeActor,
    ApiPath(template_id): ApiPath<i64>,
) -> AppResult<Json<Vec<Comment>>> {
    Ok(Json(state.services.comments.list(actor.as_ref(), template_id).await?))
}

pub async fn add_comment(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(template_id): ApiPath<i64>,
    ApiJson(body): ApiJson<NewComment>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    let comment = state.services.comments.add(&actor, template_id, &body.text).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    state.services.comments.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn like_state(
    State(state): State<AppState>,
    actor: MaybeActor,
    ApiPath(template_id): ApiPath<i64>,
) -> AppResult<Json<LikeState>> {
    Ok(Json(state.services.likes.state(actor.as_ref(), template_id).await?))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(template_id): ApiPath<i64>,
) -> AppResult<Json<LikeState>> {
    Ok(Json(state.services.likes.toggle(&actor, template_id).await?))
}
