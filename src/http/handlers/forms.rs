use crate::db::Form;
use crate::error::AppResult;
use crate::http::AppState;
use crate::http::extract::{ApiJson, ApiPath, MaybeActor};
use crate::services::Actor;
use crate::services::forms::{FormDraft, FormView};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(draft): ApiJson<FormDraft>,
) -> AppResult<(StatusCode, Json<Form>)> {
    let form = state.services.forms.create(&actor, &draft).await?;
    Ok((StatusCode::CREATED, Json(form)))
}

pub async fn mine(State(state): State<AppState>, actor: Actor) -> AppResult<Json<Vec<Form>>> {
    Ok(Json(state.services.forms.list_mine(&actor).await?))
}

pub async fn get(
    State(state): State<AppState>,
    actor: MaybeActor,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<FormView>> {
    Ok(Json(state.services.forms.get(actor.as_ref(), id).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    state.services.forms.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
