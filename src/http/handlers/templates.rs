use super::LimitQuery;
use crate::db::{Template, TemplateDraft, TemplateSummary};
use crate::error::AppResult;
use crate::http::AppState;
use crate::http::extract::{ApiJson, ApiPath, ApiQuery, MaybeActor};
use crate::services::Actor;
use crate::services::forms::FormView;
use crate::services::results::TemplateResults;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde_json::{Value, json};

pub async fn latest(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<LimitQuery>,
) -> AppResult<Json<Vec<TemplateSummary>>> {
    Ok(Json(state.services.templates.latest_public(q.count()).await?))
}

pub async fn popular(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<LimitQuery>,
) -> AppResult<Json<Vec<TemplateSummary>>> {
    Ok(Json(state.services.templates.popular_public(q.count()).await?))
}

pub async fn mine(
    State(state): State<AppState>,
    actor: Actor,
) -> AppResult<Json<Vec<TemplateSummary>>> {
    Ok(Json(state.services.templates.list_mine(&actor).await?))
}

pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(draft): ApiJson<TemplateDraft>,
) -> AppResult<(StatusCode, Json<Template>)> {
    let template = state.services.templates.save(&actor, None, draft).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn get(
    State(state): State<AppState>,
    actor: MaybeActor,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<Template>> {
    Ok(Json(state.services.templates.get(actor.as_ref(), id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
    ApiJson(draft): ApiJson<TemplateDraft>,
) -> AppResult<Json<Template>> {
    Ok(Json(state.services.templates.save(&actor, Some(id), draft).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    state.services.templates.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn cleanup(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<Value>> {
    let removed = state.services.templates.cleanup_duplicate_questions(&actor, id).await?;
    Ok(Json(json!({ "removed": removed })))
}

pub async fn results(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<TemplateResults>> {
    Ok(Json(state.services.templates.results(&actor, id).await?))
}

/// The template's default form, created on first request.
pub async fn form(
    State(state): State<AppState>,
    actor: MaybeActor,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<FormView>> {
    let template = state.services.templates.get(actor.as_ref(), id).await?;
    let form = state.services.forms.get_or_create_for_template(id).await?;
    Ok(Json(FormView {
        form,
        questions: template.questions,
    }))
}
