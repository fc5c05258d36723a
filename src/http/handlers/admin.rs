use crate::db::{AdminStats, Page, ResponseSummary, TemplateSummary, Topic, User, UserProfile};
use crate::error::AppResult;
use crate::http::AppState;
use crate::http::extract::{ApiJson, ApiPath, ApiQuery};
use crate::services::Actor;
use crate::services::admin::ListQuery;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
pub struct NewTopic {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminFlag {
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct BlockFlag {
    pub blocked: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn stats(State(state): State<AppState>, actor: Actor) -> AppResult<Json<AdminStats>> {
    Ok(Json(state.services.admin.stats(&actor).await?))
}

pub async fn diagnostics(State(state): State<AppState>, actor: Actor) -> AppResult<Json<Value>> {
    let summary = state.services.admin.diagnostics(&actor).await?;
    Ok(Json(json!({ "summary": summary })))
}

pub async fn templates(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> AppResult<Json<Page<TemplateSummary>>> {
    Ok(Json(state.services.admin.templates(&actor, &query).await?))
}

pub async fn delete_template(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    state.services.admin.delete_template(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restore_template(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    state.services.admin.restore_template(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn responses(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> AppResult<Json<Page<ResponseSummary>>> {
    Ok(Json(state.services.admin.responses(&actor, &query).await?))
}

pub async fn delete_response(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    state.services.admin.delete_response(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn users(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> AppResult<Json<Page<User>>> {
    Ok(Json(state.services.admin.users(&actor, &query).await?))
}

pub async fn sync_users(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(profiles): ApiJson<Vec<UserProfile>>,
) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.services.users.sync_batch(&actor, &profiles).await?))
}

pub async fn set_admin(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
    ApiJson(body): ApiJson<AdminFlag>,
) -> AppResult<StatusCode> {
    state.services.admin.set_admin(&actor, &id, body.is_admin).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_blocked(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
    ApiJson(body): ApiJson<BlockFlag>,
) -> AppResult<StatusCode> {
    state
        .services
        .admin
        .set_blocked(&actor, &id, body.blocked, body.reason.as_deref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_user(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
) -> AppResult<StatusCode> {
    state.services.admin.delete_user(&actor, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_topic(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(body): ApiJson<NewTopic>,
) -> AppResult<(StatusCode, Json<Topic>)> {
    let topic = state.services.topics.create(&actor, &body.name).await?;
    Ok((StatusCode::CREATED, Json(topic)))
}

pub async fn delete_topic(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    state.services.topics.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
