use crate::db::{ResponseDetail, ResponseSummary, SubmitOutcome};
use crate::error::AppResult;
use crate::http::AppState;
use crate::http::extract::{ApiJson, ApiPath};
use crate::services::Actor;
use crate::services::responses::Submission;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

/// 201 for a new response, 200 when an earlier submission was returned.
pub async fn submit(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(template_id): ApiPath<i64>,
    ApiJson(submission): ApiJson<Submission>,
) -> AppResult<(StatusCode, Json<SubmitOutcome>)> {
    let outcome = state.services.responses.submit(&actor, template_id, &submission).await?;
    let status = if outcome.duplicate {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(outcome)))
}

pub async fn list_for_template(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(template_id): ApiPath<i64>,
) -> AppResult<Json<Vec<ResponseSummary>>> {
    Ok(Json(state.services.responses.list_for_template(&actor, template_id).await?))
}

pub async fn mine(
    State(state): State<AppState>,
    actor: Actor,
) -> AppResult<Json<Vec<ResponseSummary>>> {
    Ok(Json(state.services.responses.list_mine(&actor).await?))
}

pub async fn get(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<ResponseDetail>> {
    Ok(Json(state.services.responses.get(&actor, id).await?))
}
