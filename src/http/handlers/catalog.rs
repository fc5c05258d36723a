//! Search, tags and topics.

use crate::db::{TagCount, TemplateSummary, Topic};
use crate::error::AppResult;
use crate::http::AppState;
use crate::http::extract::{ApiPath, ApiQuery, MaybeActor};
use axum::Json;
use axum::extract::State;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn search(
    State(state): State<AppState>,
    actor: MaybeActor,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> AppResult<Json<Vec<TemplateSummary>>> {
    Ok(Json(state.services.search.search(actor.as_ref(), &query.q).await?))
}

pub async fn tags(State(state): State<AppState>) -> AppResult<Json<Vec<TagCount>>> {
    Ok(Json(state.services.search.tag_cloud().await?))
}

pub async fn by_tag(
    State(state): State<AppState>,
    ApiPath(name): ApiPath<String>,
) -> AppResult<Json<Vec<TemplateSummary>>> {
    Ok(Json(state.services.search.by_tag(&name).await?))
}

pub async fn topics(State(state): State<AppState>) -> AppResult<Json<Vec<Topic>>> {
    Ok(Json(state.services.topics.list().await?))
}
