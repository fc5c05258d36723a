//! Search service.

use super::base::Actor;
use crate::config::LimitsConfig;
use crate::db::{Database, TagCount, TemplateSummary};
use crate::error::AppResult;

#[derive(Clone)]
pub struct SearchService {
    db: Database,
    limits: LimitsConfig,
}

impl SearchService {
    pub fn new(db: Database, limits: LimitsConfig) -> Self {
        Self { db, limits }
    }

    /// Blank queries match nothing.
    pub async fn search(
        &self,
        actor: Option<&Actor>,
        query: &str,
    ) -> AppResult<Vec<TemplateSummary>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let limit = i64::from(self.limits.search_results);
        Ok(self
            .db
            .search()
            .search(query, actor.map(|a| a.id.as_str()), limit)
            .await?)
    }

    pub async fn by_tag(&self, tag: &str) -> AppResult<Vec<TemplateSummary>> {
        let limit = i64::from(self.limits.search_results);
        Ok(self.db.search().by_tag(&tag.to_lowercase(), limit).await?)
    }

    pub async fn tag_cloud(&self) -> AppResult<Vec<TagCount>> {
        Ok(self.db.search().tag_cloud().await?)
    }
}
