//! Template service: authoring, visibility and listings.

use super::base::{Actor, ServiceBase};
use super::results::{TemplateResults, aggregate};
use crate::config::LimitsConfig;
use crate::db::{Database, Template, TemplateDraft, TemplateSummary};
use crate::error::{AppError, AppResult};
use tracing::info;

const MAX_IMAGE_URL_LEN: usize = 2048;

#[derive(Clone)]
pub struct TemplateService {
    db: Database,
    limits: LimitsConfig,
}

impl ServiceBase for TemplateService {
    fn db(&self) -> &Database {
        &self.db
    }
}

impl TemplateService {
    pub fn new(db: Database, limits: LimitsConfig) -> Self {
        Self { db, limits }
    }

    /// Create (`id` absent) or update a template with its questions, tags and access list.
    pub async fn save(
        &self,
        actor: &Actor,
        id: Option<i64>,
        mut draft: TemplateDraft,
    ) -> AppResult<Template> {
        draft.validate().map_err(AppError::InvalidInput)?;
        self.normalize(&mut draft).await?;

        let id = match id {
            None => {
                let id = self.db.templates().create(&actor.id, &draft).await?;
                crate::metrics::record_template_saved(true);
                info!(
                    template_id = id,
                    user_id = %actor.id,
                    questions = draft.questions.len(),
                    "Template created"
                );
                id
            }
            Some(id) => {
                let info = self.live_template(id).await?;
                self.ensure_manage(actor, &info, "edit this template")?;
                self.db.templates().update(id, &draft).await?;
                crate::metrics::record_template_saved(false);
                info!(
                    template_id = id,
                    user_id = %actor.id,
                    questions = draft.questions.len(),
                    "Template updated"
                );
                id
            }
        };

        self.db
            .templates()
            .find(id, false)
            .await?
            .ok_or_else(|| AppError::not_found(format!("template {}", id)))
    }

    async fn normalize(&self, draft: &mut TemplateDraft) -> AppResult<()> {
        draft.topic = draft
            .topic
            .take()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if let Some(topic) = &draft.topic
            && !self.db.topics().exists(topic).await?
        {
            return Err(AppError::invalid(format!("unknown topic: {}", topic)));
        }

        draft.image_url = draft
            .image_url
            .take()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        if draft.image_url.as_ref().is_some_and(|u| u.len() > MAX_IMAGE_URL_LEN) {
            return Err(AppError::invalid("image url is too long"));
        }
        Ok(())
    }

    /// A visible, non-deleted template.
    pub async fn get(&self, actor: Option<&Actor>, id: i64) -> AppResult<Template> {
        let info = self.live_template(id).await?;
        self.ensure_visible(actor, id, &info).await?;

        self.db
            .templates()
            .find(id, false)
            .await?
            .ok_or_else(|| AppError::not_found(format!("template {}", id)))
    }

    pub async fn list_mine(&self, actor: &Actor) -> AppResult<Vec<TemplateSummary>> {
        Ok(self.db.templates().list_by_owner(&actor.id).await?)
    }

    pub async fn latest_public(&self, limit: Option<u32>) -> AppResult<Vec<TemplateSummary>> {
        let limit = self.limits.listing_count(limit);
        Ok(self.db.templates().latest_public(i64::from(limit)).await?)
    }

    pub async fn popular_public(&self, limit: Option<u32>) -> AppResult<Vec<TemplateSummary>> {
        let limit = self.limits.listing_count(limit);
        Ok(self.db.templates().popular_public(i64::from(limit)).await?)
    }

    /// Soft delete; owner or admin.
    pub async fn delete(&self, actor: &Actor, id: i64) -> AppResult<()> {
        let info = self.live_template(id).await?;
        self.ensure_manage(actor, &info, "delete this template")?;

        self.db.templates().set_deleted(id, true).await?;
        info!(template_id = id, user_id = %actor.id, "Template deleted");
        Ok(())
    }

    /// Drop questions that share a position, keeping the newest of each.
    pub async fn cleanup_duplicate_questions(&self, actor: &Actor, id: i64) -> AppResult<u64> {
        let info = self.live_template(id).await?;
        self.ensure_manage(actor, &info, "clean up this template")?;

        let removed = self.db.templates().cleanup_duplicate_questions(id).await?;
        if removed > 0 {
            info!(template_id = id, removed, "Removed duplicate questions");
        }
        Ok(removed)
    }

    /// Aggregated answers per question; owner or admin.
    pub async fn results(&self, actor: &Actor, id: i64) -> AppResult<TemplateResults> {
        let info = self.live_template(id).await?;
        self.ensure_manage(actor, &info, "view results")?;

        let questions = self.db.templates().questions(id).await?;
        let answers = self.db.responses().answers_for_template(id).await?;
        let response_count = self.db.responses().list_for_template(id).await?.len() as i64;

        Ok(TemplateResults {
            template_id: id,
            response_count,
            questions: aggregate(&questions, &answers, self.limits.recent_text_answers as usize),
        })
    }
}
