//! Comment service.

use super::base::{Actor, ServiceBase};
use crate::db::{Comment, Database};
use crate::error::{AppError, AppResult};
use tracing::info;

#[derive(Clone)]
pub struct CommentService {
    db: Database,
    max_length: usize,
}

impl ServiceBase for CommentService {
    fn db(&self) -> &Database {
        &self.db
    }
}

impl CommentService {
    pub fn new(db: Database, max_length: usize) -> Self {
        Self { db, max_length }
    }

    /// Visible comments on a live template, newest first.
    pub async fn list(&self, actor: Option<&Actor>, template_id: i64) -> AppResult<Vec<Comment>> {
        let info = self.live_template(template_id).await?;
        self.ensure_visible(actor, template_id, &info).await?;
        Ok(self.db.comments().list_for_template(template_id).await?)
    }

    pub async fn add(&self, actor: &Actor, template_id: i64, text: &str) -> AppResult<Comment> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::invalid("comment text is required"));
        }
        if text.chars().count() > self.max_length {
            return Err(AppError::invalid(format!(
                "comment must be at most {} characters",
                self.max_length
            )));
        }

        let info = self.live_template(template_id).await?;
        self.ensure_visible(Some(actor), template_id, &info).await?;

        let comment = self.db.comments().add(template_id, &actor.id, text).await?;
        crate::metrics::record_comment();
        info!(template_id, comment_id = comment.id, user_id = %actor.id, "Comment added");
        Ok(comment)
    }

    /// Soft delete by the author, the template owner or an admin.
    pub async fn delete(&self, actor: &Actor, comment_id: i64) -> AppResult<()> {
        let comment = self
            .db
            .comments()
            .find(comment_id)
            .await?
            .filter(|c| !c.is_deleted)
            .ok_or_else(|| AppError::not_found(format!("comment {}", comment_id)))?;

        let template_owner = self
            .db
            .templates()
            .access_info(comment.template_id)
            .await?
            .map(|info| info.owner_id)
            .unwrap_or_default();

        if comment.author_id != actor.id && !actor.can_manage(&template_owner) {
            return Err(AppError::forbidden("not allowed to delete this comment"));
        }

        self.db.comments().soft_delete(comment_id).await?;
        info!(comment_id, user_id = %actor.id, "Comment deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{TemplateDraft, UserProfile};

    async fn setup() -> (CommentService, i64) {
        let db = Database::new(":memory:").await.unwrap();
        for id in ["owner", "author", "other"] {
            let profile = UserProfile {
                id: id.into(),
                ..Default::default()
            };
            db.users().upsert_profile(&profile, true, false).await.unwrap();
        }
        let draft = TemplateDraft {
            title: "Open".into(),
            description: String::new(),
            image_url: None,
            topic: None,
            is_public: true,
            tags: vec![],
            questions: vec![],
            allowed_users: None,
        };
        let id = db.templates().create("owner", &draft).await.unwrap();
        (CommentService::new(db, 10), id)
    }

    #[tokio::test]
    async fn text_rules() {
        let (svc, t) = setup().await;
        let author = Actor::new("author", false);
        assert!(matches!(svc.add(&author, t, "   ").await, Err(AppError::InvalidInput(_))));
        assert!(matches!(
            svc.add(&author, t, "way too long text").await,
            Err(AppError::InvalidInput(_))
        ));
        assert_eq!(svc.add(&author, t, "  nice!  ").await.unwrap().content, "nice!");
    }

    #[tokio::test]
    async fn delete_permissions() {
        let (svc, t) = setup().await;
        let author = Actor::new("author", false);
        let c1 = svc.add(&author, t, "one").await.unwrap();
        let c2 = svc.add(&author, t, "two").await.unwrap();

        assert!(matches!(
            svc.delete(&Actor::new("other", false), c1.id).await,
            Err(AppError::Forbidden(_))
        ));
        svc.delete(&author, c1.id).await.unwrap();
        svc.delete(&Actor::new("owner", false), c2.id).await.unwrap();
        assert!(matches!(svc.delete(&author, c1.id).await, Err(AppError::NotFound(_))));
        assert!(svc.list(None, t).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleted_template_has_no_comments() {
        let (svc, t) = setup().await;
        svc.db.templates().set_deleted(t, true).await.unwrap();
        assert!(matches!(svc.list(None, t).await, Err(AppError::NotFound(_))));
        assert!(matches!(
            svc.add(&Actor::new("author", false), t, "hi").await,
            Err(AppError::NotFound(_))
        ));
    }
}
