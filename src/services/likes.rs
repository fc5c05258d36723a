//! Like service.

use super::base::{Actor, ServiceBase};
use crate::db::Database;
use crate::error::AppResult;
use serde::Serialize;
use tracing::debug;

/// Like state of a template for the requesting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeState {
    pub liked: bool,
    pub count: i64,
}

#[derive(Clone)]
pub struct LikeService {
    db: Database,
}

impl ServiceBase for LikeService {
    fn db(&self) -> &Database {
        &self.db
    }
}

impl LikeService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn toggle(&self, actor: &Actor, template_id: i64) -> AppResult<LikeState> {
        let info = self.live_template(template_id).await?;
        self.ensure_visible(Some(actor), template_id, &info).await?;

        let (liked, count) = self.db.likes().toggle(template_id, &actor.id).await?;
        crate::metrics::record_like(liked);
        debug!(template_id, user_id = %actor.id, liked, count, "Like toggled");
        Ok(LikeState { liked, count })
    }

    /// Anonymous viewers never have a like.
    pub async fn has_liked(&self, actor: Option<&Actor>, template_id: i64) -> AppResult<bool> {
        match actor {
            Some(actor) => Ok(self.db.likes().has_liked(template_id, &actor.id).await?),
            None => Ok(false),
        }
    }

    pub async fn count(&self, template_id: i64) -> AppResult<i64> {
        Ok(self.db.likes().count(template_id).await?)
    }

    pub async fn state(&self, actor: Option<&Actor>, template_id: i64) -> AppResult<LikeState> {
        let info = self.live_template(template_id).await?;
        self.ensure_visible(actor, template_id, &info).await?;

        Ok(LikeState {
            liked: self.has_liked(actor, template_id).await?,
            count: self.count(template_id).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{TemplateDraft, UserProfile};
    use crate::error::AppError;

    #[tokio::test]
    async fn toggle_and_state() {
        let db = Database::new(":memory:").await.unwrap();
        let profile = UserProfile {
            id: "fan".into(),
            ..Default::default()
        };
        db.users().upsert_profile(&profile, true, false).await.unwrap();
        let draft = TemplateDraft {
            title: "Liked".into(),
            description: String::new(),
            image_url: None,
            topic: None,
            is_public: true,
            tags: vec![],
            questions: vec![],
            allowed_users: None,
        };
        let t = db.templates().create("fan", &draft).await.unwrap();
        let svc = LikeService::new(db);
        let fan = Actor::new("fan", false);

        assert_eq!(svc.toggle(&fan, t).await.unwrap(), LikeState { liked: true, count: 1 });
        assert_eq!(svc.state(None, t).await.unwrap(), LikeState { liked: false, count: 1 });
        assert_eq!(svc.toggle(&fan, t).await.unwrap(), LikeState { liked: false, count: 0 });
        assert!(matches!(svc.toggle(&fan, 404).await, Err(AppError::NotFound(_))));
    }
}
