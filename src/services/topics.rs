//! Topic service.

use super::base::Actor;
use crate::db::{Database, Topic};
use crate::error::{AppError, AppResult};
use tracing::info;

const MAX_TOPIC_LEN: usize = 100;

#[derive(Clone)]
pub struct TopicService {
    db: Database,
}

impl TopicService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> AppResult<Vec<Topic>> {
        Ok(self.db.topics().list().await?)
    }

    /// Insert the default topics when none exist yet.
    pub async fn seed_defaults(&self, names: &[String]) -> AppResult<usize> {
        let inserted = self.db.topics().seed_if_empty(names).await?;
        if inserted > 0 {
            info!(count = inserted, "Seeded default topics");
        }
        Ok(inserted)
    }

    pub async fn create(&self, actor: &Actor, name: &str) -> AppResult<Topic> {
        actor.require_admin()?;
        let name = name.trim();
        if name.is_empty() || name.chars().count() > MAX_TOPIC_LEN {
            return Err(AppError::invalid(format!(
                "topic name must be 1-{} characters",
                MAX_TOPIC_LEN
            )));
        }

        let topic = self.db.topics().create(name).await?;
        info!(topic = %topic.name, admin = %actor.id, "Topic created");
        Ok(topic)
    }

    pub async fn delete(&self, actor: &Actor, id: i64) -> AppResult<()> {
        actor.require_admin()?;
        if !self.db.topics().delete(id).await? {
            return Err(AppError::not_found(format!("topic {}", id)));
        }
        info!(topic_id = id, admin = %actor.id, "Topic deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admin_only_and_unique() {
        let svc = TopicService::new(Database::new(":memory:").await.unwrap());
        let admin = Actor::new("a", true);

        assert!(matches!(
            svc.create(&Actor::new("u", false), "Sports").await,
            Err(AppError::Forbidden(_))
        ));
        let topic = svc.create(&admin, " Sports ").await.unwrap();
        assert_eq!(topic.name, "Sports");
        assert!(matches!(svc.create(&admin, "sports").await, Err(AppError::InvalidInput(_))));
        assert!(matches!(svc.create(&admin, "").await, Err(AppError::InvalidInput(_))));

        svc.delete(&admin, topic.id).await.unwrap();
        assert!(matches!(svc.delete(&admin, topic.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn seeding_skips_populated_table() {
        let svc = TopicService::new(Database::new(":memory:").await.unwrap());
        let defaults = crate::config::TopicsConfig::default().defaults;
        assert_eq!(svc.seed_defaults(&defaults).await.unwrap(), defaults.len());
        assert_eq!(svc.seed_defaults(&defaults).await.unwrap(), 0);
        assert_eq!(svc.list().await.unwrap().len(), defaults.len());
    }
}
