//! Admin service. Every operation requires the admin role.

use super::base::{Actor, page_request};
use crate::config::LimitsConfig;
use crate::db::{AdminStats, Database, Page, ResponseSummary, TemplateSummary, User};
use crate::error::{AppError, AppResult};
use serde::Deserialize;
use tracing::{info, warn};

/// Common paging and search parameters of admin listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Clone)]
pub struct AdminService {
    db: Database,
    limits: LimitsConfig,
}

impl AdminService {
    pub fn new(db: Database, limits: LimitsConfig) -> Self {
        Self { db, limits }
    }

    pub async fn stats(&self, actor: &Actor) -> AppResult<AdminStats> {
        actor.require_admin()?;
        Ok(self.db.admin().stats().await?)
    }

    /// One-line summary of the row counts.
    pub async fn diagnostics(&self, actor: &Actor) -> AppResult<String> {
        let s = self.stats(actor).await?;
        Ok(format!(
            "users={} templates={} deleted_templates={} forms={} responses={}",
            s.users, s.templates, s.deleted_templates, s.forms, s.responses
        ))
    }

    pub async fn templates(
        &self,
        actor: &Actor,
        query: &ListQuery,
    ) -> AppResult<Page<TemplateSummary>> {
        actor.require_admin()?;
        let page = page_request(&self.limits, query.page, query.page_size);
        Ok(self
            .db
            .admin()
            .templates(query.include_deleted, query.search.as_deref(), page)
            .await?)
    }

    /// Idempotent soft delete.
    pub async fn delete_template(&self, actor: &Actor, id: i64) -> AppResult<()> {
        self.set_template_deleted(actor, id, true).await
    }

    /// Idempotent restore.
    pub async fn restore_template(&self, actor: &Actor, id: i64) -> AppResult<()> {
        self.set_template_deleted(actor, id, false).await
    }

    async fn set_template_deleted(&self, actor: &Actor, id: i64, deleted: bool) -> AppResult<()> {
        actor.require_admin()?;
        match self.db.templates().set_deleted(id, deleted).await? {
            None => Err(AppError::not_found(format!("template {}", id))),
            Some(changed) => {
                if changed {
                    info!(
                        template_id = id,
                        admin = %actor.id,
                        deleted,
                        "Template deletion flag changed"
                    );
                }
                Ok(())
            }
        }
    }

    pub async fn responses(
        &self,
        actor: &Actor,
        query: &ListQuery,
    ) -> AppResult<Page<ResponseSummary>> {
        actor.require_admin()?;
        let page = page_request(&self.limits, query.page, query.page_size);
        Ok(self.db.responses().list_all(query.search.as_deref(), page).await?)
    }

    pub async fn delete_response(&self, actor: &Actor, id: i64) -> AppResult<()> {
        actor.require_admin()?;
        if !self.db.responses().delete(id).await? {
            return Err(AppError::not_found(format!("response {}", id)));
        }
        info!(response_id = id, admin = %actor.id, "Response deleted");
        Ok(())
    }

    pub async fn users(&self, actor: &Actor, query: &ListQuery) -> AppResult<Page<User>> {
        actor.require_admin()?;
        let page = page_request(&self.limits, query.page, query.page_size);
        Ok(self.db.users().list(query.search.as_deref(), page).await?)
    }

    pub async fn set_admin(&self, actor: &Actor, id: &str, is_admin: bool) -> AppResult<()> {
        actor.require_admin()?;
        if id == actor.id && !is_admin {
            return Err(AppError::invalid("you cannot revoke your own admin role"));
        }
        if !self.db.users().set_admin(id, is_admin).await? {
            return Err(AppError::not_found(format!("user {}", id)));
        }
        info!(user_id = %id, admin = %actor.id, is_admin, "Admin role changed");
        Ok(())
    }

    pub async fn set_blocked(
        &self,
        actor: &Actor,
        id: &str,
        blocked: bool,
        reason: Option<&str>,
    ) -> AppResult<()> {
        actor.require_admin()?;
        if id == actor.id && blocked {
            return Err(AppError::invalid("you cannot block yourself"));
        }
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        if !self.db.users().set_blocked(id, blocked, reason).await? {
            return Err(AppError::not_found(format!("user {}", id)));
        }
        warn!(
            user_id = %id,
            admin = %actor.id,
            blocked,
            reason = ?reason,
            "User block state changed"
        );
        Ok(())
    }

    /// Delete a user and everything they own.
    pub async fn delete_user(&self, actor: &Actor, id: &str) -> AppResult<()> {
        actor.require_admin()?;
        if id == actor.id {
            return Err(AppError::invalid("you cannot delete yourself"));
        }
        if !self.db.users().delete(id).await? {
            return Err(AppError::not_found(format!("user {}", id)));
        }
        warn!(user_id = %id, admin = %actor.id, "User deleted");
        Ok(())
    }
}
