//! Shared authorization helpers for the services.
//!
//! Every service owns a [`Database`] handle; the [`ServiceBase`] defaults
//! load template ownership and apply the common visibility rules.

use crate::db::{AccessInfo, Database, PageRequest, User};
use crate::error::{AppError, AppResult};
use std::future::Future;

/// The authenticated, synced, non-blocked user making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub is_admin: bool,
}

impl Actor {
    pub fn new(id: impl Into<String>, is_admin: bool) -> Self {
        Self {
            id: id.into(),
            is_admin,
        }
    }

    /// True for the owner or any admin.
    pub fn can_manage(&self, owner_id: &str) -> bool {
        self.is_admin || self.id == owner_id
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AppError::forbidden("administrator role required"))
        }
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self::new(user.id.clone(), user.is_admin)
    }
}

/// Saturate a client-supplied number into `0..=u32::MAX`.
pub fn clamp_to_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// Build a clamped page request. Negative and zero values clamp to 1.
pub fn page_request(
    limits: &crate::config::LimitsConfig,
    page: Option<i64>,
    page_size: Option<i64>,
) -> PageRequest {
    PageRequest::new(
        page.map_or(1, clamp_to_u32),
        limits.page_size(page_size.map(clamp_to_u32)),
    )
}

/// Base trait for services providing template ownership checks.
pub trait ServiceBase {
    /// Get the database handle.
    fn db(&self) -> &Database;

    /// Ownership facts of a non-deleted template; `NotFound` otherwise.
    fn live_template(&self, id: i64) -> impl Future<Output = AppResult<AccessInfo>> + Send
    where
        Self: Sync,
    {
        async move {
            match self.db().templates().access_info(id).await? {
                Some(info) if !info.is_deleted => Ok(info),
                _ => Err(AppError::not_found(format!("template {}", id))),
            }
        }
    }

    /// Owner or admin only.
    fn ensure_manage(&self, actor: &Actor, info: &AccessInfo, action: &str) -> AppResult<()> {
        if actor.can_manage(&info.owner_id) {
            Ok(())
        } else {
            Err(AppError::forbidden(format!(
                "only the template owner or an admin can {}",
                action
            )))
        }
    }

    /// Public templates are visible to everyone; others to the owner, admins
    /// and users on the access list.
    fn ensure_visible(
        &self,
        actor: Option<&Actor>,
        template_id: i64,
        info: &AccessInfo,
    ) -> impl Future<Output = AppResult<()>> + Send
    where
        Self: Sync,
    {
        let actor = actor.cloned();
        let public = info.is_public;
        let owner_id = info.owner_id.clone();
        async move {
            if public {
                return Ok(());
            }
            let Some(actor) = actor else {
                return Err(AppError::Unauthenticated);
            };
            if actor.can_manage(&owner_id)
                || self.db().templates().has_access(template_id, &actor.id).await?
            {
                return Ok(());
            }
            Err(AppError::forbidden("this template is private"))
        }
    }
}
