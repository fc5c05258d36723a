//! User sync service.
//!
//! Mirrors identity-provider profiles into the local users table and
//! resolves request identities into [`Actor`]s.

use super::base::Actor;
use crate::config::AuthConfig;
use crate::db::retry::RetryPolicy;
use crate::db::{Database, User, UserProfile};
use crate::error::{AppError, AppResult};
use tracing::{info, warn};

const MAX_ID_LEN: usize = 200;

#[derive(Clone)]
pub struct UserService {
    db: Database,
    bootstrap_admins: Vec<String>,
    retry: RetryPolicy,
}

impl UserService {
    pub fn new(db: Database, auth: &AuthConfig, retry: RetryPolicy) -> Self {
        Self {
            db,
            bootstrap_admins: auth.bootstrap_admins.clone(),
            retry,
        }
    }

    /// Upsert the local copy of a signed-in user.
    pub async fn sync_profile(&self, profile: &UserProfile) -> AppResult<User> {
        let user = self.sync(profile, true).await?;
        if user.is_blocked {
            return Err(AppError::forbidden("account is blocked"));
        }
        Ok(user)
    }

    /// Admin bulk import. Failures are logged and skipped.
    pub async fn sync_batch(
        &self,
        actor: &Actor,
        profiles: &[UserProfile],
    ) -> AppResult<Vec<User>> {
        actor.require_admin()?;

        let mut synced = Vec::with_capacity(profiles.len());
        for profile in profiles {
            let mut profile = profile.clone();
            if profile.username.as_deref().is_none_or(|u| u.trim().is_empty()) {
                profile.username = Some(crate::db::generate_username(&profile));
            }
            match self.sync(&profile, false).await {
                Ok(user) => synced.push(user),
                Err(e) => warn!(user_id = %profile.id, error = %e, "Skipping user in batch sync"),
            }
        }

        info!(
            admin = %actor.id,
            requested = profiles.len(),
            synced = synced.len(),
            "Batch user sync finished"
        );
        Ok(synced)
    }

    async fn sync(&self, profile: &UserProfile, login: bool) -> AppResult<User> {
        let id = profile.id.trim();
        if id.is_empty() || id.len() > MAX_ID_LEN {
            return Err(AppError::invalid("user id must be 1-200 characters"));
        }
        if id != profile.id {
            return Err(AppError::invalid("user id must not have surrounding whitespace"));
        }

        let grant_admin = self.bootstrap_admins.iter().any(|a| a == id);
        let user = self
            .retry
            .run("sync_user", || async {
                self.db.users().upsert_profile(profile, login, grant_admin).await
            })
            .await?;

        crate::metrics::record_user_synced();
        info!(user_id = %user.id, login, is_admin = user.is_admin, "User synced");
        Ok(user)
    }

    /// Resolve an identity header into an actor.
    ///
    /// Unknown ids have never synced and are treated as signed out.
    pub async fn resolve_actor(&self, id: &str) -> AppResult<Actor> {
        let user = self
            .db
            .users()
            .find_by_id(id)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        if user.is_blocked {
            return Err(AppError::forbidden("account is blocked"));
        }
        Ok(Actor::from(&user))
    }

    /// The actor's own profile.
    pub async fn current_user(&self, actor: &Actor) -> AppResult<User> {
        self.find(&actor.id).await
    }

    pub async fn find(&self, id: &str) -> AppResult<User> {
        self.db
            .users()
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("user {}", id)))
    }
}
