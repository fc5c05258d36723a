//! User repository.
//!
//! Users are owned by the external identity provider; this table is a
//! local mirror refreshed on every sign-in and by admin bulk syncs.

use super::{DbError, Page, PageRequest, like_pattern};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};

/// A locally mirrored user.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub image_url: Option<String>,
    pub display_name: String,
    pub created_at: i64,
    pub last_login_at: Option<i64>,
    pub is_admin: bool,
    pub is_blocked: bool,
    pub blocked_at: Option<i64>,
    pub blocked_reason: Option<String>,
}

/// Profile as delivered by the identity provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl UserProfile {
    /// "First Last", falling back to the username and then the id.
    pub fn display_name(&self) -> String {
        let full = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or("").trim(),
            self.last_name.as_deref().unwrap_or("").trim()
        );
        let full = full.trim();
        if !full.is_empty() {
            return full.to_string();
        }
        match self.username.as_deref().map(str::trim) {
            Some(u) if !u.is_empty() => u.to_string(),
            _ => self.id.clone(),
        }
    }
}

const USER_COLUMNS: &str = "id, first_name, last_name, email, username, image_url, display_name, \
     created_at, last_login_at, is_admin, is_blocked, blocked_at, blocked_reason";

/// Repository for user operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or refresh a user from an identity-provider profile.
    ///
    /// `login` stamps `last_login_at`; `grant_admin` promotes but never demotes.
    /// Email collisions with another user are resolved by rewriting the local copy.
    pub async fn upsert_profile(
        &self,
        profile: &UserProfile,
        login: bool,
        grant_admin: bool,
    ) -> Result<User, DbError> {
        let now = chrono::Utc::now().timestamp();
        let display_name = profile.display_name();

        let mut tx = self.pool.begin().await?;

        let email = match clean(profile.email.as_deref()) {
            Some(email) => Some(resolve_email(&mut tx, &profile.id, &email).await?),
            None => None,
        };

        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = ?")
            .bind(&profile.id)
            .fetch_one(&mut *tx)
            .await?
            > 0;

        if exists {
            sqlx::query(
                r#"
                UPDATE users
                SET first_name = ?, last_name = ?, email = ?, username = COALESCE(?, username),
                    image_url = ?, display_name = ?,
                    last_login_at = CASE WHEN ? THEN ? ELSE last_login_at END,
                    is_admin = CASE WHEN ? THEN 1 ELSE is_admin END
                WHERE id = ?
                "#,
            )
            .bind(clean(profile.first_name.as_deref()))
            .bind(clean(profile.last_name.as_deref()))
            .bind(&email)
            .bind(clean(profile.username.as_deref()))
            .bind(clean(profile.image_url.as_deref()))
            .bind(&display_name)
            .bind(login)
            .bind(now)
            .bind(grant_admin)
            .bind(&profile.id)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                r#"
                INSERT INTO users (id, first_name, last_name, email, username, image_url,
                                   display_name, created_at, last_login_at, is_admin)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&profile.id)
            .bind(clean(profile.first_name.as_deref()))
            .bind(clean(profile.last_name.as_deref()))
            .bind(&email)
            .bind(clean(profile.username.as_deref()))
            .bind(clean(profile.image_url.as_deref()))
            .bind(&display_name)
            .bind(now)
            .bind(login.then_some(now))
            .bind(grant_admin)
            .execute(&mut *tx)
            .await?;
        }

        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(&profile.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(user)
    }

    /// Find user by id.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, DbError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Grant or revoke the admin role. Returns false if the user doesn't exist.
    pub async fn set_admin(&self, id: &str, is_admin: bool) -> Result<bool, DbError> {
        let result = sqlx::query("UPDATE users SET is_admin = ? WHERE id = ?")
            .bind(is_admin)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Block or unblock a user. Unblocking clears the timestamp and reason.
    pub async fn set_blocked(
        &self,
        id: &str,
        blocked: bool,
        reason: Option<&str>,
    ) -> Result<bool, DbError> {
        let result = if blocked {
            let now = chrono::Utc::now().timestamp();
            sqlx::query(
                "UPDATE users SET is_blocked = 1, blocked_at = ?, blocked_reason = ? WHERE id = ?",
            )
            .bind(now)
            .bind(reason)
            .bind(id)
            .execute(self.pool)
            .await?
        } else {
            sqlx::query(
                "UPDATE users SET is_blocked = 0, blocked_at = NULL, blocked_reason = NULL
                 WHERE id = ?",
            )
            .bind(id)
            .execute(self.pool)
            .await?
        };

        Ok(result.rows_affected() > 0)
    }

    /// Delete a user and, through cascades, everything they own.
    pub async fn delete(&self, id: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Page through users, optionally filtered by email, username or name.
    pub async fn list(
        &self,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<User>, DbError> {
        let pattern = search
            .filter(|s| !s.trim().is_empty())
            .map(like_pattern);

        const FILTER: &str = r#"
            (?1 IS NULL
             OR email LIKE ?1 ESCAPE '\' OR username LIKE ?1 ESCAPE '\'
             OR first_name LIKE ?1 ESCAPE '\' OR last_name LIKE ?1 ESCAPE '\')
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM users WHERE {FILTER}"
        ))
        .bind(&pattern)
        .fetch_one(self.pool)
        .await?;

        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE {FILTER}
            ORDER BY first_name COLLATE NOCASE, last_name COLLATE NOCASE, email COLLATE NOCASE
            LIMIT ?2 OFFSET ?3
            "#
        ))
        .bind(&pattern)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok(Page::new(users, total, page))
    }
}

/// Pick an email for `user_id` that no other user holds.
async fn resolve_email(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: &str,
    email: &str,
) -> Result<String, DbError> {
    let mut candidates = vec![email.to_string()];
    if let Some(alt) = tagged_email(email, user_id) {
        candidates.push(alt);
    }
    candidates.push(format!("user_{}@unique.local", user_id));

    for candidate in candidates {
        let taken = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE email = ? COLLATE NOCASE AND id != ?",
        )
        .bind(&candidate)
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await?
            > 0;

        if !taken {
            if candidate != email {
                tracing::warn!(
                    user_id,
                    original = email,
                    rewritten = %candidate,
                    "Email already used by another user, storing rewritten address"
                );
            }
            return Ok(candidate);
        }
    }

    Err(DbError::Conflict(format!("email for user {}", user_id)))
}

/// `local@domain` -> `local+<first 6 chars of id>@domain`.
fn tagged_email(email: &str, user_id: &str) -> Option<String> {
    let at = email.find('@').filter(|&i| i > 0)?;
    let tag: String = user_id.chars().take(6).collect();
    Some(format!("{}+{}{}", &email[..at], tag, &email[at..]))
}

/// Default username for profiles that arrive without one.
pub fn generate_username(profile: &UserProfile) -> String {
    use rand::Rng;

    let first = clean(profile.first_name.as_deref())
        .map(|s| s.to_lowercase())
        .unwrap_or_else(|| "user".to_string());
    let last = clean(profile.last_name.as_deref())
        .map(|s| s.to_lowercase())
        .unwrap_or_else(|| "anon".to_string());
    let suffix = rand::thread_rng().gen_range(1000..10000);
    format!("{}_{}_{}", first, last, suffix)
}

fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn profile(id: &str, email: &str) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            email: Some(email.to_string()),
            username: Some(format!("{}_name", id)),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn upsert_creates_then_updates() {
        let db = Database::new(":memory:").await.unwrap();

        let created = db
            .users()
            .upsert_profile(&profile("u1", "ada@example.com"), true, false)
            .await
            .unwrap();
        assert_eq!(created.display_name, "Ada Lovelace");
        assert!(created.last_login_at.is_some());
        assert!(!created.is_admin);

        let mut changed = profile("u1", "ada@new.example.com");
        changed.first_name = Some("Augusta".into());
        let updated = db.users().upsert_profile(&changed, true, true).await.unwrap();
        assert_eq!(updated.display_name, "Augusta Lovelace");
        assert_eq!(updated.email.as_deref(), Some("ada@new.example.com"));
        assert!(updated.is_admin);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn sync_never_demotes_admin() {
        let db = Database::new(":memory:").await.unwrap();
        db.users()
            .upsert_profile(&profile("u1", "a@example.com"), true, true)
            .await
            .unwrap();
        let again = db
            .users()
            .upsert_profile(&profile("u1", "a@example.com"), true, false)
            .await
            .unwrap();
        assert!(again.is_admin);
    }

    #[tokio::test]
    async fn duplicate_email_is_rewritten() {
        let db = Database::new(":memory:").await.unwrap();
        db.users()
            .upsert_profile(&profile("first", "same@example.com"), true, false)
            .await
            .unwrap();

        let second = db
            .users()
            .upsert_profile(&profile("user_abcdef123", "SAME@example.com"), true, false)
            .await
            .unwrap();
        assert_eq!(second.email.as_deref(), Some("SAME+user_a@example.com"));
    }

    #[tokio::test]
    async fn block_and_unblock() {
        let db = Database::new(":memory:").await.unwrap();
        db.users()
            .upsert_profile(&profile("u1", "a@example.com"), true, false)
            .await
            .unwrap();

        assert!(db.users().set_blocked("u1", true, Some("spam")).await.unwrap());
        let blocked = db.users().find_by_id("u1").await.unwrap().unwrap();
        assert!(blocked.is_blocked);
        assert_eq!(blocked.blocked_reason.as_deref(), Some("spam"));
        assert!(blocked.blocked_at.is_some());

        assert!(db.users().set_blocked("u1", false, None).await.unwrap());
        let unblocked = db.users().find_by_id("u1").await.unwrap().unwrap();
        assert!(!unblocked.is_blocked);
        assert!(unblocked.blocked_reason.is_none());
        assert!(unblocked.blocked_at.is_none());

        assert!(!db.users().set_blocked("missing", true, None).await.unwrap());
    }

    #[tokio::test]
    async fn list_searches_and_pages() {
        let db = Database::new(":memory:").await.unwrap();
        for i in 0..5 {
            db.users()
                .upsert_profile(
                    &profile(&format!("u{i}"), &format!("u{i}@example.com")),
                    true,
                    false,
                )
                .await
                .unwrap();
        }

        let page = db.users().list(None, PageRequest::new(2, 2)).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);

        let hit = db.users().list(Some("u3@"), PageRequest::new(1, 10)).await.unwrap();
        assert_eq!(hit.total, 1);
        assert_eq!(hit.items[0].id, "u3");
    }

    #[test]
    fn display_name_fallbacks() {
        let mut p = UserProfile {
            id: "id1".into(),
            ..Default::default()
        };
        assert_eq!(p.display_name(), "id1");
        p.username = Some("nick".into());
        assert_eq!(p.display_name(), "nick");
        p.last_name = Some("Only".into());
        assert_eq!(p.display_name(), "Only");
    }

    #[test]
    fn generated_username_shape() {
        let p = UserProfile {
            id: "x".into(),
            first_name: Some("Grace".into()),
            ..Default::default()
        };
        let name = generate_username(&p);
        assert!(name.starts_with("grace_anon_"));
        assert_eq!(name.len(), "grace_anon_".len() + 4);
    }
}
