//! Like repository.
//!
//! One row per (template, user); the primary key enforces uniqueness.

use super::DbError;
use sqlx::SqlitePool;

/// Repository for like operations.
pub struct LikeRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> LikeRepository<'a> {
    /// Create a new like repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Flip the like state. Returns `(liked, count)` after the change.
    pub async fn toggle(&self, template_id: i64, user_id: &str) -> Result<(bool, i64), DbError> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM likes WHERE template_id = ? AND user_id = ?")
            .bind(template_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if !removed {
            sqlx::query("INSERT INTO likes (template_id, user_id, liked_at) VALUES (?, ?, ?)")
                .bind(template_id)
                .bind(user_id)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM likes WHERE template_id = ?")
            .bind(template_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((!removed, count))
    }

    /// Whether the user currently likes the template.
    pub async fn has_liked(&self, template_id: i64, user_id: &str) -> Result<bool, DbError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM likes WHERE template_id = ? AND user_id = ?",
        )
        .bind(template_id)
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Number of likes on a template.
    pub async fn count(&self, template_id: i64) -> Result<i64, DbError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM likes WHERE template_id = ?")
            .bind(template_id)
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }
}
