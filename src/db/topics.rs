//! Topic repository.

use super::{DbError, is_unique_violation};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

/// A template category.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Topic {
    pub id: i64,
    pub name: String,
}

/// Repository for topic operations.
pub struct TopicRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TopicRepository<'a> {
    /// Create a new topic repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// All topics ordered by name.
    pub async fn list(&self) -> Result<Vec<Topic>, DbError> {
        let topics =
            sqlx::query_as::<_, Topic>("SELECT id, name FROM topics ORDER BY name COLLATE NOCASE")
            .fetch_all(self.pool)
            .await?;

        Ok(topics)
    }

    /// Create a topic. Names are unique regardless of case.
    pub async fn create(&self, name: &str) -> Result<Topic, DbError> {
        let result =
            sqlx::query_as::<_, Topic>("INSERT INTO topics (name) VALUES (?) RETURNING id, name")
            .bind(name)
            .fetch_one(self.pool)
            .await;

        match result {
            Ok(topic) => Ok(topic),
            Err(e) if is_unique_violation(&e) => Err(DbError::Conflict(format!("topic {}", name))),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a topic by id.
    pub async fn delete(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM topics WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Whether a topic with this name exists (case-insensitive).
    pub async fn exists(&self, name: &str) -> Result<bool, DbError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM topics WHERE name = ?")
            .bind(name)
            .fetch_one(self.pool)
            .await?;

        Ok(count > 0)
    }

    /// Insert `names` only when the table is empty. Returns how many were inserted.
    pub async fn seed_if_empty(&self, names: &[String]) -> Result<usize, DbError> {
        let mut tx = self.pool.begin().await?;

        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM topics")
            .fetch_one(&mut *tx)
            .await?;
        if count > 0 {
            return Ok(0);
        }

        let mut inserted = 0;
        for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            inserted += sqlx::query("INSERT OR IGNORE INTO topics (name) VALUES (?)")
                .bind(name)
                .execute(&mut *tx)
                .await?
                .rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(inserted)
    }
}
