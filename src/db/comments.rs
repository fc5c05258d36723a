//! Comment repository.

use super::DbError;
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

/// A comment on a template.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Comment {
    pub id: i64,
    pub template_id: i64,
    pub author_id: String,
    pub author_name: String,
    pub content: String,
    pub created_at: i64,
    pub is_deleted: bool,
}

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.template_id, c.author_id, COALESCE(u.display_name, '') AS author_name,
           c.content, c.created_at, c.is_deleted
    FROM comments c
    LEFT JOIN users u ON u.id = c.author_id
"#;

/// Repository for comment operations.
pub struct CommentRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CommentRepository<'a> {
    /// Create a new comment repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Add a comment.
    pub async fn add(
        &self,
        template_id: i64,
        author_id: &str,
        content: &str,
    ) -> Result<Comment, DbError> {
        let now = chrono::Utc::now().timestamp();

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO comments (template_id, author_id, content, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(template_id)
        .bind(author_id)
        .bind(content)
        .bind(now)
        .fetch_one(self.pool)
        .await?;

        self.find(id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("comment {}", id)))
    }

    /// Find a comment by id, deleted or not.
    pub async fn find(&self, id: i64) -> Result<Option<Comment>, DbError> {
        let comment = sqlx::query_as::<_, Comment>(&format!("{COMMENT_SELECT} WHERE c.id = ?"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(comment)
    }

    /// Visible comments of a template, newest first.
    pub async fn list_for_template(&self, template_id: i64) -> Result<Vec<Comment>, DbError> {
        let comments = sqlx::query_as::<_, Comment>(&format!(
            "{COMMENT_SELECT} WHERE c.template_id = ? AND c.is_deleted = 0 \
             ORDER BY c.created_at DESC, c.id DESC"
        ))
        .bind(template_id)
        .fetch_all(self.pool)
        .await?;

        Ok(comments)
    }

    /// Soft delete. Returns false when already deleted or missing.
    pub async fn soft_delete(&self, id: i64) -> Result<bool, DbError> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            "UPDATE comments SET is_deleted = 1, deleted_at = ? WHERE id = ? AND is_deleted = 0",
        )
        .bind(now)
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, TemplateDraft, UserProfile};

    #[tokio::test]
    async fn add_list_soft_delete() {
        let db = Database::new(":memory:").await.unwrap();
        let profile = UserProfile {
            id: "u1".into(),
            first_name: Some("Grace".into()),
            last_name: Some("Hopper".into()),
            ..Default::default()
        };
        db.users().upsert_profile(&profile, true, false).await.unwrap();
        let draft = TemplateDraft {
            title: "T".into(),
            description: String::new(),
            image_url: None,
            topic: None,
            is_public: true,
            tags: vec![],
            questions: vec![],
            allowed_users: None,
        };
        let template_id = db.templates().create("u1", &draft).await.unwrap();

        let first = db.comments().add(template_id, "u1", "first").await.unwrap();
        let second = db.comments().add(template_id, "u1", "second").await.unwrap();
        assert_eq!(first.author_name, "Grace Hopper");

        let listed = db.comments().list_for_template(template_id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);

        assert!(db.comments().soft_delete(first.id).await.unwrap());
        assert!(!db.comments().soft_delete(first.id).await.unwrap());

        let listed = db.comments().list_for_template(template_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(db.comments().find(first.id).await.unwrap().unwrap().is_deleted);
    }
}
