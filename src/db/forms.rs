//! Form repository.
//!
//! A form is a fillable instance of a template. Every template gets a
//! default form on first submission.

use super::DbError;
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

/// A stored form.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Form {
    pub id: i64,
    pub template_id: i64,
    pub template_title: String,
    pub creator_id: String,
    pub name: String,
    pub description: String,
    pub is_public: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

const FORM_SELECT: &str = r#"
    SELECT f.id, f.template_id, t.title AS template_title, f.creator_id, f.name,
           f.description, f.is_public, f.created_at, f.updated_at
    FROM forms f
    JOIN templates t ON t.id = f.template_id
"#;

/// Repository for form operations.
pub struct FormRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FormRepository<'a> {
    /// Create a new form repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a form for a template.
    pub async fn create(
        &self,
        template_id: i64,
        creator_id: &str,
        name: &str,
        description: &str,
        is_public: bool,
    ) -> Result<Form, DbError> {
        let now = chrono::Utc::now().timestamp();

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO forms (template_id, creator_id, name, description, is_public,
                               created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(template_id)
        .bind(creator_id)
        .bind(name)
        .bind(description)
        .bind(is_public)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await?;

        self.find(id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("form {}", id)))
    }

    /// Find form by id.
    pub async fn find(&self, id: i64) -> Result<Option<Form>, DbError> {
        let form = sqlx::query_as::<_, Form>(&format!("{FORM_SELECT} WHERE f.id = ?"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(form)
    }

    /// Forms created by a user, newest first.
    pub async fn list_by_creator(&self, creator_id: &str) -> Result<Vec<Form>, DbError> {
        let forms = sqlx::query_as::<_, Form>(&format!(
            "{FORM_SELECT} WHERE f.creator_id = ? ORDER BY f.created_at DESC, f.id DESC"
        ))
        .bind(creator_id)
        .fetch_all(self.pool)
        .await?;

        Ok(forms)
    }

    /// Hard delete. Responses cascade.
    pub async fn delete(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM forms WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Earliest form of a template, created on demand for the template owner.
    ///
    /// The insert is a single guarded statement, so concurrent callers never
    /// create a second default form and never upgrade a read lock.
    pub async fn get_or_create_for_template(&self, template_id: i64) -> Result<Form, DbError> {
        let now = chrono::Utc::now().timestamp();
        let created = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO forms (template_id, creator_id, name, description, is_public,
                               created_at, updated_at)
            SELECT id, created_by_id, title, description, is_public, ?1, ?1
            FROM templates
            WHERE id = ?2
              AND NOT EXISTS (SELECT 1 FROM forms WHERE template_id = ?2)
            RETURNING id
            "#,
        )
        .bind(now)
        .bind(template_id)
        .fetch_optional(self.pool)
        .await?;

        if let Some(form_id) = created {
            tracing::info!(template_id, form_id, "Created default form");
        }

        let id = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM forms WHERE template_id = ? ORDER BY created_at, id LIMIT 1",
        )
        .bind(template_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("template {}", template_id)))?;

        self.find(id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("form {}", id)))
    }
}
