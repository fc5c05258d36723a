//! Admin-wide counts and listings.

use super::templates::SUMMARY_SELECT;
use super::{DbError, Page, PageRequest, TemplateSummary, like_pattern};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

/// Row counts across the main tables.
#[derive(Debug, Clone, Copy, Default, Serialize, FromRow)]
pub struct AdminStats {
    pub users: i64,
    pub templates: i64,
    pub deleted_templates: i64,
    pub forms: i64,
    pub responses: i64,
}

/// Repository for admin operations.
pub struct AdminRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AdminRepository<'a> {
    /// Create a new admin repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Count users, templates (deleted included), forms and responses.
    pub async fn stats(&self) -> Result<AdminStats, DbError> {
        let stats = sqlx::query_as::<_, AdminStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS users,
                (SELECT COUNT(*) FROM templates) AS templates,
                (SELECT COUNT(*) FROM templates WHERE is_deleted = 1) AS deleted_templates,
                (SELECT COUNT(*) FROM forms) AS forms,
                (SELECT COUNT(*) FROM form_responses) AS responses
            "#,
        )
        .fetch_one(self.pool)
        .await?;

        Ok(stats)
    }

    /// Page through templates, most recently updated first.
    pub async fn templates(
        &self,
        include_deleted: bool,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<TemplateSummary>, DbError> {
        let pattern = search
            .filter(|s| !s.trim().is_empty())
            .map(like_pattern);

        const FILTER: &str = r#"
            (?1 OR t.is_deleted = 0)
            AND (?2 IS NULL OR t.title LIKE ?2 ESCAPE '\' OR t.description LIKE ?2 ESCAPE '\')
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM templates t WHERE {FILTER}"
        ))
        .bind(include_deleted)
        .bind(&pattern)
        .fetch_one(self.pool)
        .await?;

        let templates = sqlx::query_as::<_, TemplateSummary>(&format!(
            "{SUMMARY_SELECT} WHERE {FILTER}
             ORDER BY t.updated_at DESC, t.id DESC LIMIT ?3 OFFSET ?4"
        ))
        .bind(include_deleted)
        .bind(&pattern)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok(Page::new(templates, total, page))
    }
}
