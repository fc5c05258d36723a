//! Template search and tag queries.

use super::templates::SUMMARY_SELECT;
use super::{DbError, TemplateSummary, like_pattern};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

/// A tag and the number of public templates carrying it.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TagCount {
    pub name: String,
    pub count: i64,
}

/// Repository for search operations.
pub struct SearchRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SearchRepository<'a> {
    /// Create a new search repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Case-insensitive substring search over titles, descriptions, tags and
    /// question text. Only public templates and those owned by `viewer_id`.
    ///
    /// The term is lowercased here and matched against the lowercased
    /// `search_text` column and the (already lowercase) tag names.
    pub async fn search(
        &self,
        term: &str,
        viewer_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<TemplateSummary>, DbError> {
        let pattern = like_pattern(&term.to_lowercase());

        let templates = sqlx::query_as::<_, TemplateSummary>(&format!(
            r#"
            {SUMMARY_SELECT}
            WHERE t.is_deleted = 0
              AND (t.is_public = 1 OR t.created_by_id = ?2)
              AND (t.search_text LIKE ?1 ESCAPE '\'
                   OR EXISTS (SELECT 1 FROM template_tags tt JOIN tags g ON g.id = tt.tag_id
                              WHERE tt.template_id = t.id AND g.name LIKE ?1 ESCAPE '\'))
            ORDER BY t.created_at DESC, t.id DESC
            LIMIT ?3
            "#
        ))
        .bind(&pattern)
        .bind(viewer_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(templates)
    }

    /// Public templates carrying a tag, newest first.
    pub async fn by_tag(&self, tag: &str, limit: i64) -> Result<Vec<TemplateSummary>, DbError> {
        let templates = sqlx::query_as::<_, TemplateSummary>(&format!(
            r#"
            {SUMMARY_SELECT}
            JOIN template_tags tt ON tt.template_id = t.id
            JOIN tags g ON g.id = tt.tag_id
            WHERE g.name = ? AND t.is_public = 1 AND t.is_deleted = 0
            ORDER BY t.created_at DESC, t.id DESC
            LIMIT ?
            "#
        ))
        .bind(tag.trim())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(templates)
    }

    /// Tags in use by public templates, most used first.
    pub async fn tag_cloud(&self) -> Result<Vec<TagCount>, DbError> {
        let tags = sqlx::query_as::<_, TagCount>(
            r#"
            SELECT g.name, COUNT(*) AS count
            FROM tags g
            JOIN template_tags tt ON tt.tag_id = g.id
            JOIN templates t ON t.id = tt.template_id
            WHERE t.is_public = 1 AND t.is_deleted = 0
            GROUP BY g.id, g.name
            ORDER BY count DESC, g.name
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(tags)
    }
}
