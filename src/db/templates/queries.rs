//! Template queries.

use super::models::{AccessInfo, Question, QuestionDraft, Template, TemplateDraft, TemplateSummary};
use crate::db::DbError;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::HashSet;

/// Shared listing projection; callers append `WHERE`/`ORDER BY`.
pub(crate) const SUMMARY_SELECT: &str = r#"
    SELECT t.id, t.title, t.description, t.image_url, t.topic, t.created_by_id,
           COALESCE(u.display_name, '') AS author_name,
           t.created_at, t.updated_at, t.is_public, t.is_deleted,
           (SELECT COUNT(*) FROM likes l WHERE l.template_id = t.id) AS like_count,
           (SELECT COUNT(*) FROM form_responses r WHERE r.template_id = t.id) AS response_count
    FROM templates t
    LEFT JOIN users u ON u.id = t.created_by_id
"#;

type QuestionRow = (i64, i64, i64, String, Option<String>, String, bool, Option<String>);

fn question_from_row(row: QuestionRow) -> Result<Question, DbError> {
    let (id, template_id, position, text, description, question_type, is_required, options) = row;
    let question_type = question_type.parse().map_err(DbError::Internal)?;
    let options = match options {
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| DbError::Internal(format!("question {} options: {}", id, e)))?,
        None => Vec::new(),
    };
    Ok(Question {
        id,
        template_id,
        position,
        text,
        description,
        question_type,
        is_required,
        options,
    })
}

fn options_json(question: &QuestionDraft) -> Result<Option<String>, DbError> {
    let options = question.clean_options();
    if options.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(&options)
        .map(Some)
        .map_err(|e| DbError::Internal(e.to_string()))
}

/// Repository for template operations.
pub struct TemplateRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TemplateRepository<'a> {
    /// Create a new template repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a template with its questions, tags and access list.
    pub async fn create(&self, owner_id: &str, draft: &TemplateDraft) -> Result<i64, DbError> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO templates (title, description, image_url, topic, created_by_id,
                                   created_at, updated_at, is_public)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(draft.title.trim())
        .bind(draft.description.trim())
        .bind(draft.image_url.as_deref())
        .bind(draft.topic.as_deref())
        .bind(owner_id)
        .bind(now)
        .bind(now)
        .bind(draft.is_public)
        .fetch_one(&mut *tx)
        .await?;

        write_children(&mut tx, id, draft).await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Overwrite a template and reconcile its questions, tags and access list.
    pub async fn update(&self, id: i64, draft: &TemplateDraft) -> Result<(), DbError> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE templates
            SET title = ?, description = ?, image_url = ?, topic = ?, is_public = ?, updated_at = ?
            WHERE id = ? AND is_deleted = 0
            "#,
        )
        .bind(draft.title.trim())
        .bind(draft.description.trim())
        .bind(draft.image_url.as_deref())
        .bind(draft.topic.as_deref())
        .bind(draft.is_public)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("template {}", id)));
        }

        write_children(&mut tx, id, draft).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Load a full template. Soft-deleted templates only with `include_deleted`.
    pub async fn find(&self, id: i64, include_deleted: bool) -> Result<Option<Template>, DbError> {
        let summary = sqlx::query_as::<_, TemplateSummary>(&format!(
            "{SUMMARY_SELECT} WHERE t.id = ?1 AND (?2 OR t.is_deleted = 0)"
        ))
        .bind(id)
        .bind(include_deleted)
        .fetch_optional(self.pool)
        .await?;

        let Some(summary) = summary else {
            return Ok(None);
        };

        let tags = self.tags(id).await?;
        let questions = self.questions(id).await?;
        let allowed_users = sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM template_access WHERE template_id = ? ORDER BY user_id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(Template {
            summary,
            tags,
            questions,
            allowed_users,
        }))
    }

    /// Questions of a template in display order.
    pub async fn questions(&self, template_id: i64) -> Result<Vec<Question>, DbError> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, template_id, position, text, description, question_type, is_required, options
            FROM questions
            WHERE template_id = ?
            ORDER BY position, id
            "#,
        )
        .bind(template_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(question_from_row).collect()
    }

    /// Tag names of a template, alphabetical.
    pub async fn tags(&self, template_id: i64) -> Result<Vec<String>, DbError> {
        let tags = sqlx::query_scalar::<_, String>(
            r#"
            SELECT g.name FROM tags g
            JOIN template_tags tt ON tt.tag_id = g.id
            WHERE tt.template_id = ?
            ORDER BY g.name
            "#,
        )
        .bind(template_id)
        .fetch_all(self.pool)
        .await?;

        Ok(tags)
    }

    /// Owner and visibility flags, including soft-deleted templates.
    pub async fn access_info(&self, id: i64) -> Result<Option<AccessInfo>, DbError> {
        let row = sqlx::query_as::<_, (String, bool, bool)>(
            "SELECT created_by_id, is_public, is_deleted FROM templates WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(owner_id, is_public, is_deleted)| AccessInfo {
            owner_id,
            is_public,
            is_deleted,
        }))
    }

    /// Whether `user_id` is on the template's access list.
    pub async fn has_access(&self, template_id: i64, user_id: &str) -> Result<bool, DbError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM template_access WHERE template_id = ? AND user_id = ?",
        )
        .bind(template_id)
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Owner's non-deleted templates, most recently updated first.
    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<TemplateSummary>, DbError> {
        let templates = sqlx::query_as::<_, TemplateSummary>(&format!(
            "{SUMMARY_SELECT} WHERE t.created_by_id = ? AND t.is_deleted = 0 \
             ORDER BY t.updated_at DESC, t.id DESC"
        ))
        .bind(owner_id)
        .fetch_all(self.pool)
        .await?;

        Ok(templates)
    }

    /// Newest public templates.
    pub async fn latest_public(&self, limit: i64) -> Result<Vec<TemplateSummary>, DbError> {
        let templates = sqlx::query_as::<_, TemplateSummary>(&format!(
            "{SUMMARY_SELECT} WHERE t.is_public = 1 AND t.is_deleted = 0 \
             ORDER BY t.created_at DESC, t.id DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(templates)
    }

    /// Public templates ranked by likes, then responses, then recency.
    pub async fn popular_public(&self, limit: i64) -> Result<Vec<TemplateSummary>, DbError> {
        let templates = sqlx::query_as::<_, TemplateSummary>(&format!(
            "{SUMMARY_SELECT} WHERE t.is_public = 1 AND t.is_deleted = 0 \
             ORDER BY like_count DESC, response_count DESC, t.created_at DESC, t.id DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(templates)
    }

    /// Set or clear the soft-delete flag.
    ///
    /// Returns `None` when the template doesn't exist, otherwise whether the flag changed.
    pub async fn set_deleted(&self, id: i64, deleted: bool) -> Result<Option<bool>, DbError> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            UPDATE templates
            SET is_deleted = ?1, deleted_at = CASE WHEN ?1 THEN ?2 ELSE NULL END
            WHERE id = ?3 AND is_deleted != ?1
            "#,
        )
        .bind(deleted)
        .bind(now)
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(Some(true));
        }

        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM templates WHERE id = ?")
            .bind(id)
            .fetch_one(self.pool)
            .await?
            > 0;

        Ok(exists.then_some(false))
    }

    /// Remove questions sharing a position, keeping the highest id of each group.
    pub async fn cleanup_duplicate_questions(&self, template_id: i64) -> Result<u64, DbError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            DELETE FROM questions
            WHERE template_id = ?1
              AND id NOT IN (
                  SELECT MAX(id) FROM questions WHERE template_id = ?1 GROUP BY position
              )
            "#,
        )
        .bind(template_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            refresh_search_text(&mut tx, template_id).await?;
        }

        tx.commit().await?;
        Ok(result.rows_affected())
    }
}

/// Write questions, tags and the access list for `template_id`.
async fn write_children(
    tx: &mut Transaction<'_, Sqlite>,
    template_id: i64,
    draft: &TemplateDraft,
) -> Result<(), DbError> {
    sync_questions(tx, template_id, &draft.questions).await?;
    replace_tags(tx, template_id, &draft.normalized_tags()).await?;
    if let Some(users) = &draft.allowed_users {
        replace_access(tx, template_id, users).await?;
    }
    refresh_search_text(tx, template_id).await
}

/// Rebuild the lowercased search column from the stored title, description
/// and question text. SQLite's own case folding only covers ASCII.
async fn refresh_search_text(
    tx: &mut Transaction<'_, Sqlite>,
    template_id: i64,
) -> Result<(), DbError> {
    let (title, description) = sqlx::query_as::<_, (String, String)>(
        "SELECT title, description FROM templates WHERE id = ?",
    )
    .bind(template_id)
    .fetch_one(&mut **tx)
    .await?;

    let questions = sqlx::query_scalar::<_, String>(
        "SELECT text FROM questions WHERE template_id = ? ORDER BY position, id",
    )
    .bind(template_id)
    .fetch_all(&mut **tx)
    .await?;

    let mut parts = vec![title, description];
    parts.extend(questions);
    let search_text = parts.join("\n").to_lowercase();

    sqlx::query("UPDATE templates SET search_text = ? WHERE id = ?")
        .bind(search_text)
        .bind(template_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Upsert questions by id, delete the ones no longer present, renumber positions.
async fn sync_questions(
    tx: &mut Transaction<'_, Sqlite>,
    template_id: i64,
    drafts: &[QuestionDraft],
) -> Result<(), DbError> {
    let existing: HashSet<i64> =
        sqlx::query_scalar::<_, i64>("SELECT id FROM questions WHERE template_id = ?")
            .bind(template_id)
            .fetch_all(&mut **tx)
            .await?
            .into_iter()
            .collect();

    let kept: HashSet<i64> = drafts.iter().filter_map(|q| q.id).collect();
    if let Some(foreign) = kept.iter().find(|id| !existing.contains(id)) {
        return Err(DbError::NotFound(format!(
            "question {} in template {}",
            foreign, template_id
        )));
    }

    for stale in existing.difference(&kept) {
        sqlx::query("DELETE FROM questions WHERE id = ?")
            .bind(stale)
            .execute(&mut **tx)
            .await?;
    }

    for (position, question) in drafts.iter().enumerate() {
        let position = position as i64;
        let options = options_json(question)?;
        let description = question
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());

        match question.id {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE questions
                    SET position = ?, text = ?, description = ?, question_type = ?,
                        is_required = ?, options = ?
                    WHERE id = ?
                    "#,
                )
                .bind(position)
                .bind(question.text.trim())
                .bind(description)
                .bind(question.question_type.as_str())
                .bind(question.is_required)
                .bind(&options)
                .bind(id)
                .execute(&mut **tx)
                .await?;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO questions (template_id, position, text, description,
                                           question_type, is_required, options)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(template_id)
                .bind(position)
                .bind(question.text.trim())
                .bind(description)
                .bind(question.question_type.as_str())
                .bind(question.is_required)
                .bind(&options)
                .execute(&mut **tx)
                .await?;
            }
        }
    }

    Ok(())
}

async fn replace_tags(
    tx: &mut Transaction<'_, Sqlite>,
    template_id: i64,
    tags: &[String],
) -> Result<(), DbError> {
    sqlx::query("DELETE FROM template_tags WHERE template_id = ?")
        .bind(template_id)
        .execute(&mut **tx)
        .await?;

    for tag in tags {
        sqlx::query("INSERT OR IGNORE INTO tags (name) VALUES (?)")
            .bind(tag)
            .execute(&mut **tx)
            .await?;

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO template_tags (template_id, tag_id)
            SELECT ?, id FROM tags WHERE name = ?
            "#,
        )
        .bind(template_id)
        .bind(tag)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

/// Replace the access list. Unknown user ids are skipped.
async fn replace_access(
    tx: &mut Transaction<'_, Sqlite>,
    template_id: i64,
    users: &[String],
) -> Result<(), DbError> {
    sqlx::query("DELETE FROM template_access WHERE template_id = ?")
        .bind(template_id)
        .execute(&mut **tx)
        .await?;

    for user_id in users {
        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO template_access (template_id, user_id)
            SELECT ?, id FROM users WHERE id = ?
            "#,
        )
        .bind(template_id)
        .bind(user_id.trim())
        .execute(&mut **tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tracing::debug!(
                template_id,
                user_id = %user_id,
                "Skipping access entry for unknown user"
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::db::templates::models::{QuestionDraft, QuestionType, TemplateDraft};
    use crate::db::{Database, UserProfile};

    async fn setup() -> Database {
        let db = Database::new(":memory:").await.unwrap();
        for id in ["owner", "friend"] {
            let profile = UserProfile {
                id: id.into(),
                ..Default::default()
            };
            db.users().upsert_profile(&profile, true, false).await.unwrap();
        }
        db
    }

    fn question(id: Option<i64>, text: &str) -> QuestionDraft {
        QuestionDraft {
            id,
            text: text.into(),
            description: None,
            question_type: QuestionType::SingleLineText,
            is_required: false,
            options: vec![],
        }
    }

    fn draft(questions: Vec<QuestionDraft>) -> TemplateDraft {
        TemplateDraft {
            title: "Team survey".into(),
            description: "Quarterly".into(),
            image_url: None,
            topic: None,
            is_public: true,
            tags: vec!["Work".into(), "team".into()],
            questions,
            allowed_users: Some(vec!["friend".into(), "ghost".into()]),
        }
    }

    #[tokio::test]
    async fn create_and_find() {
        let db = setup().await;
        let repo = db.templates();
        let id = repo
            .create("owner", &draft(vec![question(None, "A"), question(None, "B")]))
            .await
            .unwrap();

        let t = repo.find(id, false).await.unwrap().unwrap();
        assert_eq!(t.summary.title, "Team survey");
        assert_eq!(t.tags, vec!["team".to_string(), "work".to_string()]);
        assert_eq!(t.allowed_users, vec!["friend".to_string()]);
        let texts: Vec<_> = t.questions.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B"]);
        assert_eq!(t.questions[1].position, 1);
        assert!(repo.has_access(id, "friend").await.unwrap());
    }

    #[tokio::test]
    async fn update_reconciles_questions() {
        let db = setup().await;
        let repo = db.templates();
        let id = repo
            .create("owner", &draft(vec![question(None, "A"), question(None, "B")]))
            .await
            .unwrap();
        let before = repo.questions(id).await.unwrap();

        // Keep B (moved first), drop A, add C.
        let mut d = draft(vec![question(Some(before[1].id), "B2"), question(None, "C")]);
        d.tags = vec!["new".into()];
        d.allowed_users = None;
        repo.update(id, &d).await.unwrap();

        let after = repo.find(id, false).await.unwrap().unwrap();
        assert_eq!(after.questions.len(), 2);
        assert_eq!(after.questions[0].id, before[1].id);
        assert_eq!(after.questions[0].text, "B2");
        assert_eq!(after.questions[0].position, 0);
        assert_eq!(after.questions[1].text, "C");
        assert_eq!(after.tags, vec!["new".to_string()]);
        assert_eq!(after.allowed_users, vec!["friend".to_string()]);
    }

    #[tokio::test]
    async fn update_rejects_foreign_question_ids() {
        let db = setup().await;
        let repo = db.templates();
        let a = repo.create("owner", &draft(vec![question(None, "A")])).await.unwrap();
        let b = repo.create("owner", &draft(vec![question(None, "B")])).await.unwrap();
        let foreign = repo.questions(b).await.unwrap()[0].id;

        let err = repo
            .update(a, &draft(vec![question(Some(foreign), "stolen")]))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::db::DbError::NotFound(_)));
        // Transaction rolled back: template B still owns its question.
        assert_eq!(repo.questions(b).await.unwrap()[0].text, "B");
        assert_eq!(repo.questions(a).await.unwrap()[0].text, "A");
    }

    #[tokio::test]
    async fn soft_delete_hides_template() {
        let db = setup().await;
        let repo = db.templates();
        let id = repo.create("owner", &draft(vec![])).await.unwrap();

        assert_eq!(repo.set_deleted(id, true).await.unwrap(), Some(true));
        assert_eq!(repo.set_deleted(id, true).await.unwrap(), Some(false));
        assert!(repo.find(id, false).await.unwrap().is_none());
        assert!(repo.find(id, true).await.unwrap().is_some());
        assert!(repo.latest_public(10).await.unwrap().is_empty());
        assert!(repo.list_by_owner("owner").await.unwrap().is_empty());

        assert_eq!(repo.set_deleted(id, false).await.unwrap(), Some(true));
        assert_eq!(repo.latest_public(10).await.unwrap().len(), 1);
        assert_eq!(repo.set_deleted(9999, true).await.unwrap(), None);
    }

    #[tokio::test]
    async fn cleanup_keeps_highest_id_per_position() {
        let db = setup().await;
        let repo = db.templates();
        let id = repo.create("owner", &draft(vec![question(None, "A")])).await.unwrap();

        sqlx::query(
            "INSERT INTO questions (template_id, position, text, question_type)
             VALUES (?, 0, 'dup', 'number')",
        )
        .bind(id)
        .execute(db.pool())
        .await
        .unwrap();

        assert_eq!(repo.cleanup_duplicate_questions(id).await.unwrap(), 1);
        let questions = repo.questions(id).await.unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].text, "dup");
        assert_eq!(repo.cleanup_duplicate_questions(id).await.unwrap(), 0);
    }
}
