//! Response repository.
//!
//! A response is one submission of a form; its answers hold one value per
//! question, normalized to text.

use super::{DbError, Page, PageRequest, is_unique_violation, like_pattern};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

/// A validated submission ready to be stored.
#[derive(Debug, Clone)]
pub struct NewResponse {
    pub form_id: i64,
    pub template_id: i64,
    pub respondent_id: String,
    pub submission_key: Option<String>,
    /// `(question_id, value)` pairs.
    pub answers: Vec<(i64, String)>,
}

/// Result of storing a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubmitOutcome {
    pub response_id: i64,
    /// True when an earlier submission with the same key was returned instead.
    pub duplicate: bool,
}

/// Listing row for a response.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ResponseSummary {
    pub id: i64,
    pub form_id: i64,
    pub template_id: i64,
    pub template_title: String,
    pub respondent_id: String,
    pub respondent_name: String,
    pub respondent_email: Option<String>,
    pub submitted_at: i64,
    pub answer_count: i64,
}

/// One stored answer with its question.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AnswerRecord {
    pub question_id: i64,
    pub position: i64,
    pub question_text: String,
    pub question_type: String,
    pub value: String,
}

/// A response with all of its answers.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseDetail {
    #[serde(flatten)]
    pub summary: ResponseSummary,
    pub answers: Vec<AnswerRecord>,
}

const RESPONSE_SELECT: &str = r#"
    SELECT r.id, r.form_id, r.template_id, t.title AS template_title, r.respondent_id,
           COALESCE(u.display_name, '') AS respondent_name, u.email AS respondent_email,
           r.submitted_at,
           (SELECT COUNT(*) FROM answers a WHERE a.response_id = r.id) AS answer_count
    FROM form_responses r
    JOIN templates t ON t.id = r.template_id
    LEFT JOIN users u ON u.id = r.respondent_id
"#;

/// Repository for response operations.
pub struct ResponseRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ResponseRepository<'a> {
    /// Create a new response repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a response and its answers in one transaction.
    ///
    /// A repeated `submission_key` from the same respondent on the same
    /// template returns the earlier response without writing anything.
    pub async fn insert(&self, response: &NewResponse) -> Result<SubmitOutcome, DbError> {
        if let Some(existing) = self.existing(response).await? {
            return Ok(SubmitOutcome {
                response_id: existing,
                duplicate: true,
            });
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO form_responses
                (form_id, template_id, respondent_id, submitted_at, submission_key)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(response.form_id)
        .bind(response.template_id)
        .bind(&response.respondent_id)
        .bind(now)
        .bind(response.submission_key.as_deref())
        .fetch_one(&mut *tx)
        .await;

        let response_id = match inserted {
            Ok(id) => id,
            Err(e) if is_unique_violation(&e) => {
                // Lost a race with a concurrent submission using the same key.
                drop(tx);
                let existing = self.existing(response).await?.ok_or_else(|| {
                    DbError::Conflict(format!(
                        "submission key for respondent {}",
                        response.respondent_id
                    ))
                })?;
                return Ok(SubmitOutcome {
                    response_id: existing,
                    duplicate: true,
                });
            }
            Err(e) => return Err(e.into()),
        };

        for (question_id, value) in &response.answers {
            sqlx::query("INSERT INTO answers (response_id, question_id, value) VALUES (?, ?, ?)")
                .bind(response_id)
                .bind(question_id)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(SubmitOutcome {
            response_id,
            duplicate: false,
        })
    }

    async fn existing(&self, response: &NewResponse) -> Result<Option<i64>, DbError> {
        match response.submission_key.as_deref() {
            Some(key) => {
                self.find_by_key(response.template_id, &response.respondent_id, key)
                    .await
            }
            None => Ok(None),
        }
    }

    /// Id of the respondent's earlier submission to a template under `key`.
    pub async fn find_by_key(
        &self,
        template_id: i64,
        respondent_id: &str,
        key: &str,
    ) -> Result<Option<i64>, DbError> {
        let id = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM form_responses
             WHERE template_id = ? AND respondent_id = ? AND submission_key = ?",
        )
        .bind(template_id)
        .bind(respondent_id)
        .bind(key)
        .fetch_optional(self.pool)
        .await?;

        Ok(id)
    }

    /// Load a response with its answers in question order.
    pub async fn find(&self, id: i64) -> Result<Option<ResponseDetail>, DbError> {
        let summary = sqlx::query_as::<_, ResponseSummary>(&format!(
            "{RESPONSE_SELECT} WHERE r.id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let Some(summary) = summary else {
            return Ok(None);
        };

        let answers = sqlx::query_as::<_, AnswerRecord>(
            r#"
            SELECT a.question_id, q.position, q.text AS question_text, q.question_type, a.value
            FROM answers a
            JOIN questions q ON q.id = a.question_id
            WHERE a.response_id = ?
            ORDER BY q.position, q.id
            "#,
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(ResponseDetail { summary, answers }))
    }

    /// Responses to a template, newest first.
    pub async fn list_for_template(
        &self,
        template_id: i64,
    ) -> Result<Vec<ResponseSummary>, DbError> {
        let responses = sqlx::query_as::<_, ResponseSummary>(&format!(
            "{RESPONSE_SELECT} WHERE r.template_id = ? ORDER BY r.submitted_at DESC, r.id DESC"
        ))
        .bind(template_id)
        .fetch_all(self.pool)
        .await?;

        Ok(responses)
    }

    /// A user's own submissions, newest first.
    pub async fn list_for_user(
        &self,
        respondent_id: &str,
    ) -> Result<Vec<ResponseSummary>, DbError> {
        let responses = sqlx::query_as::<_, ResponseSummary>(&format!(
            "{RESPONSE_SELECT} WHERE r.respondent_id = ? ORDER BY r.submitted_at DESC, r.id DESC"
        ))
        .bind(respondent_id)
        .fetch_all(self.pool)
        .await?;

        Ok(responses)
    }

    /// Page through all responses, optionally filtered by respondent email or username.
    pub async fn list_all(
        &self,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<ResponseSummary>, DbError> {
        let pattern = search
            .filter(|s| !s.trim().is_empty())
            .map(like_pattern);

        const FILTER: &str = r#"
            (?1 IS NULL OR u.email LIKE ?1 ESCAPE '\' OR u.username LIKE ?1 ESCAPE '\')
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            r#"
            SELECT COUNT(*) FROM form_responses r
            LEFT JOIN users u ON u.id = r.respondent_id
            WHERE {FILTER}
            "#
        ))
        .bind(&pattern)
        .fetch_one(self.pool)
        .await?;

        let responses = sqlx::query_as::<_, ResponseSummary>(&format!(
            "{RESPONSE_SELECT} WHERE {FILTER}
             ORDER BY r.submitted_at DESC, r.id DESC LIMIT ?2 OFFSET ?3"
        ))
        .bind(&pattern)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok(Page::new(responses, total, page))
    }

    /// Hard delete; answers cascade.
    pub async fn delete(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM form_responses WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Every answer given to a template's questions, newest first.
    ///
    /// Returns `(question_id, value)` pairs for aggregation.
    pub async fn answers_for_template(
        &self,
        template_id: i64,
    ) -> Result<Vec<(i64, String)>, DbError> {
        let rows = sqlx::query_as::<_, (i64, String)>(
            r#"
            SELECT a.question_id, a.value
            FROM answers a
            JOIN form_responses r ON r.id = a.response_id
            WHERE r.template_id = ?
            ORDER BY r.submitted_at DESC, r.id DESC
            "#,
        )
        .bind(template_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::NewResponse;
    use crate::db::{Database, PageRequest, QuestionDraft, QuestionType, TemplateDraft, UserProfile};

    async fn setup() -> (Database, i64, i64, Vec<i64>) {
        let db = Database::new(":memory:").await.unwrap();
        for (id, email) in [("owner", "owner@example.com"), ("resp", "resp@example.com")] {
            let profile = UserProfile {
                id: id.into(),
                email: Some(email.into()),
                username: Some(format!("{}_user", id)),
                ..Default::default()
            };
            db.users().upsert_profile(&profile, true, false).await.unwrap();
        }
        let q = |text: &str| QuestionDraft {
            id: None,
            text: text.into(),
            description: None,
            question_type: QuestionType::SingleLineText,
            is_required: false,
            options: vec![],
        };
        let draft = TemplateDraft {
            title: "Feedback".into(),
            description: String::new(),
            image_url: None,
            topic: None,
            is_public: true,
            tags: vec![],
            questions: vec![q("Name"), q("Comment")],
            allowed_users: None,
        };
        let template_id = db.templates().create("owner", &draft).await.unwrap();
        let form = db.forms().get_or_create_for_template(template_id).await.unwrap();
        let questions = db
            .templates()
            .questions(template_id)
            .await
            .unwrap()
            .into_iter()
            .map(|q| q.id)
            .collect();
        (db, template_id, form.id, questions)
    }

    fn submission(
        template_id: i64,
        form_id: i64,
        questions: &[i64],
        key: Option<&str>,
    ) -> NewResponse {
        NewResponse {
            form_id,
            template_id,
            respondent_id: "resp".into(),
            submission_key: key.map(String::from),
            answers: vec![(questions[0], "Ann".into()), (questions[1], "Great".into())],
        }
    }

    #[tokio::test]
    async fn insert_and_find() {
        let (db, template_id, form_id, questions) = setup().await;
        let outcome = db
            .responses()
            .insert(&submission(template_id, form_id, &questions, None))
            .await
            .unwrap();
        assert!(!outcome.duplicate);

        let detail = db.responses().find(outcome.response_id).await.unwrap().unwrap();
        assert_eq!(detail.summary.template_title, "Feedback");
        assert_eq!(detail.summary.answer_count, 2);
        assert_eq!(detail.answers[0].question_text, "Name");
        assert_eq!(detail.answers[1].value, "Great");
    }

    #[tokio::test]
    async fn same_key_returns_existing_response() {
        let (db, template_id, form_id, questions) = setup().await;
        let first = db
            .responses()
            .insert(&submission(template_id, form_id, &questions, Some("abc")))
            .await
            .unwrap();
        let second = db
            .responses()
            .insert(&submission(template_id, form_id, &questions, Some("abc")))
            .await
            .unwrap();

        assert!(second.duplicate);
        assert_eq!(first.response_id, second.response_id);
        assert_eq!(db.responses().list_for_template(template_id).await.unwrap().len(), 1);

        // Submissions without a key are never deduplicated.
        db.responses()
            .insert(&submission(template_id, form_id, &questions, None))
            .await
            .unwrap();
        db.responses()
            .insert(&submission(template_id, form_id, &questions, None))
            .await
            .unwrap();
        assert_eq!(db.responses().list_for_user("resp").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn paged_listing_and_delete() {
        let (db, template_id, form_id, questions) = setup().await;
        for _ in 0..3 {
            db.responses()
                .insert(&submission(template_id, form_id, &questions, None))
                .await
                .unwrap();
        }

        let page = db
            .responses()
            .list_all(Some("resp@"), PageRequest::new(1, 2))
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);

        let none = db
            .responses()
            .list_all(Some("nobody"), PageRequest::new(1, 2))
            .await
            .unwrap();
        assert_eq!(none.total, 0);

        let id = page.items[0].id;
        assert!(db.responses().delete(id).await.unwrap());
        assert!(db.responses().find(id).await.unwrap().is_none());
        assert_eq!(db.responses().answers_for_template(template_id).await.unwrap().len(), 4);
    }
}
