//! Response service: typed answer validation and idempotent submission.

use super::base::{Actor, ServiceBase};
use crate::db::retry::RetryPolicy;
use crate::db::{
    Database, NewResponse, Question, QuestionType, ResponseDetail, ResponseSummary, SubmitOutcome,
};
use crate::error::{AppError, AppResult};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::info;

const MAX_KEY_LEN: usize = 100;
const MAX_SHORT_TEXT_LEN: usize = 500;
const MAX_LONG_TEXT_LEN: usize = 10_000;

/// A submitted answer value before normalization.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnswerInput {
    pub question_id: i64,
    pub value: AnswerValue,
}

/// Incoming submission payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Submission {
    /// Client-chosen idempotency token.
    #[serde(default)]
    pub submission_key: Option<String>,
    #[serde(default)]
    pub answers: Vec<AnswerInput>,
}

fn is_email(s: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(s))
}

/// Validate and normalize one answer into its stored text form.
///
/// Returns `Ok(None)` for blank answers.
pub fn normalize_answer(
    question: &Question,
    value: &AnswerValue,
) -> Result<Option<String>, String> {
    let text = match value {
        AnswerValue::Text(s) => Some(s.trim()),
        _ => None,
    };
    if text == Some("") {
        return Ok(None);
    }

    let mismatch = || format!("unexpected value type for question \"{}\"", question.text);

    match (question.question_type, value) {
        (QuestionType::SingleLineText, AnswerValue::Text(s)) => {
            let s = s.trim();
            if s.contains('\n') || s.chars().count() > MAX_SHORT_TEXT_LEN {
                return Err(format!("\"{}\" expects a single short line", question.text));
            }
            Ok(Some(s.to_string()))
        }
        (QuestionType::MultiLineText, AnswerValue::Text(s)) => {
            if s.chars().count() > MAX_LONG_TEXT_LEN {
                return Err(format!("\"{}\" answer is too long", question.text));
            }
            Ok(Some(s.trim().to_string()))
        }
        (QuestionType::Number, AnswerValue::Number(n)) => format_number(*n)
            .map(Some)
            .ok_or_else(|| format!("\"{}\" expects a number", question.text)),
        (QuestionType::Number, AnswerValue::Text(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(format_number)
            .map(Some)
            .ok_or_else(|| format!("\"{}\" expects a number", question.text)),
        (QuestionType::Email, AnswerValue::Text(s)) => {
            let s = s.trim();
            if is_email(s) {
                Ok(Some(s.to_string()))
            } else {
                Err(format!("\"{}\" expects an email address", question.text))
            }
        }
        (QuestionType::Date, AnswerValue::Text(s)) => {
            chrono::NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(|d| Some(d.format("%Y-%m-%d").to_string()))
                .map_err(|_| format!("\"{}\" expects a date as YYYY-MM-DD", question.text))
        }
        (QuestionType::Scale, AnswerValue::Number(n)) => scale(*n, question),
        (QuestionType::Scale, AnswerValue::Text(s)) => match s.trim().parse::<f64>() {
            Ok(n) => scale(n, question),
            Err(_) => Err(format!("\"{}\" expects a rating from 1 to 5", question.text)),
        },
        (QuestionType::MultipleChoice | QuestionType::Dropdown, AnswerValue::Text(s)) => {
            let s = s.trim();
            if question.options.iter().any(|o| o == s) {
                Ok(Some(s.to_string()))
            } else {
                Err(format!("\"{}\" is not an option of \"{}\"", s, question.text))
            }
        }
        (QuestionType::Checkbox, AnswerValue::Bool(b)) if question.options.is_empty() => {
            Ok(Some(b.to_string()))
        }
        (QuestionType::Checkbox, AnswerValue::Text(s)) if question.options.is_empty() => {
            match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" => Ok(Some("true".into())),
                "false" | "no" | "off" => Ok(Some("false".into())),
                _ => Err(mismatch()),
            }
        }
        (QuestionType::Checkbox, AnswerValue::Many(values)) if !question.options.is_empty() => {
            checked_options(question, values.iter().map(|v| v.trim()))
        }
        (QuestionType::Checkbox, AnswerValue::Text(s)) if !question.options.is_empty() => {
            checked_options(question, std::iter::once(s.trim()))
        }
        _ => Err(mismatch()),
    }
}

fn format_number(n: f64) -> Option<String> {
    if !n.is_finite() {
        return None;
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        Some(format!("{}", n as i64))
    } else {
        Some(n.to_string())
    }
}

fn scale(n: f64, question: &Question) -> Result<Option<String>, String> {
    if n.fract() == 0.0 && (1.0..=5.0).contains(&n) {
        Ok(Some((n as i64).to_string()))
    } else {
        Err(format!("\"{}\" expects a rating from 1 to 5", question.text))
    }
}

fn checked_options<'v>(
    question: &Question,
    values: impl Iterator<Item = &'v str>,
) -> Result<Option<String>, String> {
    let mut seen = HashSet::new();
    let mut checked = Vec::new();
    for value in values.filter(|v| !v.is_empty()) {
        if !question.options.iter().any(|o| o == value) {
            return Err(format!("\"{}\" is not an option of \"{}\"", value, question.text));
        }
        if seen.insert(value) {
            checked.push(value.to_string());
        }
    }
    if checked.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(&checked)
        .map(Some)
        .map_err(|e| e.to_string())
}

/// Check a whole submission against a template's questions.
///
/// Returns the `(question_id, value)` pairs to store.
pub fn validate_answers(
    questions: &[Question],
    answers: &[AnswerInput],
) -> Result<Vec<(i64, String)>, String> {
    let mut seen = HashSet::new();
    let mut stored = Vec::with_capacity(answers.len());

    for answer in answers {
        let question = questions
            .iter()
            .find(|q| q.id == answer.question_id)
            .ok_or_else(|| {
                format!("question {} does not belong to this template", answer.question_id)
            })?;
        if !seen.insert(answer.question_id) {
            return Err(format!("question {} answered more than once", answer.question_id));
        }
        if let Some(value) = normalize_answer(question, &answer.value)? {
            stored.push((question.id, value));
        }
    }

    if let Some(missing) = questions
        .iter()
        .find(|q| q.is_required && !stored.iter().any(|(id, _)| *id == q.id))
    {
        return Err(format!("\"{}\" is required", missing.text));
    }

    Ok(stored)
}

#[derive(Clone)]
pub struct ResponseService {
    db: Database,
    retry: RetryPolicy,
}

impl ServiceBase for ResponseService {
    fn db(&self) -> &Database {
        &self.db
    }
}

impl ResponseService {
    pub fn new(db: Database, retry: RetryPolicy) -> Self {
        Self { db, retry }
    }

    /// Validate and store a submission for a template the actor may fill.
    ///
    /// A key the actor already used on this template returns the stored
    /// response before any validation, so retries survive later edits.
    pub async fn submit(
        &self,
        actor: &Actor,
        template_id: i64,
        submission: &Submission,
    ) -> AppResult<SubmitOutcome> {
        let submission_key = match submission.submission_key.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(key) if key.chars().count() > MAX_KEY_LEN => {
                return Err(AppError::invalid("submission key is too long"));
            }
            Some(key) => Some(key.to_string()),
        };

        if let Some(key) = submission_key.as_deref()
            && let Some(response_id) = self
                .db
                .responses()
                .find_by_key(template_id, &actor.id, key)
                .await?
        {
            crate::metrics::record_submission(true);
            info!(template_id, response_id, user_id = %actor.id, "Duplicate submission");
            return Ok(SubmitOutcome {
                response_id,
                duplicate: true,
            });
        }

        let info = self.live_template(template_id).await?;
        self.ensure_visible(Some(actor), template_id, &info).await?;

        let questions = self.db.templates().questions(template_id).await?;
        let answers = validate_answers(&questions, &submission.answers)
            .map_err(AppError::InvalidInput)?;

        let key = submission_key.as_deref();
        let answers = &answers;
        let outcome = self
            .retry
            .run("submit_response", move || async move {
                let form = self.db.forms().get_or_create_for_template(template_id).await?;
                let response = NewResponse {
                    form_id: form.id,
                    template_id,
                    respondent_id: actor.id.clone(),
                    submission_key: key.map(String::from),
                    answers: answers.clone(),
                };
                self.db.responses().insert(&response).await
            })
            .await?;

        crate::metrics::record_submission(outcome.duplicate);
        info!(
            template_id,
            response_id = outcome.response_id,
            user_id = %actor.id,
            duplicate = outcome.duplicate,
            "Response submitted"
        );
        Ok(outcome)
    }

    /// A response, visible to its respondent, the template owner and admins.
    pub async fn get(&self, actor: &Actor, id: i64) -> AppResult<ResponseDetail> {
        let detail = self
            .db
            .responses()
            .find(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("response {}", id)))?;

        if detail.summary.respondent_id != actor.id {
            let owner = self
                .db
                .templates()
                .access_info(detail.summary.template_id)
                .await?
                .map(|info| info.owner_id)
                .unwrap_or_default();
            if !actor.can_manage(&owner) {
                return Err(AppError::forbidden("not allowed to view this response"));
            }
        }
        Ok(detail)
    }

    /// Responses to a template; owner or admin.
    pub async fn list_for_template(
        &self,
        actor: &Actor,
        template_id: i64,
    ) -> AppResult<Vec<ResponseSummary>> {
        let info = self.live_template(template_id).await?;
        self.ensure_manage(actor, &info, "view responses")?;
        Ok(self.db.responses().list_for_template(template_id).await?)
    }

    pub async fn list_mine(&self, actor: &Actor) -> AppResult<Vec<ResponseSummary>> {
        Ok(self.db.responses().list_for_user(&actor.id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{QuestionDraft, TemplateDraft, UserProfile};
    use std::time::Duration;

    fn q(id: i64, question_type: QuestionType, required: bool, options: &[&str]) -> Question {
        Question {
            id,
            template_id: 1,
            position: id,
            text: format!("q{}", id),
            description: None,
            question_type,
            is_required: required,
            options: options.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn text(s: &str) -> AnswerValue {
        AnswerValue::Text(s.into())
    }

    #[test]
    fn typed_values() {
        let number = q(1, QuestionType::Number, false, &[]);
        assert_eq!(normalize_answer(&number, &AnswerValue::Number(4.0)), Ok(Some("4".into())));
        assert_eq!(normalize_answer(&number, &text(" 2.5 ")), Ok(Some("2.5".into())));
        assert!(normalize_answer(&number, &text("many")).is_err());

        let email = q(2, QuestionType::Email, false, &[]);
        assert!(normalize_answer(&email, &text("a@b.co")).is_ok());
        assert!(normalize_answer(&email, &text("not-an-email")).is_err());

        let date = q(3, QuestionType::Date, false, &[]);
        assert_eq!(normalize_answer(&date, &text("2024-02-29")), Ok(Some("2024-02-29".into())));
        assert!(normalize_answer(&date, &text("2023-02-29")).is_err());
        assert!(normalize_answer(&date, &text("29/02/2024")).is_err());

        let scale = q(4, QuestionType::Scale, false, &[]);
        assert_eq!(normalize_answer(&scale, &AnswerValue::Number(5.0)), Ok(Some("5".into())));
        assert!(normalize_answer(&scale, &AnswerValue::Number(6.0)).is_err());
        assert!(normalize_answer(&scale, &text("2.5")).is_err());

        let line = q(5, QuestionType::SingleLineText, false, &[]);
        assert_eq!(normalize_answer(&line, &text("   ")), Ok(None));
        assert!(normalize_answer(&line, &text("two\nlines")).is_err());
        assert!(normalize_answer(&line, &AnswerValue::Bool(true)).is_err());
    }

    #[test]
    fn choice_values() {
        let choice = q(1, QuestionType::MultipleChoice, false, &["Red", "Blue"]);
        assert_eq!(normalize_answer(&choice, &text("Blue")), Ok(Some("Blue".into())));
        assert!(normalize_answer(&choice, &text("Green")).is_err());

        let yes_no = q(2, QuestionType::Checkbox, false, &[]);
        assert_eq!(normalize_answer(&yes_no, &AnswerValue::Bool(false)), Ok(Some("false".into())));
        assert!(normalize_answer(&yes_no, &AnswerValue::Many(vec!["x".into()])).is_err());

        let multi = q(3, QuestionType::Checkbox, false, &["A", "B"]);
        assert_eq!(
            normalize_answer(&multi, &AnswerValue::Many(vec!["B".into(), "A".into(), "B".into()])),
            Ok(Some(r#"["B","A"]"#.into()))
        );
        assert_eq!(normalize_answer(&multi, &AnswerValue::Many(vec![])), Ok(None));
        assert!(normalize_answer(&multi, &AnswerValue::Many(vec!["Z".into()])).is_err());
    }

    #[test]
    fn submission_rules() {
        let questions = vec![
            q(1, QuestionType::SingleLineText, true, &[]),
            q(2, QuestionType::Number, false, &[]),
        ];
        let answer = |id, value| AnswerInput { question_id: id, value };

        assert!(validate_answers(&questions, &[answer(1, text("hi"))]).is_ok());
        assert!(validate_answers(&questions, &[answer(2, text("3"))]).is_err());
        assert!(validate_answers(&questions, &[answer(1, text("  "))]).is_err());
        let twice = [answer(1, text("a")), answer(1, text("b"))];
        assert!(validate_answers(&questions, &twice).is_err());
        let foreign = [answer(1, text("a")), answer(99, text("b"))];
        assert!(validate_answers(&questions, &foreign).is_err());
    }

    #[test]
    fn answer_value_json_shapes() {
        let parse = |json: &str| serde_json::from_str::<AnswerValue>(json).unwrap();
        assert_eq!(parse("true"), AnswerValue::Bool(true));
        assert_eq!(parse("3"), AnswerValue::Number(3.0));
        assert_eq!(parse("\"x\""), text("x"));
        assert_eq!(parse("[\"a\"]"), AnswerValue::Many(vec!["a".into()]));
    }

    async fn setup() -> (ResponseService, i64, Vec<i64>) {
        let db = Database::new(":memory:").await.unwrap();
        for id in ["owner", "resp", "stranger"] {
            let profile = UserProfile {
                id: id.into(),
                ..Default::default()
            };
            db.users().upsert_profile(&profile, true, false).await.unwrap();
        }
        let draft = TemplateDraft {
            title: "Poll".into(),
            description: String::new(),
            image_url: None,
            topic: None,
            is_public: false,
            tags: vec![],
            questions: vec![QuestionDraft {
                id: None,
                text: "Rate us".into(),
                description: None,
                question_type: QuestionType::Scale,
                is_required: true,
                options: vec![],
            }],
            allowed_users: Some(vec!["resp".into()]),
        };
        let template_id = db.templates().create("owner", &draft).await.unwrap();
        let questions = db
            .templates()
            .questions(template_id)
            .await
            .unwrap()
            .iter()
            .map(|q| q.id)
            .collect();
        let svc = ResponseService::new(db, RetryPolicy::new(2, Duration::from_millis(1)));
        (svc, template_id, questions)
    }

    #[tokio::test]
    async fn submit_is_idempotent_per_key() {
        let (svc, template_id, questions) = setup().await;
        let resp = Actor::new("resp", false);
        let submission = Submission {
            submission_key: Some("k-1".into()),
            answers: vec![AnswerInput {
                question_id: questions[0],
                value: AnswerValue::Number(4.0),
            }],
        };

        let first = svc.submit(&resp, template_id, &submission).await.unwrap();
        let again = svc.submit(&resp, template_id, &submission).await.unwrap();
        assert!(!first.duplicate);
        assert!(again.duplicate);
        assert_eq!(first.response_id, again.response_id);

        let owner = Actor::new("owner", false);
        assert_eq!(svc.list_for_template(&owner, template_id).await.unwrap().len(), 1);
        assert_eq!(svc.list_mine(&resp).await.unwrap().len(), 1);

        let detail = svc.get(&owner, first.response_id).await.unwrap();
        assert_eq!(detail.answers[0].value, "4");
        assert!(matches!(
            svc.get(&Actor::new("stranger", false), first.response_id).await,
            Err(AppError::Forbidden(_))
        ));
    }

    fn keyed(key: &str, question_id: i64, rating: f64) -> Submission {
        Submission {
            submission_key: Some(key.into()),
            answers: vec![AnswerInput {
                question_id,
                value: AnswerValue::Number(rating),
            }],
        }
    }

    #[tokio::test]
    async fn submission_keys_are_scoped_to_the_template() {
        let (svc, first_template, first_questions) = setup().await;
        let draft = TemplateDraft {
            title: "Second poll".into(),
            description: String::new(),
            image_url: None,
            topic: None,
            is_public: true,
            tags: vec![],
            questions: vec![QuestionDraft {
                id: None,
                text: "Rate again".into(),
                description: None,
                question_type: QuestionType::Scale,
                is_required: true,
                options: vec![],
            }],
            allowed_users: None,
        };
        let second_template = svc.db.templates().create("owner", &draft).await.unwrap();
        let second_questions = svc.db.templates().questions(second_template).await.unwrap();

        let resp = Actor::new("resp", false);
        let a = svc
            .submit(&resp, first_template, &keyed("k", first_questions[0], 3.0))
            .await
            .unwrap();
        let b = svc
            .submit(&resp, second_template, &keyed("k", second_questions[0].id, 5.0))
            .await
            .unwrap();

        assert!(!b.duplicate);
        assert_ne!(a.response_id, b.response_id);
        let owner = Actor::new("owner", false);
        let stored = svc.list_for_template(&owner, second_template).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(svc.get(&owner, b.response_id).await.unwrap().answers[0].value, "5");
    }

    #[tokio::test]
    async fn keyed_retry_survives_template_changes() {
        let (svc, template_id, questions) = setup().await;
        let resp = Actor::new("resp", false);
        let first = svc
            .submit(&resp, template_id, &keyed("retry-1", questions[0], 2.0))
            .await
            .unwrap();

        // The retried payload no longer validates, the stored response wins.
        let stale = keyed("retry-1", 9999, 42.0);
        let again = svc.submit(&resp, template_id, &stale).await.unwrap();
        assert!(again.duplicate);
        assert_eq!(again.response_id, first.response_id);

        svc.db.templates().set_deleted(template_id, true).await.unwrap();
        let after_delete = svc.submit(&resp, template_id, &stale).await.unwrap();
        assert_eq!(after_delete.response_id, first.response_id);

        assert!(matches!(
            svc.submit(&resp, template_id, &keyed("retry-2", questions[0], 2.0)).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn submit_enforces_access_and_required() {
        let (svc, template_id, _) = setup().await;

        let empty = Submission::default();
        assert!(matches!(
            svc.submit(&Actor::new("resp", false), template_id, &empty).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            svc.submit(&Actor::new("stranger", false), template_id, &empty).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            svc.submit(&Actor::new("resp", false), 999, &empty).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            svc.list_for_template(&Actor::new("resp", false), template_id).await,
            Err(AppError::Forbidden(_))
        ));
    }
}
