//! Template database models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 4000;
pub const MAX_QUESTION_TEXT_LEN: usize = 1000;
pub const MAX_TAG_LEN: usize = 50;

/// Kinds of question a template can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleLineText,
    MultiLineText,
    Number,
    Checkbox,
    MultipleChoice,
    Dropdown,
    Date,
    Email,
    Scale,
}

impl QuestionType {
    pub const ALL: [QuestionType; 9] = [
        QuestionType::SingleLineText,
        QuestionType::MultiLineText,
        QuestionType::Number,
        QuestionType::Checkbox,
        QuestionType::MultipleChoice,
        QuestionType::Dropdown,
        QuestionType::Date,
        QuestionType::Email,
        QuestionType::Scale,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SingleLineText => "single_line_text",
            Self::MultiLineText => "multi_line_text",
            Self::Number => "number",
            Self::Checkbox => "checkbox",
            Self::MultipleChoice => "multiple_choice",
            Self::Dropdown => "dropdown",
            Self::Date => "date",
            Self::Email => "email",
            Self::Scale => "scale",
        }
    }

    /// Human readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::SingleLineText => "Short Text",
            Self::MultiLineText => "Paragraph Text",
            Self::Number => "Number",
            Self::Checkbox => "Checkboxes",
            Self::MultipleChoice => "Multiple Choice",
            Self::Dropdown => "Dropdown",
            Self::Date => "Date",
            Self::Email => "Email",
            Self::Scale => "Rating Scale",
        }
    }

    /// Whether an options list may be attached.
    pub fn supports_options(self) -> bool {
        matches!(self, Self::MultipleChoice | Self::Dropdown | Self::Checkbox)
    }

    /// Whether an options list must be attached.
    pub fn requires_options(self) -> bool {
        matches!(self, Self::MultipleChoice | Self::Dropdown)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QuestionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown question type: {}", s))
    }
}

/// A stored question.
#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: i64,
    pub template_id: i64,
    pub position: i64,
    pub text: String,
    pub description: Option<String>,
    pub question_type: QuestionType,
    pub is_required: bool,
    pub options: Vec<String>,
}

/// Listing row: template metadata plus counters.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TemplateSummary {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub topic: Option<String>,
    pub created_by_id: String,
    pub author_name: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub is_public: bool,
    pub is_deleted: bool,
    pub like_count: i64,
    pub response_count: i64,
}

/// A template with everything needed to render or fill it.
#[derive(Debug, Clone, Serialize)]
pub struct Template {
    #[serde(flatten)]
    pub summary: TemplateSummary,
    pub tags: Vec<String>,
    pub questions: Vec<Question>,
    pub allowed_users: Vec<String>,
}

/// Ownership and visibility facts used for authorization.
#[derive(Debug, Clone)]
pub struct AccessInfo {
    pub owner_id: String,
    pub is_public: bool,
    pub is_deleted: bool,
}

/// Incoming question as edited by the template owner.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionDraft {
    /// Existing question id; absent for new questions.
    #[serde(default)]
    pub id: Option<i64>,
    pub text: String,
    #[serde(default)]
    pub description: Option<String>,
    pub question_type: QuestionType,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub options: Vec<String>,
}

/// Incoming template create/update payload.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub questions: Vec<QuestionDraft>,
    /// Replaces the access list when present; untouched when absent.
    #[serde(default)]
    pub allowed_users: Option<Vec<String>>,
}

impl TemplateDraft {
    /// Check field lengths and per-type option rules.
    pub fn validate(&self) -> Result<(), String> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err("title is required".into());
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(format!("title must be at most {} characters", MAX_TITLE_LEN));
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(format!(
                "description must be at most {} characters",
                MAX_DESCRIPTION_LEN
            ));
        }
        if self.tags.iter().any(|t| t.trim().chars().count() > MAX_TAG_LEN) {
            return Err(format!("tags must be at most {} characters", MAX_TAG_LEN));
        }

        let mut seen_ids = HashSet::new();
        for (index, q) in self.questions.iter().enumerate() {
            let n = index + 1;
            if q.text.trim().is_empty() {
                return Err(format!("question {} has no text", n));
            }
            if q.text.chars().count() > MAX_QUESTION_TEXT_LEN {
                return Err(format!("question {} text is too long", n));
            }
            if let Some(id) = q.id
                && !seen_ids.insert(id)
            {
                return Err(format!("question id {} appears more than once", id));
            }

            let options = q.clean_options();
            if options.len() != q.options.len() {
                return Err(format!("question {} has blank or repeated options", n));
            }
            if q.question_type.requires_options() && options.is_empty() {
                return Err(format!(
                    "question {} ({}) needs at least one option",
                    n,
                    q.question_type.label()
                ));
            }
            if !q.question_type.supports_options() && !options.is_empty() {
                return Err(format!(
                    "question {} ({}) does not take options",
                    n,
                    q.question_type.label()
                ));
            }
        }
        Ok(())
    }

    /// Trimmed, lowercased, de-duplicated tag names in first-seen order.
    pub fn normalized_tags(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .filter(|t| seen.insert(t.clone()))
            .collect()
    }
}

impl QuestionDraft {
    /// Trimmed non-empty options with duplicates removed.
    pub fn clean_options(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.options
            .iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .filter(|o| seen.insert(o.clone()))
            .collect()
    }
}
