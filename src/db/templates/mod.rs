//! Template repository.
//!
//! Handles templates together with their questions, tags and access lists.

pub mod models;
pub mod queries;

pub use models::{
    AccessInfo, Question, QuestionDraft, QuestionType, Template, TemplateDraft, TemplateSummary,
};
pub use queries::TemplateRepository;
pub(crate) use queries::SUMMARY_SELECT;
