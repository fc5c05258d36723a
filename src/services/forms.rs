//! Form service.

use super::base::{Actor, ServiceBase};
use crate::db::{Database, Form, Question};
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use tracing::info;

const MAX_NAME_LEN: usize = 200;

/// Incoming form creation payload.
#[derive(Debug, Clone, Deserialize)]
pub struct FormDraft {
    pub template_id: i64,
    /// Defaults to the template title when blank.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_public: bool,
}

/// A form together with the questions to fill in.
#[derive(Debug, Clone, Serialize)]
pub struct FormView {
    #[serde(flatten)]
    pub form: Form,
    pub questions: Vec<Question>,
}

#[derive(Clone)]
pub struct FormService {
    db: Database,
}

impl ServiceBase for FormService {
    fn db(&self) -> &Database {
        &self.db
    }
}

impl FormService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a form for a template the actor manages.
    pub async fn create(&self, actor: &Actor, draft: &FormDraft) -> AppResult<Form> {
        let info = self.live_template(draft.template_id).await?;
        self.ensure_manage(actor, &info, "create forms for this template")?;

        let mut name = draft.name.trim().to_string();
        if name.is_empty() {
            name = self
                .db
                .templates()
                .find(draft.template_id, false)
                .await?
                .map(|t| t.summary.title)
                .unwrap_or_default();
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(AppError::invalid(format!(
                "form name must be at most {} characters",
                MAX_NAME_LEN
            )));
        }

        let form = self
            .db
            .forms()
            .create(draft.template_id, &actor.id, &name, draft.description.trim(), draft.is_public)
            .await?;
        info!(
            form_id = form.id,
            template_id = form.template_id,
            user_id = %actor.id,
            "Form created"
        );
        Ok(form)
    }

    /// A form with its template's questions, if the template is visible.
    pub async fn get(&self, actor: Option<&Actor>, id: i64) -> AppResult<FormView> {
        let form = self
            .db
            .forms()
            .find(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("form {}", id)))?;

        let info = self.live_template(form.template_id).await?;
        self.ensure_visible(actor, form.template_id, &info).await?;

        let questions = self.db.templates().questions(form.template_id).await?;
        Ok(FormView { form, questions })
    }

    pub async fn list_mine(&self, actor: &Actor) -> AppResult<Vec<Form>> {
        Ok(self.db.forms().list_by_creator(&actor.id).await?)
    }

    /// Hard delete by the creator or an admin; responses cascade.
    pub async fn delete(&self, actor: &Actor, id: i64) -> AppResult<()> {
        let form = self
            .db
            .forms()
            .find(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("form {}", id)))?;

        if !actor.can_manage(&form.creator_id) {
            return Err(AppError::forbidden("only the form creator or an admin can delete it"));
        }

        self.db.forms().delete(id).await?;
        info!(form_id = id, user_id = %actor.id, "Form deleted");
        Ok(())
    }

    /// The default form of a live template, created on first use.
    pub async fn get_or_create_for_template(&self, template_id: i64) -> AppResult<Form> {
        self.live_template(template_id).await?;
        Ok(self.db.forms().get_or_create_for_template(template_id).await?)
    }
}
