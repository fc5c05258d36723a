//! Per-question aggregation of submitted answers.

use crate::db::{Question, QuestionType};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
pub struct TemplateResults {
    pub template_id: i64,
    pub response_count: i64,
    pub questions: Vec<QuestionResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionResult {
    pub question_id: i64,
    pub text: String,
    pub question_type: QuestionType,
    pub answer_count: usize,
    pub summary: AnswerSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerSummary {
    Numeric {
        min: Option<f64>,
        max: Option<f64>,
        mean: Option<f64>,
    },
    Choices {
        counts: Vec<OptionCount>,
    },
    Text {
        recent: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionCount {
    pub option: String,
    pub count: usize,
}

/// Aggregate `(question_id, value)` answers, newest first, per question.
pub fn aggregate(
    questions: &[Question],
    answers: &[(i64, String)],
    recent_limit: usize,
) -> Vec<QuestionResult> {
    let mut by_question: HashMap<i64, Vec<&str>> = HashMap::new();
    for (question_id, value) in answers {
        by_question.entry(*question_id).or_default().push(value);
    }

    questions
        .iter()
        .map(|q| {
            let values = by_question.remove(&q.id).unwrap_or_default();
            QuestionResult {
                question_id: q.id,
                text: q.text.clone(),
                question_type: q.question_type,
                answer_count: values.len(),
                summary: summarize(q, &values, recent_limit),
            }
        })
        .collect()
}

fn summarize(question: &Question, values: &[&str], recent_limit: usize) -> AnswerSummary {
    match question.question_type {
        QuestionType::Number => {
            let numbers: Vec<f64> = values.iter().filter_map(|v| v.trim().parse().ok()).collect();
            if numbers.is_empty() {
                return AnswerSummary::Numeric {
                    min: None,
                    max: None,
                    mean: None,
                };
            }
            let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
            let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
            AnswerSummary::Numeric {
                min: Some(min),
                max: Some(max),
                mean: Some(mean),
            }
        }
        QuestionType::Scale => {
            let labels: Vec<String> = (1..=5).map(|n| n.to_string()).collect();
            count_options(&labels, values.iter().map(|v| vec![v.to_string()]))
        }
        QuestionType::Checkbox if question.options.is_empty() => {
            let labels = vec!["true".to_string(), "false".to_string()];
            count_options(&labels, values.iter().map(|v| vec![v.to_string()]))
        }
        QuestionType::Checkbox => count_options(
            &question.options,
            values
                .iter()
                .map(|v| serde_json::from_str::<Vec<String>>(v).unwrap_or_default()),
        ),
        QuestionType::MultipleChoice | QuestionType::Dropdown => {
            count_options(&question.options, values.iter().map(|v| vec![v.to_string()]))
        }
        QuestionType::SingleLineText
        | QuestionType::MultiLineText
        | QuestionType::Date
        | QuestionType::Email => AnswerSummary::Text {
            recent: values.iter().take(recent_limit).map(|v| v.to_string()).collect(),
        },
    }
}

/// Count selections per option, in option order. Unknown values are ignored.
fn count_options(
    options: &[String],
    selections: impl Iterator<Item = Vec<String>>,
) -> AnswerSummary {
    let mut counts: Vec<OptionCount> = options
        .iter()
        .map(|o| OptionCount {
            option: o.clone(),
            count: 0,
        })
        .collect();

    for selected in selections {
        for value in selected {
            if let Some(entry) = counts.iter_mut().find(|c| c.option == value) {
                entry.count += 1;
            }
        }
    }

    AnswerSummary::Choices { counts }
}
