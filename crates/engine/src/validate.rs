//! Local checks run before anything is predicted or dispatched.

use quizsync_core::patch::AnswerDraft;
use quizsync_core::{Question, QuestionType};

use crate::error::SyncError;

pub fn non_empty(field: &str, value: &str) -> Result<(), SyncError> {
    if value.trim().is_empty() {
        return Err(SyncError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

pub fn optional_non_empty(field: &str, value: Option<&str>) -> Result<(), SyncError> {
    match value {
        Some(value) => non_empty(field, value),
        None => Ok(()),
    }
}

/// An answer set the service would accept for `question_type`.
pub fn answers(question_type: QuestionType, answers: &[AnswerDraft]) -> Result<(), SyncError> {
    match question_type {
        QuestionType::OpenEnded => {
            if !answers.is_empty() {
                return Err(SyncError::Validation(
                    "open-ended questions take no answer options".into(),
                ));
            }
        }
        QuestionType::MultipleChoice | QuestionType::Boolean => {
            if answers.len() < 2 {
                return Err(SyncError::Validation(format!(
                    "{} questions need at least two answers, got {}",
                    question_type.as_str(),
                    answers.len()
                )));
            }
            if question_type == QuestionType::Boolean && answers.len() != 2 {
                return Err(SyncError::Validation(format!(
                    "boolean questions have exactly two answers, got {}",
                    answers.len()
                )));
            }
            let correct = answers.iter().filter(|a| a.is_correct).count();
            if correct != 1 {
                return Err(SyncError::Validation(format!(
                    "exactly one answer must be correct, got {correct}"
                )));
            }
            for answer in answers {
                non_empty("answer text", &answer.answer_text)?;
            }
        }
    }
    Ok(())
}

/// The answer set a question would carry after an edit, checked against its type.
pub fn question_answers(question: &Question) -> Result<(), SyncError> {
    let drafts: Vec<AnswerDraft> = question
        .answers
        .iter()
        .map(|a| AnswerDraft::new(a.answer_text.clone(), a.is_correct, a.position))
        .collect();
    answers(question.question_type, &drafts)
}
