use quizsync_cache::EntityCache;
use quizsync_core::convert::apply_conversion;
use quizsync_core::patch::{QuestionDraft, QuestionPatch};
use quizsync_core::{EntityKey, Question, QuestionType, RecordId};
use quizsync_gateway::{Gateway, Target};

use crate::error::SyncError;
use crate::inflight::{KeySet, Lane};
use crate::request::Request;
use crate::{validate, Effect, Engine, Plan};

impl<C, G> Engine<C, G>
where
    C: EntityCache + 'static,
    G: Gateway + 'static,
{
    /// Appends a question to a quiz. The prediction carries a temporary id
    /// that is rewritten, in the quiz too, once the server assigns one.
    pub async fn add_question(
        &self,
        quiz_id: impl Into<RecordId>,
        draft: QuestionDraft,
    ) -> Result<Question, SyncError> {
        validate::optional_non_empty("question text", draft.question_text.as_deref())?;
        if !draft.answers.is_empty() {
            validate::answers(draft.question_type(), &draft.answers)?;
        }

        let quiz_key = EntityKey::quiz(quiz_id);
        let temp = EntityKey::question(RecordId::local());
        let locked = self.lock(&[quiz_key, temp], Lane::Back).await?;

        let quiz = self.cached_quiz(quiz_key.id)?;
        let server_quiz_id = self.server_id(quiz.key())?;
        let mut predicted = draft.predict(Some(quiz.id), quiz.next_position());
        predicted.id = temp.id;

        let outcome = self
            .execute(
                locked,
                Plan {
                    key: temp,
                    request: Request::CreateQuestion {
                        quiz_id: server_quiz_id,
                        draft,
                    },
                    effect: Effect::Store(predicted.into()),
                },
            )
            .await?;
        Ok(outcome.into_snapshot()?.into_question()?)
    }

    pub async fn update_question(
        &self,
        id: impl Into<RecordId>,
        patch: QuestionPatch,
    ) -> Result<Question, SyncError> {
        validate::optional_non_empty("question text", patch.question_text.as_deref())?;

        let (locked, current) = self.lock_question(id.into(), Lane::Back).await?;
        if let Some(answers) = &patch.answers {
            let question_type = patch.question_type.unwrap_or(current.question_type);
            validate::answers(question_type, answers)?;
        }
        let predicted = patch.apply(&current);
        if predicted.question_type.has_choices() {
            validate::question_answers(&predicted)?;
        }
        let (quiz_id, server_id) = self.question_address(current.key())?;

        let outcome = self
            .execute(
                locked,
                Plan {
                    key: current.key(),
                    request: Request::UpdateQuestion {
                        quiz_id,
                        id: server_id,
                        patch,
                    },
                    effect: Effect::Store(predicted.into()),
                },
            )
            .await?;
        Ok(outcome.into_snapshot()?.into_question()?)
    }

    pub async fn delete_question(&self, id: impl Into<RecordId>) -> Result<(), SyncError> {
        let (locked, current) = self.lock_question(id.into(), Lane::Front).await?;
        let (quiz_id, server_id) = self.question_address(current.key())?;
        self.execute(
            locked,
            Plan {
                key: current.key(),
                request: Request::DeleteQuestion {
                    quiz_id,
                    id: server_id,
                },
                effect: Effect::Remove,
            },
        )
        .await?;
        Ok(())
    }

    /// Asks the server for a fresh version of one question. Only questions
    /// that belong to a quiz can be regenerated.
    pub async fn regenerate_question(
        &self,
        id: impl Into<RecordId>,
        use_document_content: bool,
    ) -> Result<Question, SyncError> {
        let (locked, current) = self.lock_question(id.into(), Lane::Back).await?;
        let (quiz_id, server_id) = self.question_address(current.key())?;
        let Some(quiz_id) = quiz_id else {
            return Err(SyncError::Validation(format!(
                "question {} is not assigned to a quiz",
                current.id
            )));
        };

        let outcome = self
            .execute(
                locked,
                Plan {
                    key: current.key(),
                    request: Request::RegenerateQuestion {
                        quiz_id,
                        id: server_id,
                        use_document_content,
                    },
                    effect: Effect::Nothing,
                },
            )
            .await?;
        Ok(outcome.into_snapshot()?.into_question()?)
    }

    /// Converts a question to another type. The predicted answer set comes
    /// from the local conversion rules; the server's own conversion replaces
    /// it on confirmation.
    pub async fn change_question_type(
        &self,
        id: impl Into<RecordId>,
        question_type: QuestionType,
        use_document_content: bool,
    ) -> Result<Question, SyncError> {
        let (locked, current) = self.lock_question(id.into(), Lane::Back).await?;
        let (quiz_id, server_id) = self.question_address(current.key())?;
        let predicted = apply_conversion(&current, question_type);

        let outcome = self
            .execute(
                locked,
                Plan {
                    key: current.key(),
                    request: Request::ChangeQuestionType {
                        quiz_id,
                        id: server_id,
                        question_type,
                        use_document_content,
                    },
                    effect: Effect::Store(predicted.into()),
                },
            )
            .await?;
        Ok(outcome.into_snapshot()?.into_question()?)
    }

    /// Locks a question together with its owning quiz, and returns the
    /// question as it stands once the markers are held.
    async fn lock_question(&self, id: RecordId, lane: Lane) -> Result<(KeySet, Question), SyncError> {
        let question = self.cached_question(id)?;
        let mut keys = vec![question.key()];
        if let Some(quiz_id) = question.quiz_id {
            keys.push(EntityKey::quiz(quiz_id));
        }
        let locked = self.lock(&keys, lane).await?;
        let current = self.cached_question(question.id)?;
        Ok((locked, current))
    }

    fn question_address(&self, key: EntityKey) -> Result<(Option<i64>, i64), SyncError> {
        match self.target(key)? {
            Target::Question { quiz_id, id } => Ok((quiz_id, id)),
            other => Err(SyncError::Validation(format!("{other} is not a question"))),
        }
    }
}
