use quizsync_cache::EntityCache;
use quizsync_core::patch::{GenerateRequest, QuizDraft, QuizPatch};
use quizsync_core::{EntityKey, Quiz, RecordId};
use quizsync_gateway::Gateway;

use crate::error::SyncError;
use crate::inflight::Lane;
use crate::request::Request;
use crate::{validate, Effect, Engine, Plan};

impl<C, G> Engine<C, G>
where
    C: EntityCache + 'static,
    G: Gateway + 'static,
{
    pub async fn create_quiz(&self, draft: QuizDraft) -> Result<Quiz, SyncError> {
        validate::non_empty("quiz title", &draft.title)?;

        let predicted = draft.predict();
        let key = predicted.key();
        let locked = self.lock(&[key], Lane::Back).await?;
        let outcome = self
            .execute(
                locked,
                Plan {
                    key,
                    request: Request::CreateQuiz(draft),
                    effect: Effect::Store(predicted.into()),
                },
            )
            .await?;
        Ok(outcome.into_snapshot()?.into_quiz()?)
    }

    pub async fn update_quiz(&self, id: impl Into<RecordId>, patch: QuizPatch) -> Result<Quiz, SyncError> {
        validate::optional_non_empty("quiz title", patch.title.as_deref())?;

        let key = EntityKey::quiz(id);
        let locked = self.lock(&[key], Lane::Back).await?;
        let current = self.cached_quiz(key.id)?;
        let server_id = self.server_id(current.key())?;
        let predicted = patch.apply(&current);
        let outcome = self
            .execute(
                locked,
                Plan {
                    key: current.key(),
                    request: Request::UpdateQuiz { id: server_id, patch },
                    effect: Effect::Store(predicted.into()),
                },
            )
            .await?;
        Ok(outcome.into_snapshot()?.into_quiz()?)
    }

    /// Deletes a quiz and its questions. Projects that list it keep their
    /// reference until the server says otherwise.
    pub async fn delete_quiz(&self, id: impl Into<RecordId>) -> Result<(), SyncError> {
        let key = EntityKey::quiz(id);
        let locked = self.lock(&[key], Lane::Front).await?;
        let key = self.resolve(key);
        let server_id = self.server_id(key)?;
        self.execute(
            locked,
            Plan {
                key,
                request: Request::DeleteQuiz(server_id),
                effect: Effect::Remove,
            },
        )
        .await?;
        Ok(())
    }

    /// Asks the server to regenerate every question, drawing on the quiz's
    /// source documents when `use_embeddings` is set. There is nothing to
    /// predict; the quiz reports as in flight until the result arrives.
    pub async fn regenerate_quiz(
        &self,
        id: impl Into<RecordId>,
        use_embeddings: bool,
    ) -> Result<Quiz, SyncError> {
        let key = EntityKey::quiz(id);
        let locked = self.lock(&[key], Lane::Back).await?;
        let key = self.resolve(key);
        let server_id = self.server_id(key)?;
        let outcome = self
            .execute(
                locked,
                Plan {
                    key,
                    request: Request::RegenerateQuiz {
                        id: server_id,
                        use_embeddings,
                    },
                    effect: Effect::Nothing,
                },
            )
            .await?;
        Ok(outcome.into_snapshot()?.into_quiz()?)
    }

    /// Creates a quiz by server-side generation. The new quiz appears in the
    /// cache only once the server returns it.
    pub async fn generate_quiz(&self, request: GenerateRequest) -> Result<Quiz, SyncError> {
        validate::non_empty("topic", &request.topic)?;
        if request.num_questions == 0 {
            return Err(SyncError::Validation("num_questions must be at least 1".into()));
        }

        let key = EntityKey::quiz(RecordId::local());
        let locked = self.lock(&[key], Lane::Back).await?;
        let outcome = self
            .execute(
                locked,
                Plan {
                    key,
                    request: Request::GenerateQuiz(request),
                    effect: Effect::Nothing,
                },
            )
            .await?;
        Ok(outcome.into_snapshot()?.into_quiz()?)
    }
}
