use quizsync_cache::EntityCache;
use quizsync_core::patch::{DocumentDraft, DocumentPatch};
use quizsync_core::{Document, EntityKey, RecordId};
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
    pub async fn create_document(&self, draft: DocumentDraft) -> Result<Document, SyncError> {
        validate::non_empty("filename", &draft.filename)?;

        let predicted = draft.predict();
        let key = predicted.key();
        let locked = self.lock(&[key], Lane::Back).await?;
        let outcome = self
            .execute(
                locked,
                Plan {
                    key,
                    request: Request::CreateDocument(draft),
                    effect: Effect::Store(predicted.into()),
                },
            )
            .await?;
        Ok(outcome.into_snapshot()?.into_document()?)
    }

    pub async fn update_document(
        &self,
        id: impl Into<RecordId>,
        patch: DocumentPatch,
    ) -> Result<Document, SyncError> {
        validate::optional_non_empty("filename", patch.filename.as_deref())?;

        let key = EntityKey::document(id);
        let locked = self.lock(&[key], Lane::Back).await?;
        let current = self.cached_document(key.id)?;
        let server_id = self.server_id(current.key())?;
        let predicted = patch.apply(&current);
        let outcome = self
            .execute(
                locked,
                Plan {
                    key: current.key(),
                    request: Request::UpdateDocument { id: server_id, patch },
                    effect: Effect::Store(predicted.into()),
                },
            )
            .await?;
        Ok(outcome.into_snapshot()?.into_document()?)
    }

    /// Deletes a document. Quizzes generated from it keep their source
    /// reference.
    pub async fn delete_document(&self, id: impl Into<RecordId>) -> Result<(), SyncError> {
        let key = EntityKey::document(id);
        let locked = self.lock(&[key], Lane::Front).await?;
        let key = self.resolve(key);
        let server_id = self.server_id(key)?;
        self.execute(
            locked,
            Plan {
                key,
                request: Request::DeleteDocument(server_id),
                effect: Effect::Remove,
            },
        )
        .await?;
        Ok(())
    }
}
