//! Versioned revert.
//!
//! The server keeps an append-only log of every accepted action with the
//! entity's state before it. Reverting picks one of those states, predicts
//! the restored entity locally, and runs it through the ordinary mutation
//! phases against the server's revert endpoint. The client never writes to
//! the log.

use quizsync_cache::EntityCache;
use quizsync_core::history::restore_from;
use quizsync_core::{Activity, EntityKey, EntityKind, HistoryEntry, RecordId, Snapshot};
use quizsync_gateway::Gateway;

use crate::error::SyncError;
use crate::inflight::Lane;
use crate::request::Request;
use crate::{Effect, Engine, Plan};

/// The entry a revert restores: the one with `history_id`, or the most
/// recent entry that recorded a previous state. `entries` is most recent first.
pub fn select_entry(
    entries: &[HistoryEntry],
    history_id: Option<i64>,
) -> Result<Option<&HistoryEntry>, SyncError> {
    match history_id {
        Some(id) => match entries.iter().find(|e| e.id == id) {
            Some(entry) if !entry.is_revertible() => Err(SyncError::Validation(format!(
                "history entry {id} ({}) recorded no previous state",
                entry.action.as_str()
            ))),
            found => Ok(found),
        },
        None => entries
            .iter()
            .find(|e| e.is_revertible())
            .map(Some)
            .ok_or_else(|| SyncError::Validation("no history available to revert to".into())),
    }
}

fn ensure_history(kind: EntityKind) -> Result<(), SyncError> {
    if !kind.has_history() {
        return Err(SyncError::Validation(format!("{kind} entities keep no history")));
    }
    Ok(())
}

impl<C, G> Engine<C, G>
where
    C: EntityCache + 'static,
    G: Gateway + 'static,
{
    /// The entity's edit log, most recent first. `limit` defaults to the
    /// configured history limit.
    pub async fn list_history(
        &self,
        kind: EntityKind,
        id: impl Into<RecordId>,
        limit: Option<usize>,
    ) -> Result<Vec<HistoryEntry>, SyncError> {
        ensure_history(kind)?;
        let target = self.target(EntityKey::new(kind, id))?;
        let limit = limit.unwrap_or(self.config().history_limit);
        Ok(self.gateway().list_history(target, limit).await?)
    }

    /// The signed-in user's activity across quizzes, questions and projects,
    /// most recent first. Each line carries its summary text.
    pub async fn list_user_history(&self, limit: Option<usize>) -> Result<Vec<Activity>, SyncError> {
        let limit = limit.unwrap_or(self.config().history_limit);
        let history = self.gateway().list_user_history(limit).await?;
        log::debug!("user history: {} entries across all kinds", history.len());
        Ok(history.into_feed(limit))
    }

    /// Restores the entity to the state recorded by `history_id`, or by the
    /// most recent revertible entry when none is given.
    ///
    /// The entity must still exist: reverting a deleted entity is `NotFound`.
    pub async fn revert(
        &self,
        kind: EntityKind,
        id: impl Into<RecordId>,
        history_id: Option<i64>,
    ) -> Result<Snapshot, SyncError> {
        ensure_history(kind)?;
        let key = EntityKey::new(kind, id);
        let mut keys = vec![key];
        if kind == EntityKind::Question
            && let Some(question) = self.cache().question(self.resolve(key).id)?
            && let Some(quiz_id) = question.quiz_id
        {
            keys.push(EntityKey::quiz(quiz_id));
        }

        let locked = self.lock(&keys, Lane::Back).await?;
        let key = self.resolve(key);
        let target = self.target(key)?;

        let current = match self.cache().get(&key)? {
            Some(snapshot) => snapshot,
            None => self.gateway().fetch(target).await?,
        };
        let entries = self
            .gateway()
            .list_history(target, self.config().history_limit)
            .await?;

        let (history_id, effect) = match select_entry(&entries, history_id)? {
            Some(entry) => {
                let state = entry.previous_state.as_ref().ok_or_else(|| {
                    SyncError::Validation(format!("history entry {} has no state", entry.id))
                })?;
                let predicted = restore_from(&current, state)?;
                log::debug!("revert {key}: restoring entry {} ({})", entry.id, entry.summary());
                (entry.id, Effect::Store(predicted))
            }
            // Older than the fetched page; the server still knows it.
            None => match history_id {
                Some(id) => (id, Effect::Nothing),
                None => return Err(SyncError::Validation("no history available to revert to".into())),
            },
        };

        self.execute(
            locked,
            Plan {
                key,
                request: Request::Revert { target, history_id },
                effect,
            },
        )
        .await?
        .into_snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizsync_core::ActionType;
    use serde_json::json;

    fn entry(id: i64, action: ActionType, state: Option<serde_json::Value>) -> HistoryEntry {
        HistoryEntry {
            id,
            entity_id: RecordId::Server(1),
            action,
            timestamp: chrono::Utc::now(),
            previous_state: state,
        }
    }

    #[test]
    fn latest_revertible_entry_is_default() {
        let entries = vec![
            entry(3, ActionType::Create, None),
            entry(2, ActionType::Update, Some(json!({"title": "b"}))),
            entry(1, ActionType::Update, Some(json!({"title": "a"}))),
        ];
        let picked = select_entry(&entries, None).unwrap().map(|e| e.id);
        assert_eq!(picked, Some(2));
        assert_eq!(select_entry(&entries, Some(1)).unwrap().map(|e| e.id), Some(1));
    }

    #[test]
    fn non_revertible_choices_are_rejected() {
        let entries = vec![entry(3, ActionType::Create, None)];
        assert!(select_entry(&entries, None).unwrap_err().is_validation());
        assert!(select_entry(&entries, Some(3)).unwrap_err().is_validation());
        assert!(select_entry(&entries, Some(99)).unwrap().is_none());
    }
}
