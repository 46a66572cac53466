use std::sync::Arc;

use tokio::sync::broadcast;

use quizsync_core::{Document, EntityKey, EntityKind, Project, Question, Quiz, RecordId, Snapshot};

use crate::error::CacheError;

/// Capacity of the change-notification channel. Slow subscribers lag and
/// skip events rather than block writers.
pub const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Put(EntityKey),
    Removed(EntityKey),
    Rekeyed { from: EntityKey, to: EntityKey },
}

impl CacheEvent {
    /// The key a reader should re-render from.
    pub fn key(&self) -> EntityKey {
        match self {
            Self::Put(key) | Self::Removed(key) => *key,
            Self::Rekeyed { to, .. } => *to,
        }
    }
}

/// Fan-out of cache events to subscribers.
#[derive(Debug)]
pub struct Notifier {
    sender: broadcast::Sender<CacheEvent>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: CacheEvent) {
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }
}

/// Last-known state of every entity the client has seen.
///
/// Every write replaces a whole snapshot, so readers never see a partially
/// built entity. Every write notifies subscribers.
pub trait EntityCache: Send + Sync {
    fn get(&self, key: &EntityKey) -> Result<Option<Snapshot>, CacheError>;

    fn put(&self, snapshot: Snapshot) -> Result<(), CacheError>;

    fn remove(&self, key: &EntityKey) -> Result<Option<Snapshot>, CacheError>;

    /// Atomically removes `old` and stores `snapshot` under its own key.
    fn swap(&self, old: &EntityKey, snapshot: Snapshot) -> Result<(), CacheError>;

    fn keys(&self, kind: EntityKind) -> Result<Vec<EntityKey>, CacheError>;

    fn subscribe(&self) -> broadcast::Receiver<CacheEvent>;

    fn quiz(&self, id: RecordId) -> Result<Option<Quiz>, CacheError> {
        Ok(self.get(&EntityKey::quiz(id))?.map(Snapshot::into_quiz).transpose()?)
    }

    fn question(&self, id: RecordId) -> Result<Option<Question>, CacheError> {
        Ok(self.get(&EntityKey::question(id))?.map(Snapshot::into_question).transpose()?)
    }

    fn project(&self, id: RecordId) -> Result<Option<Project>, CacheError> {
        Ok(self.get(&EntityKey::project(id))?.map(Snapshot::into_project).transpose()?)
    }

    fn document(&self, id: RecordId) -> Result<Option<Document>, CacheError> {
        Ok(self.get(&EntityKey::document(id))?.map(Snapshot::into_document).transpose()?)
    }
}

impl<C: EntityCache + ?Sized> EntityCache for Arc<C> {
    fn get(&self, key: &EntityKey) -> Result<Option<Snapshot>, CacheError> {
        (**self).get(key)
    }

    fn put(&self, snapshot: Snapshot) -> Result<(), CacheError> {
        (**self).put(snapshot)
    }

    fn remove(&self, key: &EntityKey) -> Result<Option<Snapshot>, CacheError> {
        (**self).remove(key)
    }

    fn swap(&self, old: &EntityKey, snapshot: Snapshot) -> Result<(), CacheError> {
        (**self).swap(old, snapshot)
    }

    fn keys(&self, kind: EntityKind) -> Result<Vec<EntityKey>, CacheError> {
        (**self).keys(kind)
    }

    fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        (**self).subscribe()
    }
}
