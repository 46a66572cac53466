use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;

use quizsync_core::{EntityKey, EntityKind, Snapshot};

use crate::error::CacheError;
use crate::traits::{CacheEvent, EntityCache, Notifier};

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<EntityKey, Snapshot>>,
    notifier: Notifier,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize, CacheError> {
        Ok(self.lock("len")?.len())
    }

    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }

    fn lock(
        &self,
        operation: &'static str,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<EntityKey, Snapshot>>, CacheError> {
        self.entries
            .lock()
            .map_err(|_| CacheError::LockPoisoned(operation))
    }
}

impl EntityCache for MemoryCache {
    fn get(&self, key: &EntityKey) -> Result<Option<Snapshot>, CacheError> {
        Ok(self.lock("get")?.get(key).cloned())
    }

    fn put(&self, snapshot: Snapshot) -> Result<(), CacheError> {
        let key = snapshot.key();
        self.lock("put")?.insert(key, snapshot);
        self.notifier.emit(CacheEvent::Put(key));
        Ok(())
    }

    fn remove(&self, key: &EntityKey) -> Result<Option<Snapshot>, CacheError> {
        let removed = self.lock("remove")?.remove(key);
        if removed.is_some() {
            self.notifier.emit(CacheEvent::Removed(*key));
        }
        Ok(removed)
    }

    fn swap(&self, old: &EntityKey, snapshot: Snapshot) -> Result<(), CacheError> {
        let key = snapshot.key();
        {
            let mut entries = self.lock("swap")?;
            entries.remove(old);
            entries.insert(key, snapshot);
        }
        if *old == key {
            self.notifier.emit(CacheEvent::Put(key));
        } else {
            self.notifier.emit(CacheEvent::Rekeyed { from: *old, to: key });
        }
        Ok(())
    }

    fn keys(&self, kind: EntityKind) -> Result<Vec<EntityKey>, CacheError> {
        let mut keys: Vec<EntityKey> = self
            .lock("keys")?
            .keys()
            .filter(|k| k.kind == kind)
            .copied()
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.notifier.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizsync_core::patch::{DocumentDraft, QuizDraft};
    use quizsync_core::RecordId;

    fn quiz(id: i64, title: &str) -> Snapshot {
        let mut quiz = QuizDraft::new(title, "topic").predict();
        quiz.id = RecordId::Server(id);
        Snapshot::from(quiz)
    }

    #[test]
    fn put_replaces_whole_snapshot() -> Result<(), CacheError> {
        let cache = MemoryCache::new();
        cache.put(quiz(1, "first"))?;
        cache.put(quiz(1, "second"))?;
        assert_eq!(cache.len()?, 1);
        assert_eq!(cache.quiz(RecordId::Server(1))?.map(|q| q.title), Some("second".into()));
        Ok(())
    }

    #[test]
    fn swap_rewrites_key_and_notifies() -> Result<(), CacheError> {
        let cache = MemoryCache::new();
        let mut events = cache.subscribe();

        let temp = quiz(0, "draft").with_id(RecordId::local());
        cache.put(temp.clone())?;
        cache.swap(&temp.key(), quiz(12, "draft"))?;

        assert!(cache.get(&temp.key())?.is_none());
        assert!(cache.get(&EntityKey::quiz(12))?.is_some());
        assert_eq!(events.try_recv().unwrap(), CacheEvent::Put(temp.key()));
        assert_eq!(
            events.try_recv().unwrap(),
            CacheEvent::Rekeyed { from: temp.key(), to: EntityKey::quiz(12) }
        );
        Ok(())
    }

    #[test]
    fn remove_missing_is_silent() -> Result<(), CacheError> {
        let cache = MemoryCache::new();
        let mut events = cache.subscribe();
        assert!(cache.remove(&EntityKey::quiz(3))?.is_none());
        assert!(events.try_recv().is_err());
        Ok(())
    }

    #[test]
    fn keys_are_scoped_by_kind() -> Result<(), CacheError> {
        let cache = MemoryCache::new();
        cache.put(quiz(2, "a"))?;
        cache.put(quiz(1, "b"))?;
        let mut doc = DocumentDraft {
            filename: "notes.txt".into(),
            file_type: "txt".into(),
            content: "hello".into(),
        }
        .predict();
        doc.id = RecordId::Server(1);
        cache.put(doc.into())?;

        assert_eq!(cache.keys(EntityKind::Quiz)?, vec![EntityKey::quiz(1), EntityKey::quiz(2)]);
        assert_eq!(cache.keys(EntityKind::Document)?, vec![EntityKey::document(1)]);
        assert!(cache.keys(EntityKind::Project)?.is_empty());
        Ok(())
    }
}
