use std::collections::HashSet;

use quizsync_cache::{CacheError, EntityCache};
use quizsync_core::{EntityKey, Snapshot};

/// Prior state of every key a prediction wrote, captured on first touch.
/// Restoring it in reverse order returns the cache to exactly the state it
/// had before the prediction.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    priors: Vec<(EntityKey, Option<Snapshot>)>,
    seen: HashSet<EntityKey>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priors(&self) -> &[(EntityKey, Option<Snapshot>)] {
        &self.priors
    }

    pub fn touched(&self) -> Vec<EntityKey> {
        self.priors.iter().map(|(key, _)| *key).collect()
    }

    fn record<C: EntityCache + ?Sized>(&mut self, cache: &C, key: EntityKey) -> Result<(), CacheError> {
        if self.seen.insert(key) {
            self.priors.push((key, cache.get(&key)?));
        }
        Ok(())
    }

    pub fn put<C: EntityCache + ?Sized>(&mut self, cache: &C, snapshot: Snapshot) -> Result<(), CacheError> {
        self.record(cache, snapshot.key())?;
        cache.put(snapshot)
    }

    pub fn remove<C: EntityCache + ?Sized>(&mut self, cache: &C, key: EntityKey) -> Result<(), CacheError> {
        self.record(cache, key)?;
        cache.remove(&key)?;
        Ok(())
    }

    pub fn swap<C: EntityCache + ?Sized>(
        &mut self,
        cache: &C,
        old: EntityKey,
        snapshot: Snapshot,
    ) -> Result<(), CacheError> {
        self.record(cache, old)?;
        self.record(cache, snapshot.key())?;
        cache.swap(&old, snapshot)
    }

    pub fn rollback<C: EntityCache + ?Sized>(self, cache: &C) -> Result<(), CacheError> {
        for (key, prior) in self.priors.into_iter().rev() {
            match prior {
                Some(snapshot) => cache.put(snapshot)?,
                None => {
                    cache.remove(&key)?;
                }
            }
        }
        Ok(())
    }
}
