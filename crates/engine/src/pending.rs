use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use quizsync_core::{EntityKey, MutationId, Snapshot};

use crate::journal::Journal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    InFlight,
    Confirmed,
    RolledBack,
}

impl MutationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InFlight => "in_flight",
            Self::Confirmed => "confirmed",
            Self::RolledBack => "rolled_back",
        }
    }
}

/// A user action between its optimistic prediction and the server's answer.
#[derive(Debug, Clone)]
pub struct PendingMutation {
    pub id: MutationId,
    pub label: &'static str,
    /// Keys whose markers the mutation holds.
    pub keys: Vec<EntityKey>,
    /// The primary entity as predicted, if the action has a prediction.
    pub prediction: Option<Snapshot>,
    pub journal: Journal,
    pub status: MutationStatus,
}

impl PendingMutation {
    pub fn new(label: &'static str, keys: Vec<EntityKey>) -> Self {
        Self {
            id: MutationId::new(),
            label,
            keys,
            prediction: None,
            journal: Journal::new(),
            status: MutationStatus::InFlight,
        }
    }

    /// Prior snapshot of every key the prediction wrote.
    pub fn priors(&self) -> &[(EntityKey, Option<Snapshot>)] {
        self.journal.priors()
    }

    pub fn touches(&self, key: &EntityKey) -> bool {
        self.keys.contains(key) || self.journal.priors().iter().any(|(k, _)| k == key)
    }
}

/// Mutations currently in flight, for inspection.
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: Mutex<HashMap<MutationId, PendingMutation>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<MutationId, PendingMutation>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn insert(&self, mutation: &PendingMutation) {
        self.entries().insert(mutation.id, mutation.clone());
    }

    pub fn finish(&self, id: MutationId) -> Option<PendingMutation> {
        self.entries().remove(&id)
    }

    pub fn list(&self) -> Vec<PendingMutation> {
        let mut list: Vec<_> = self.entries().values().cloned().collect();
        list.sort_by_key(|m| m.id);
        list
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
