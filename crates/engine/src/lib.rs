//! Optimistic mutation engine.
//!
//! Every user action runs in four phases: predict the result into the cache,
//! dispatch the remote call, then either reconcile the cache with the
//! server's canonical copy or roll every touched key back to what it was.
//! Mutations on the same key are serialized through per-key in-flight
//! markers; mutations on disjoint keys run concurrently.

pub mod config;
pub mod error;
pub mod history;
pub mod inflight;
pub mod journal;
pub mod pending;
pub mod request;

mod document;
mod project;
mod question;
mod quiz;
mod validate;

pub use config::EngineConfig;
pub use error::SyncError;
pub use inflight::Lane;
pub use journal::Journal;
pub use pending::{MutationStatus, PendingMutation};
pub use request::{Outcome, Request};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;

use quizsync_cache::EntityCache;
use quizsync_core::{
    Document, EntityKey, EntityKind, Project, Question, Quiz, RecordId, Snapshot,
};
use quizsync_gateway::{Gateway, Target};

use crate::inflight::{InFlight, KeySet};
use crate::pending::PendingTable;

/// What a mutation writes into the cache before the server answers.
pub(crate) enum Effect {
    Store(Snapshot),
    Remove,
    Nothing,
}

pub(crate) struct Plan {
    /// Primary key of the mutation; a temporary key for creates.
    pub key: EntityKey,
    pub request: Request,
    pub effect: Effect,
}

struct Inner<C, G> {
    cache: C,
    gateway: G,
    config: EngineConfig,
    inflight: InFlight,
    pending: PendingTable,
    /// Temporary keys rewritten to server keys by reconciled creates, kept
    /// while some mutation still holds or waits on the temporary key.
    aliases: Mutex<HashMap<EntityKey, EntityKey>>,
}

pub struct Engine<C, G> {
    inner: Arc<Inner<C, G>>,
}

impl<C, G> Clone for Engine<C, G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C, G> Engine<C, G>
where
    C: EntityCache + 'static,
    G: Gateway + 'static,
{
    pub fn new(cache: C, gateway: G) -> Self {
        Self::with_config(cache, gateway, EngineConfig::default())
    }

    pub fn with_config(cache: C, gateway: G, config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache,
                gateway,
                config,
                inflight: InFlight::new(),
                pending: PendingTable::new(),
                aliases: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn cache(&self) -> &C {
        &self.inner.cache
    }

    pub fn gateway(&self) -> &G {
        &self.inner.gateway
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// True while a mutation holds the key, including regenerations that
    /// have no prediction to show.
    pub fn is_in_flight(&self, key: &EntityKey) -> bool {
        self.inner.inflight.is_in_flight(&self.resolve(*key))
    }

    pub fn pending(&self) -> Vec<PendingMutation> {
        self.inner.pending.list()
    }

    /// Follows temporary keys to the server key their create settled on.
    pub fn resolve(&self, key: EntityKey) -> EntityKey {
        let aliases = self.aliases();
        let mut current = key;
        while let Some(next) = aliases.get(&current) {
            current = *next;
        }
        current
    }

    /// Fetches the canonical copy of one entity and stores it.
    pub async fn load(&self, kind: EntityKind, id: impl Into<RecordId>) -> Result<Snapshot, SyncError> {
        let key = EntityKey::new(kind, id);
        let mut keys = vec![key];
        if kind == EntityKind::Question
            && let Some(question) = self.inner.cache.question(self.resolve(key).id)?
            && let Some(quiz_id) = question.quiz_id
        {
            keys.push(EntityKey::quiz(quiz_id));
        }

        let locked = self.lock(&keys, Lane::Back).await?;
        let key = self.resolve(key);
        let target = self.target(key)?;
        self.execute(
            locked,
            Plan {
                key,
                request: Request::Fetch(target),
                effect: Effect::Nothing,
            },
        )
        .await?
        .into_snapshot()
    }

    /// Forgets temporary keys that no mutation holds or waits on any more.
    fn prune_aliases(&self) {
        let inflight = &self.inner.inflight;
        self.aliases().retain(|temp, _| inflight.is_in_flight(temp));
    }

    fn aliases(&self) -> MutexGuard<'_, HashMap<EntityKey, EntityKey>> {
        match self.inner.aliases.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Acquires the markers of `keys`. A create that settles while we wait
    /// rewrites its temporary key, in which case the server key is acquired
    /// instead.
    pub(crate) async fn lock(&self, keys: &[EntityKey], lane: Lane) -> Result<KeySet, SyncError> {
        loop {
            let resolved: Vec<EntityKey> = keys.iter().map(|k| self.resolve(*k)).collect();
            let set = self.inner.inflight.acquire_all(&resolved, lane).await?;
            if resolved.iter().all(|k| self.resolve(*k) == *k) {
                return Ok(set);
            }
            drop(set);
        }
    }

    pub(crate) fn server_id(&self, key: EntityKey) -> Result<i64, SyncError> {
        let key = self.resolve(key);
        Ok(key.id.require_server(key.kind.as_str())?)
    }

    /// The server address of `key`. Questions are addressed under their quiz
    /// when the cache knows it.
    pub(crate) fn target(&self, key: EntityKey) -> Result<Target, SyncError> {
        let key = self.resolve(key);
        let id = self.server_id(key)?;
        Ok(match key.kind {
            EntityKind::Quiz => Target::Quiz(id),
            EntityKind::Question => {
                let quiz_id = match self.inner.cache.question(key.id)? {
                    Some(question) => question
                        .quiz_id
                        .map(|quiz_id| self.server_id(EntityKey::quiz(quiz_id)))
                        .transpose()?,
                    None => None,
                };
                Target::Question { quiz_id, id }
            }
            EntityKind::Project => Target::Project(id),
            EntityKind::Document => Target::Document(id),
        })
    }

    pub(crate) fn cached_quiz(&self, id: RecordId) -> Result<Quiz, SyncError> {
        let key = self.resolve(EntityKey::quiz(id));
        self.inner
            .cache
            .quiz(key.id)?
            .ok_or_else(|| SyncError::NotFound(key.to_string()))
    }

    pub(crate) fn cached_question(&self, id: RecordId) -> Result<Question, SyncError> {
        let key = self.resolve(EntityKey::question(id));
        self.inner
            .cache
            .question(key.id)?
            .ok_or_else(|| SyncError::NotFound(key.to_string()))
    }

    pub(crate) fn cached_project(&self, id: RecordId) -> Result<Project, SyncError> {
        let key = self.resolve(EntityKey::project(id));
        self.inner
            .cache
            .project(key.id)?
            .ok_or_else(|| SyncError::NotFound(key.to_string()))
    }

    pub(crate) fn cached_document(&self, id: RecordId) -> Result<Document, SyncError> {
        let key = self.resolve(EntityKey::document(id));
        self.inner
            .cache
            .document(key.id)?
            .ok_or_else(|| SyncError::NotFound(key.to_string()))
    }

    /// Runs a planned mutation under the markers in `keys`.
    ///
    /// Prediction happens before the first await. Dispatch, reconcile and
    /// rollback run on a spawned task that owns the markers, so a caller that
    /// stops waiting never leaves a prediction behind.
    pub(crate) async fn execute(&self, keys: KeySet, plan: Plan) -> Result<Outcome, SyncError> {
        let Plan {
            key,
            request,
            effect,
        } = plan;
        let label = request.label();
        let mut mutation = PendingMutation::new(label, keys.keys());

        if let Err(e) = self.predict(&mut mutation, key, effect) {
            if let Err(rollback) = mutation.journal.rollback(&self.inner.cache) {
                log::error!("{label} {key}: prediction failed ({e}) and could not be undone: {rollback}");
            }
            return Err(e);
        }
        self.inner.pending.insert(&mutation);
        log::debug!("{label} {key}: predicted, dispatching");

        let engine = self.clone();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = engine.settle(mutation, key, request).await;
            drop(keys);
            engine.prune_aliases();
            if let Err(unsent) = tx.send(result) {
                match unsent {
                    Ok(_) => log::warn!("{label} {key}: confirmed after the caller stopped waiting"),
                    Err(e) => log::warn!("{label} {key}: rolled back after the caller stopped waiting: {e}"),
                }
            }
        });

        rx.await
            .map_err(|_| SyncError::Detached(format!("{label} {key}")))?
    }

    fn predict(&self, mutation: &mut PendingMutation, key: EntityKey, effect: Effect) -> Result<(), SyncError> {
        match effect {
            Effect::Store(snapshot) => {
                mutation.prediction = Some(snapshot.clone());
                self.store(&mut mutation.journal, snapshot, key)
            }
            Effect::Remove => self.discard(&mut mutation.journal, key),
            Effect::Nothing => Ok(()),
        }
    }

    async fn settle(
        &self,
        mut mutation: PendingMutation,
        key: EntityKey,
        request: Request,
    ) -> Result<Outcome, SyncError> {
        let result = match request.send(&self.inner.gateway).await {
            Ok(outcome) => self.reconcile(&mutation, key, &outcome).map(|()| outcome),
            Err(e) => Err(SyncError::from(e)),
        };

        let label = mutation.label;
        match &result {
            Ok(_) => {
                mutation.status = MutationStatus::Confirmed;
                log::info!("{label} {key}: confirmed");
            }
            Err(e) => {
                mutation.status = MutationStatus::RolledBack;
                log::warn!("{label} {key}: rolling back: {e}");
                if let Err(rollback) = mutation.journal.clone().rollback(&self.inner.cache) {
                    log::error!("{label} {key}: rollback failed: {rollback}");
                }
            }
        }
        self.inner.pending.finish(mutation.id);
        result
    }

    fn reconcile(&self, mutation: &PendingMutation, key: EntityKey, outcome: &Outcome) -> Result<(), SyncError> {
        let mut journal = Journal::new();
        match outcome {
            Outcome::Stored(snapshot) => {
                if let Some(predicted) = &mutation.prediction {
                    log_divergence(mutation.label, predicted, snapshot);
                }
                self.store(&mut journal, snapshot.clone(), key)
            }
            Outcome::Deleted => self.discard(&mut journal, key),
        }
    }

    /// Writes `snapshot` in place of `replaces`, keeping the quiz/question
    /// index consistent: a quiz writes each of its questions under their own
    /// keys, and a question is rewritten inside its cached quiz.
    fn store(&self, journal: &mut Journal, snapshot: Snapshot, replaces: EntityKey) -> Result<(), SyncError> {
        let cache = &self.inner.cache;
        let key = snapshot.key();
        let rekey = replaces != key && cache.get(&replaces)?.is_some();

        match &snapshot {
            Snapshot::Quiz(quiz) => {
                let source = if rekey { replaces } else { key };
                if let Some(previous) = cache.quiz(source.id)? {
                    for old in &previous.questions {
                        if quiz.question(old.id).is_none() {
                            journal.remove(cache, old.key())?;
                        }
                    }
                }
                for question in &quiz.questions {
                    journal.put(cache, question.clone().into())?;
                }
            }
            Snapshot::Question(question) => {
                if let Some(quiz_id) = question.quiz_id {
                    let quiz_key = self.resolve(EntityKey::quiz(quiz_id));
                    if let Some(quiz) = cache.quiz(quiz_key.id)? {
                        let previous_id = (replaces.kind == EntityKind::Question).then_some(replaces.id);
                        journal.put(cache, quiz.with_question(question.clone(), previous_id).into())?;
                    }
                }
            }
            Snapshot::Project(_) | Snapshot::Document(_) => {}
        }

        if rekey {
            journal.swap(cache, replaces, snapshot)?;
            self.aliases().insert(replaces, key);
            log::debug!("rekeyed {replaces} -> {key}");
        } else {
            journal.put(cache, snapshot)?;
        }
        Ok(())
    }

    /// Removes `key`. A quiz takes its question keys with it; a question is
    /// dropped from its cached quiz. Projects referencing a quiz keep the
    /// reference.
    fn discard(&self, journal: &mut Journal, key: EntityKey) -> Result<(), SyncError> {
        let cache = &self.inner.cache;
        match cache.get(&key)? {
            Some(Snapshot::Quiz(quiz)) => {
                for question in &quiz.questions {
                    journal.remove(cache, question.key())?;
                }
            }
            Some(Snapshot::Question(question)) => {
                if let Some(quiz_id) = question.quiz_id
                    && let Some(quiz) = cache.quiz(self.resolve(EntityKey::quiz(quiz_id)).id)?
                {
                    journal.put(cache, quiz.without_question(question.id).into())?;
                }
            }
            _ => {}
        }
        journal.remove(cache, key)?;
        Ok(())
    }
}

fn log_divergence(label: &str, predicted: &Snapshot, confirmed: &Snapshot) {
    let predicted = predicted.with_id(confirmed.id());
    if let (Ok(expected), Ok(actual)) = (predicted.fingerprint(), confirmed.fingerprint())
        && expected != actual
    {
        log::debug!("{label} {}: server result diverged from prediction", confirmed.key());
    }
}
