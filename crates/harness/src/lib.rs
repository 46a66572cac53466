//! Test support: a mock quiz service and an engine wired to it.

pub mod fixtures;
pub mod server;

pub use server::MockServer;

use std::sync::Arc;
use std::time::Duration;

use quizsync_cache::{EntityCache, MemoryCache};
use quizsync_core::{EntityKey, EntityKind, Question, Quiz, RecordId, Snapshot};
use quizsync_engine::{Engine, SyncError};

pub fn init_logging() {
    let _ = pretty_env_logger::try_init();
}

/// An engine talking to its own mock server.
pub struct TestClient<C: EntityCache + 'static = Arc<MemoryCache>> {
    pub server: Arc<MockServer>,
    pub engine: Engine<C, Arc<MockServer>>,
}

impl TestClient {
    pub fn new() -> Self {
        Self::with_cache(Arc::new(MemoryCache::new()))
    }
}

impl Default for TestClient {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: EntityCache + 'static> TestClient<C> {
    pub fn with_cache(cache: C) -> Self {
        init_logging();
        let server = Arc::new(MockServer::new());
        Self {
            engine: Engine::new(cache, Arc::clone(&server)),
            server,
        }
    }

    /// Seeds `quiz` on the server and loads it into the cache.
    pub async fn hydrate_quiz(&self, quiz: Quiz) -> Result<Quiz, SyncError> {
        let seeded = self.server.seed_quiz(quiz);
        let loaded = self.engine.load(EntityKind::Quiz, seeded.id).await?;
        Ok(loaded.into_quiz()?)
    }

    pub fn cached(&self, key: EntityKey) -> Result<Option<Snapshot>, SyncError> {
        Ok(self.engine.cache().get(&key)?)
    }

    pub fn cached_quiz(&self, id: impl Into<RecordId>) -> Result<Option<Quiz>, SyncError> {
        Ok(self.engine.cache().quiz(id.into())?)
    }

    pub fn cached_question(&self, id: impl Into<RecordId>) -> Result<Option<Question>, SyncError> {
        Ok(self.engine.cache().question(id.into())?)
    }

    /// Every cached snapshot, ordered by key.
    pub fn dump(&self) -> Result<Vec<Snapshot>, SyncError> {
        let cache = self.engine.cache();
        let mut snapshots = Vec::new();
        for kind in [EntityKind::Quiz, EntityKind::Question, EntityKind::Project, EntityKind::Document] {
            for key in cache.keys(kind)? {
                if let Some(snapshot) = cache.get(&key)? {
                    snapshots.push(snapshot);
                }
            }
        }
        Ok(snapshots)
    }

    /// Waits until no mutation is pending. False if that takes longer than
    /// `within`.
    pub async fn settle(&self, within: Duration) -> bool {
        tokio::time::timeout(within, async {
            while !self.engine.pending().is_empty() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .is_ok()
    }
}
