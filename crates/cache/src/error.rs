use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("cache lock poisoned during {0}")]
    LockPoisoned(&'static str),

    #[error("core error: {0}")]
    Core(#[from] quizsync_core::CoreError),
}
