use quizsync_cache::CacheError;
use quizsync_core::CoreError;
use quizsync_gateway::GatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("server rejected request (status {status:?}): {detail}")]
    ServerRejected { status: Option<u16>, detail: String },

    #[error("authentication expired")]
    AuthExpired,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("mutation task ended without a result: {0}")]
    Detached(String),
}

impl SyncError {
    /// Whether the same request may succeed if the user tries again unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::ServerRejected {
                status: Some(status),
                ..
            } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<GatewayError> for SyncError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Network(msg) => Self::Network(msg),
            GatewayError::Rejected { status, detail } => Self::ServerRejected { status, detail },
            GatewayError::AuthExpired => Self::AuthExpired,
            GatewayError::NotFound(what) => Self::NotFound(what),
        }
    }
}
