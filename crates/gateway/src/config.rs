use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_BASE_URL: &str = "QUIZSYNC_API_URL";
pub const ENV_TOKEN: &str = "QUIZSYNC_API_TOKEN";
pub const ENV_TIMEOUT_SECS: &str = "QUIZSYNC_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Reads configuration from the environment, loading a `.env` file
    /// first when one exists. Unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        if dotenv::dotenv().is_err() {
            log::debug!("no .env file loaded");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_BASE_URL).filter(|s| !s.is_empty()) {
            config.base_url = url;
        }
        config.token = lookup(ENV_TOKEN).filter(|s| !s.is_empty());
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            match raw.parse::<u64>() {
                Ok(secs) => config.timeout = Duration::from_secs(secs),
                Err(_) => log::warn!("ignoring {ENV_TIMEOUT_SECS}={raw}: not a number of seconds"),
            }
        }
        config
    }

    /// Base URL without a trailing slash.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
