//! Service configuration loaded from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::handlers::DEFAULT_CHECKS_DEBOUNCE;

pub const ENV_BIND: &str = "MERGE_QUEUE_BIND";
pub const ENV_WEBHOOK_SECRET: &str = "GITHUB_WEBHOOK_SECRET";
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_STATE_FILE: &str = "MERGE_QUEUE_STATE_FILE";
pub const ENV_STATUS_CONTEXT: &str = "MERGE_QUEUE_STATUS_CONTEXT";
pub const ENV_CHECKS_DEBOUNCE_MS: &str = "MERGE_QUEUE_CHECKS_DEBOUNCE_MS";

pub const DEFAULT_BIND: &str = "0.0.0.0:3000";
pub const DEFAULT_STATUS_CONTEXT: &str = "merge-queue";
/// `EnvFilter` directives used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "merge_queue=debug";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Clone)]
pub struct ServiceConfig {
    pub bind: SocketAddr,
    pub webhook_secret: Vec<u8>,
    /// Statuses are only logged when absent.
    pub github_token: Option<String>,
    /// Queue state is kept in memory only when absent.
    pub state_file: Option<PathBuf>,
    pub status_context: String,
    pub checks_debounce: Duration,
}

impl ServiceConfig {
    /// A config with defaults for everything but the webhook secret.
    pub fn new(webhook_secret: impl Into<Vec<u8>>) -> Self {
        ServiceConfig {
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            webhook_secret: webhook_secret.into(),
            github_token: None,
            state_file: None,
            status_context: DEFAULT_STATUS_CONTEXT.to_string(),
            checks_debounce: DEFAULT_CHECKS_DEBOUNCE,
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds a config from an arbitrary variable source. Empty values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let secret = get(ENV_WEBHOOK_SECRET).ok_or(ConfigError::Missing(ENV_WEBHOOK_SECRET))?;
        let mut config = ServiceConfig::new(secret);

        let bind = get(ENV_BIND).unwrap_or_else(|| DEFAULT_BIND.to_string());
        config.bind = bind.parse().map_err(|_| ConfigError::Invalid {
            var: ENV_BIND,
            value: bind.clone(),
        })?;

        config.github_token = get(ENV_GITHUB_TOKEN);
        config.state_file = get(ENV_STATE_FILE).map(PathBuf::from);
        if let Some(context) = get(ENV_STATUS_CONTEXT) {
            config.status_context = context;
        }

        if let Some(ms) = get(ENV_CHECKS_DEBOUNCE_MS) {
            let millis: u64 = ms.parse().map_err(|_| ConfigError::Invalid {
                var: ENV_CHECKS_DEBOUNCE_MS,
                value: ms.clone(),
            })?;
            config.checks_debounce = Duration::from_millis(millis);
        }

        Ok(config)
    }

    /// Where PR info is persisted: next to the queue state file.
    pub fn pr_info_file(&self) -> Option<PathBuf> {
        self.state_file
            .as_ref()
            .map(|path| path.with_extension("pr-info.json"))
    }

    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    pub fn with_github_token(mut self, token: impl Into<String>) -> Self {
        self.github_token = Some(token.into());
        self
    }

    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_file = Some(path.into());
        self
    }

    pub fn with_status_context(mut self, context: impl Into<String>) -> Self {
        self.status_context = context.into();
        self
    }

    pub fn with_checks_debounce(mut self, debounce: Duration) -> Self {
        self.checks_debounce = debounce;
        self
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("bind", &self.bind)
            .field("github_token", &self.github_token.as_ref().map(|_| "<redacted>"))
            .field("state_file", &self.state_file)
            .field("status_context", &self.status_context)
            .field("checks_debounce", &self.checks_debounce)
            .finish_non_exhaustive()
    }
}
