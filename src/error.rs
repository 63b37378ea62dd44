//! Error types for catalog fetches, limiter configuration and commands.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A producer failed to deliver a value.
///
/// Cloneable so one failure can be handed to every caller that joined the
/// same in-flight fetch.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: Arc<reqwest::Error>,
    },

    #[error("{url} responded with status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("malformed payload from {url}: {source}")]
    Malformed {
        url: String,
        #[source]
        source: Arc<serde_json::Error>,
    },

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    /// For producers to report that their upstream work was abandoned.
    #[error("fetch was cancelled")]
    Cancelled,

    #[error("producer panicked: {0}")]
    Panicked(String),

    /// For producers whose failure fits none of the variants above.
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    pub fn request(url: &str, err: reqwest::Error) -> Self {
        Self::Request {
            url: url.to_string(),
            source: Arc::new(err),
        }
    }

    pub fn malformed(url: &str, err: serde_json::Error) -> Self {
        Self::Malformed {
            url: url.to_string(),
            source: Arc::new(err),
        }
    }
}

/// Invalid limiter or settings configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cooldown period must be greater than zero")]
    ZeroPeriod,

    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
}

/// Failures surfaced to the command layer.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("that command is on cooldown, try again in {:.1}s", .retry_after.as_secs_f64())]
    OnCooldown { retry_after: Duration },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
