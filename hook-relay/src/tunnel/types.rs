//! Tunnel outcome and exposure state types.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use url::Url;

/// Why a public base URL could not be established.
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("tunnel not configured")]
    NotConfigured,

    #[error("tunnel establishment timed out after {0:?}")]
    Timeout(Duration),

    #[error("tunnel agent unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("tunnel agent rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid public url {0:?}")]
    InvalidUrl(String),
}

/// A validated, externally reachable base URL without a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicUrl(String);

impl PublicUrl {
    /// Accept only absolute `http`/`https` URLs with a host.
    pub fn parse(raw: &str) -> Result<Self, TunnelError> {
        let url = Url::parse(raw.trim()).map_err(|_| TunnelError::InvalidUrl(raw.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(TunnelError::InvalidUrl(raw.to_string()));
        }

        Ok(Self(url.as_str().trim_end_matches('/').to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PublicUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a single exposure attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelOutcome {
    Live(PublicUrl),
    Unavailable(String),
}

/// Current public exposure of the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExposureState {
    /// Startup attempt still in flight
    #[default]
    Pending,
    Live(PublicUrl),
    Unavailable(String),
}

impl From<TunnelOutcome> for ExposureState {
    fn from(outcome: TunnelOutcome) -> Self {
        match outcome {
            TunnelOutcome::Live(url) => ExposureState::Live(url),
            TunnelOutcome::Unavailable(reason) => ExposureState::Unavailable(reason),
        }
    }
}

/// Shared accessor for the exposure outcome.
///
/// Handlers read it instead of depending on when the startup attempt
/// finished.
#[derive(Debug, Clone, Default)]
pub struct Exposure {
    state: Arc<RwLock<ExposureState>>,
}

impl Exposure {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, state: impl Into<ExposureState>) {
        *self.state.write().await = state.into();
    }

    pub async fn state(&self) -> ExposureState {
        self.state.read().await.clone()
    }

    /// Established public base URL, if any.
    pub async fn public_url(&self) -> Option<PublicUrl> {
        match &*self.state.read().await {
            ExposureState::Live(url) => Some(url.clone()),
            _ => None,
        }
    }

    pub async fn is_live(&self) -> bool {
        matches!(*self.state.read().await, ExposureState::Live(_))
    }
}
