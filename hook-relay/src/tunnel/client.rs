//! Tunnel agent client.
//!
//! Talks to an ngrok-agent compatible HTTP API to open one public HTTP tunnel
//! to the local listener, and closes it again on shutdown.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::types::{PublicUrl, TunnelError, TunnelOutcome};
use crate::Config;

#[derive(Serialize)]
struct StartTunnelRequest<'a> {
    name: &'a str,
    addr: String,
    proto: &'static str,
}

#[derive(Deserialize)]
struct StartTunnelResponse {
    public_url: String,
}

/// Client for the tunnel agent.
///
/// At most one tunnel is open at a time; its name is remembered so
/// [`TunnelClient::close`] can tear it down exactly once.
#[derive(Clone)]
pub struct TunnelClient {
    inner: Arc<TunnelInner>,
}

struct TunnelInner {
    api_url: String,
    auth_token: Option<String>,
    timeout: Duration,
    http: reqwest::Client,
    session: RwLock<Option<TunnelSession>>,
}

struct TunnelSession {
    name: String,
    /// `None` while the start request is still in flight
    public_url: Option<PublicUrl>,
}

impl TunnelClient {
    /// Create a client for the agent at `api_url`.
    pub fn new(api_url: impl Into<String>, auth_token: Option<String>, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(TunnelInner {
                api_url: api_url.into().trim_end_matches('/').to_string(),
                auth_token,
                timeout,
                http: reqwest::Client::new(),
                session: RwLock::new(None),
            }),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.tunnel_api_url.clone(),
            config.tunnel_auth_token.clone(),
            config.tunnel_timeout,
        )
    }

    pub fn is_configured(&self) -> bool {
        self.inner.auth_token.is_some()
    }

    /// Make a single attempt, bounded by the configured timeout, to expose
    /// `local_port` publicly.
    pub async fn establish(&self, local_port: u16) -> Result<PublicUrl, TunnelError> {
        let token = self
            .inner
            .auth_token
            .as_deref()
            .ok_or(TunnelError::NotConfigured)?;

        info!(
            api_url = %self.inner.api_url,
            local_port = local_port,
            timeout_ms = self.inner.timeout.as_millis() as u64,
            "tunnel_connecting"
        );

        tokio::time::timeout(self.inner.timeout, self.open(token, local_port))
            .await
            .map_err(|_| TunnelError::Timeout(self.inner.timeout))?
    }

    /// Like [`TunnelClient::establish`], but downgrades failure to
    /// [`TunnelOutcome::Unavailable`].
    pub async fn attempt(&self, local_port: u16) -> TunnelOutcome {
        match self.establish(local_port).await {
            Ok(url) => TunnelOutcome::Live(url),
            Err(e) => {
                warn!(error = %e, "tunnel_unavailable");
                TunnelOutcome::Unavailable(e.to_string())
            }
        }
    }

    async fn open(&self, token: &str, local_port: u16) -> Result<PublicUrl, TunnelError> {
        let name = format!("hook-relay-{}", local_port);

        // Recorded before the request goes out so close() still finds the
        // tunnel if this attempt is cancelled mid-flight.
        *self.inner.session.write().await = Some(TunnelSession {
            name: name.clone(),
            public_url: None,
        });

        let sent = self
            .inner
            .http
            .post(format!("{}/api/tunnels", self.inner.api_url))
            .bearer_auth(token)
            .json(&StartTunnelRequest {
                name: &name,
                addr: local_port.to_string(),
                proto: "http",
            })
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                self.forget_session().await;
                return Err(e.into());
            }
        };

        let status = response.status();
        if !status.is_success() {
            self.forget_session().await;
            let body = response.text().await.unwrap_or_default();
            return Err(TunnelError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        // From here on the agent has opened the tunnel; the pending session
        // stays so close() tears it down even if the response is unusable.
        let started: StartTunnelResponse = response.json().await?;
        let public_url = PublicUrl::parse(&started.public_url)?;

        if let Some(session) = self.inner.session.write().await.as_mut() {
            session.public_url = Some(public_url.clone());
        }

        info!(tunnel_name = %name, public_url = %public_url, "tunnel_established");

        Ok(public_url)
    }

    async fn forget_session(&self) {
        self.inner.session.write().await.take();
    }

    /// Tear down the open tunnel, if any.
    ///
    /// Later calls are no-ops.
    pub async fn close(&self) {
        let session = self.inner.session.write().await.take();
        let Some(session) = session else {
            return;
        };

        let mut request = self
            .inner
            .http
            .delete(format!("{}/api/tunnels/{}", self.inner.api_url, session.name))
            .timeout(self.inner.timeout);
        if let Some(token) = &self.inner.auth_token {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(
                    tunnel_name = %session.name,
                    public_url = ?session.public_url.as_ref().map(PublicUrl::as_str),
                    "tunnel_closed"
                );
            }
            Ok(resp) => {
                warn!(
                    tunnel_name = %session.name,
                    status_code = resp.status().as_u16(),
                    "tunnel_close_rejected"
                );
            }
            Err(e) => {
                warn!(tunnel_name = %session.name, error = %e, "tunnel_close_error");
            }
        }
    }
}
