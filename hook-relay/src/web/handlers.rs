//! Gateway endpoint handlers.
//!
//! Handlers translate HTTP requests into registry operations and back. The
//! capture handler acknowledges every request addressed to a known webhook,
//! whatever its payload.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, RawQuery, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::registry::{Endpoint, Registry, RegistryError};
use crate::tunnel::Exposure;
use crate::web::capture::{capture_request, request_base_url, InboundRequest};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Registry,
    pub exposure: Exposure,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config, registry: Registry, exposure: Exposure) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            exposure,
            started_at: Instant::now(),
        }
    }

    /// Public base URL if established, otherwise the local one.
    pub async fn preferred_base_url(&self) -> String {
        match self.exposure.public_url().await {
            Some(url) => url.to_string(),
            None => self.config.local_url(),
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Errors surfaced by the gateway.
#[derive(Debug)]
pub enum ApiError {
    WebhookNotFound(String),
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => ApiError::WebhookNotFound(id),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::WebhookNotFound(id) => {
                warn!(webhook_id = %id, "webhook_not_found");
                (
                    StatusCode::NOT_FOUND,
                    Json(ErrorResponse {
                        error: "Webhook not found".to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

// =============================================================================
// Create Webhook
// =============================================================================

/// Response for webhook creation.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWebhookResponse {
    pub webhook_id: String,
    pub webhook_url: String,
    pub created_at: DateTime<Utc>,
}

impl From<Endpoint> for CreateWebhookResponse {
    fn from(endpoint: Endpoint) -> Self {
        Self {
            webhook_id: endpoint.id,
            webhook_url: endpoint.url,
            created_at: endpoint.created_at,
        }
    }
}

/// POST /api/webhooks/create
///
/// Embeds the public base URL when one is established, otherwise the base
/// URL the client used to reach us.
pub async fn create_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> Json<CreateWebhookResponse> {
    let base_url = match state.exposure.public_url().await {
        Some(url) => url.to_string(),
        None => request_base_url(
            &headers,
            &uri,
            state.config.trust_proxy,
            &state.config.local_url(),
        ),
    };

    let endpoint = state.registry.create(&base_url).await;

    Json(endpoint.into())
}

// =============================================================================
// Capture
// =============================================================================

/// Capture acknowledgement.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResponse {
    pub message: String,
    pub webhook_id: String,
}

/// ANY /webhook/:id
pub async fn capture_webhook(
    State(state): State<AppState>,
    Path(id): Path<String>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    headers: HeaderMap,
    RawQuery(raw_query): RawQuery,
    body: Bytes,
) -> Result<Json<CaptureResponse>, ApiError> {
    if !state.registry.contains(&id).await {
        return Err(ApiError::WebhookNotFound(id));
    }

    let captured = capture_request(
        InboundRequest {
            method: &method,
            headers: &headers,
            raw_query: raw_query.as_deref(),
            body: &body,
            remote_addr: connect_info.map(|ConnectInfo(addr)| addr),
        },
        state.config.trust_proxy,
    );

    let has_body = !captured.body.is_absent();
    let ip = captured.ip.clone();
    let total = state.registry.append(&id, captured).await?;

    info!(
        webhook_id = %id,
        method = %method,
        has_body = has_body,
        body_length = body.len(),
        ip = ?ip,
        total_requests = total,
        "webhook_received"
    );

    Ok(Json(CaptureResponse {
        message: "Webhook received successfully".to_string(),
        webhook_id: id,
    }))
}

// =============================================================================
// Read-back
// =============================================================================

/// GET /api/webhooks/:id
///
/// Each captured `body` is `null` when empty, the parsed value for JSON
/// payloads, and a string otherwise. Malformed JSON is returned as a string too.
pub async fn get_webhook(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Endpoint>, ApiError> {
    let endpoint = state.registry.get(&id).await?;
    Ok(Json(endpoint))
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub active_webhooks: usize,
    /// Seconds since the service started
    pub uptime: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_live: Option<bool>,
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let public_url = state.exposure.public_url().await.map(|url| url.to_string());
    let is_live = state
        .config
        .exposure_configured()
        .then_some(public_url.is_some());

    Json(HealthResponse {
        status: "ok".to_string(),
        active_webhooks: state.registry.count().await,
        uptime: state.started_at.elapsed().as_secs_f64(),
        public_url,
        is_live,
    })
}

// =============================================================================
// Public URL
// =============================================================================

/// Public URL response; `public_url` is `null` until established.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUrlResponse {
    pub public_url: Option<String>,
    pub is_live: bool,
    pub local_url: String,
}

/// GET /api/public-url
pub async fn public_url(State(state): State<AppState>) -> Json<PublicUrlResponse> {
    let public_url = state.exposure.public_url().await.map(|url| url.to_string());

    Json(PublicUrlResponse {
        is_live: public_url.is_some(),
        public_url,
        local_url: state.config.local_url(),
    })
}
