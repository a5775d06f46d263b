//! Record types held by the registry.
//!
//! These are also the wire format of the read-back API: an [`Endpoint`]
//! serializes to `{id, url, createdAt, requests}` and every
//! [`CapturedRequest`] to `{timestamp, method, headers, body, query, ip}`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Endpoint
// =============================================================================

/// A provisioned capture target and its request history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Opaque id, also the last path segment of `url`
    pub id: String,
    /// Full externally reachable address of this endpoint
    pub url: String,
    /// Creation time, set once
    pub created_at: DateTime<Utc>,
    /// Captured requests in arrival order
    pub requests: Vec<CapturedRequest>,
}

impl Endpoint {
    /// Create an endpoint with an empty history.
    ///
    /// The URL is `<base_url>/webhook/<id>`; a trailing slash on the base is
    /// dropped so callers can pass either form.
    pub fn new(id: String, base_url: &str) -> Self {
        let url = endpoint_url(base_url, &id);
        Self {
            id,
            url,
            created_at: Utc::now(),
            requests: Vec::new(),
        }
    }
}

/// Build the public URL of an endpoint from a base URL.
pub fn endpoint_url(base_url: &str, id: &str) -> String {
    format!("{}/webhook/{}", base_url.trim_end_matches('/'), id)
}

// =============================================================================
// Captured Request
// =============================================================================

/// One observed inbound call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedRequest {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    /// Lowercase header name to value; repeated headers are joined with `", "`
    pub headers: BTreeMap<String, String>,
    pub body: CapturedBody,
    pub query: BTreeMap<String, QueryValue>,
    /// Best-effort sender address
    pub ip: Option<String>,
}

/// Payload of a captured request.
///
/// Serialized untagged: `null` when absent, the parsed value for JSON, and a
/// plain string for anything else.
///
/// Deserializing tries `Text` before `Json`, so any string reads back as
/// `Text`, including a JSON payload that was itself a string literal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CapturedBody {
    /// No body, or an empty one
    #[default]
    Absent,
    /// Any other body, decoded lossily as UTF-8
    Text(String),
    /// Body declared as JSON that parsed successfully
    Json(serde_json::Value),
}

impl CapturedBody {
    pub fn is_absent(&self) -> bool {
        matches!(self, CapturedBody::Absent)
    }
}

/// Value of a query-string parameter.
///
/// A parameter seen once is a plain string; a repeated one keeps every value
/// in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    One(String),
    Many(Vec<String>),
}

impl QueryValue {
    /// Add another occurrence of the same parameter.
    pub fn push(&mut self, value: String) {
        match self {
            QueryValue::One(first) => {
                let first = std::mem::take(first);
                *self = QueryValue::Many(vec![first, value]);
            }
            QueryValue::Many(values) => values.push(value),
        }
    }
}
