//! Normalization of inbound HTTP requests into capture records.
//!
//! Nothing here rejects a request: whatever arrives is recorded.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::http::{header, HeaderMap, Method, Uri};
use chrono::Utc;
use url::form_urlencoded;

use crate::registry::{CapturedBody, CapturedRequest, QueryValue};

/// Raw parts of an inbound request, as handed over by the HTTP layer.
pub struct InboundRequest<'a> {
    pub method: &'a Method,
    pub headers: &'a HeaderMap,
    pub raw_query: Option<&'a str>,
    pub body: &'a [u8],
    pub remote_addr: Option<SocketAddr>,
}

/// Build the capture record for an inbound request.
pub fn capture_request(request: InboundRequest<'_>, trust_proxy: bool) -> CapturedRequest {
    CapturedRequest {
        timestamp: Utc::now(),
        method: request.method.as_str().to_string(),
        headers: capture_headers(request.headers),
        body: capture_body(request.headers, request.body),
        query: capture_query(request.raw_query),
        ip: client_ip(request.headers, request.remote_addr, trust_proxy),
    }
}

/// Flatten headers into a name → value map.
///
/// Names are already lowercase in `HeaderMap`. Repeated headers are joined
/// with `", "` in arrival order.
pub fn capture_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut captured: BTreeMap<String, String> = BTreeMap::new();

    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        match captured.get_mut(name.as_str()) {
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            None => {
                captured.insert(name.as_str().to_string(), value.into_owned());
            }
        }
    }

    captured
}

/// Parse a raw query string; repeated keys collect into a list.
pub fn capture_query(raw_query: Option<&str>) -> BTreeMap<String, QueryValue> {
    let mut query: BTreeMap<String, QueryValue> = BTreeMap::new();

    let Some(raw) = raw_query else {
        return query;
    };

    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        let value = value.into_owned();
        match query.get_mut(&*key) {
            Some(existing) => existing.push(value),
            None => {
                query.insert(key.into_owned(), QueryValue::One(value));
            }
        }
    }

    query
}

/// Classify a request body.
///
/// JSON-declared bodies that parse are kept as structured values; anything
/// else non-empty is kept as lossy UTF-8 text. Read-back clients therefore
/// see `body` as either a JSON value or a string, even for JSON-declared
/// payloads that failed to parse.
pub fn capture_body(headers: &HeaderMap, body: &[u8]) -> CapturedBody {
    if body.is_empty() {
        return CapturedBody::Absent;
    }

    if is_json_content_type(headers) {
        if let Ok(value) = serde_json::from_slice(body) {
            return CapturedBody::Json(value);
        }
    }

    CapturedBody::Text(String::from_utf8_lossy(body).into_owned())
}

/// Whether the request declares a JSON payload (`application/json` or any
/// `+json` media type).
pub fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };

    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    media_type == "application/json" || media_type.ends_with("+json")
}

/// Best-effort sender address.
pub fn client_ip(
    headers: &HeaderMap,
    remote_addr: Option<SocketAddr>,
    trust_proxy: bool,
) -> Option<String> {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return Some(ip.to_string());
        }
    }

    remote_addr.map(|addr| addr.ip().to_canonical().to_string())
}

/// Base URL of the service as seen by the requesting client.
///
/// Falls back to `fallback` when the request names no host.
pub fn request_base_url(
    headers: &HeaderMap,
    uri: &Uri,
    trust_proxy: bool,
    fallback: &str,
) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.as_str().to_string()));

    let Some(host) = host else {
        return fallback.to_string();
    };

    let scheme = trust_proxy
        .then(|| {
            headers
                .get("x-forwarded-proto")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(|v| v.trim().to_ascii_lowercase())
        })
        .flatten()
        .filter(|s| s == "http" || s == "https")
        .or_else(|| uri.scheme_str().map(str::to_string))
        .unwrap_or_else(|| "http".to_string());

    format!("{}://{}", scheme, host)
}
