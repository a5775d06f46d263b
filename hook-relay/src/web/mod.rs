//! Capture gateway.
//!
//! This module provides the HTTP surface of the relay:
//! - `POST /api/webhooks/create` provisions an endpoint
//! - `ANY /webhook/:id` records whatever arrives
//! - `GET /api/webhooks/:id` returns the captured history
//! - `GET /api/health` and `GET /api/public-url` report liveness and identity

pub mod capture;
pub mod handlers;
pub mod startup;

use axum::{
    routing::{any, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use handlers::{
    capture_webhook, create_webhook, get_webhook, health, public_url, ApiError, AppState,
    CaptureResponse, CreateWebhookResponse, ErrorResponse, HealthResponse, PublicUrlResponse,
};
pub use startup::expose_and_seed;

/// Build the gateway router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/webhooks/create", post(create_webhook))
        .route("/api/webhooks/:id", get(get_webhook))
        .route("/webhook/:id", any(capture_webhook))
        .route("/api/health", get(health))
        .route("/api/public-url", get(public_url))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CapturedBody, Endpoint, QueryValue, Registry};
    use crate::web::capture::{capture_request, InboundRequest};
    use crate::tunnel::{Exposure, PublicUrl, TunnelOutcome};
    use crate::Config;
    use axum::{
        body::Body,
        extract::ConnectInfo,
        http::{HeaderMap, Method, Request, StatusCode},
        response::Response,
    };
    use serde::de::DeserializeOwned;
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use tower::ServiceExt; // For `oneshot`

    fn test_state(config: Config) -> AppState {
        AppState::new(config, Registry::new(), Exposure::new())
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> T {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn create(state: &AppState) -> CreateWebhookResponse {
        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/webhooks/create")
                    .header("host", "relay.test:3001")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        read_json(response).await
    }

    async fn read_back(state: &AppState, id: &str) -> Response {
        router(state.clone())
            .oneshot(
                Request::builder()
                    .uri(format!("/api/webhooks/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_uses_request_host() {
        let state = test_state(Config::default());
        let created = create(&state).await;

        assert_eq!(created.webhook_id.len(), 32);
        assert_eq!(
            created.webhook_url,
            format!("http://relay.test:3001/webhook/{}", created.webhook_id)
        );

        let stored = state.registry.get(&created.webhook_id).await.unwrap();
        assert_eq!(stored.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_create_prefers_public_url() {
        let state = test_state(Config::default());
        state
            .exposure
            .set(TunnelOutcome::Live(
                PublicUrl::parse("https://abc123.ngrok.app").unwrap(),
            ))
            .await;

        let created = create(&state).await;
        assert_eq!(
            created.webhook_url,
            format!("https://abc123.ngrok.app/webhook/{}", created.webhook_id)
        );
    }

    #[tokio::test]
    async fn test_capture_then_read_back() {
        let state = test_state(Config::default());
        let created = create(&state).await;

        let mut request = Request::builder()
            .method("GET")
            .uri(format!("/webhook/{}?x=1", created.webhook_id))
            .header("X-Test", "1")
            .body(Body::empty())
            .unwrap();
        let remote: SocketAddr = "198.51.100.4:55000".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(remote));

        let response = router(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let ack: Value = read_json(response).await;
        assert_eq!(
            ack,
            json!({"message": "Webhook received successfully", "webhookId": created.webhook_id})
        );

        let response = read_back(&state, &created.webhook_id).await;
        assert_eq!(response.status(), StatusCode::OK);
        let endpoint: Endpoint = read_json(response).await;

        assert_eq!(endpoint.id, created.webhook_id);
        assert_eq!(endpoint.url, created.webhook_url);
        assert_eq!(endpoint.requests.len(), 1);

        let captured = &endpoint.requests[0];
        assert_eq!(captured.method, "GET");
        assert_eq!(captured.query["x"], QueryValue::One("1".to_string()));
        assert_eq!(captured.headers["x-test"], "1");
        assert_eq!(captured.body, CapturedBody::Absent);
        assert_eq!(captured.ip, Some("198.51.100.4".to_string()));
    }

    #[tokio::test]
    async fn test_capture_json_and_malformed_payloads() {
        let state = test_state(Config::default());
        let created = create(&state).await;

        for body in [r#"{"event":"ping"}"#, "{oops"] {
            let response = router(state.clone())
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri(format!("/webhook/{}", created.webhook_id))
                        .header("content-type", "application/json")
                        .body(Body::from(body))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let endpoint = state.registry.get(&created.webhook_id).await.unwrap();
        assert_eq!(endpoint.requests.len(), 2);
        assert_eq!(endpoint.requests[0].body, CapturedBody::Json(json!({"event": "ping"})));
        assert_eq!(endpoint.requests[1].body, CapturedBody::Text("{oops".to_string()));
        assert_eq!(endpoint.requests[0].ip, None);
    }

    #[tokio::test]
    async fn test_capture_any_method() {
        let state = test_state(Config::default());
        let created = create(&state).await;

        // OPTIONS is answered by the CORS layer as a preflight
        for method in ["PUT", "PATCH", "DELETE", "HEAD"] {
            let response = router(state.clone())
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri(format!("/webhook/{}", created.webhook_id))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "method {}", method);
        }

        let methods: Vec<String> = state
            .registry
            .get(&created.webhook_id)
            .await
            .unwrap()
            .requests
            .into_iter()
            .map(|r| r.method)
            .collect();
        assert_eq!(methods, vec!["PUT", "PATCH", "DELETE", "HEAD"]);
    }

    #[tokio::test]
    async fn test_capture_unknown_webhook() {
        let state = test_state(Config::default());
        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook/doesnotexist")
                    .body(Body::from("payload"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: Value = read_json(response).await;
        assert_eq!(body, json!({"error": "Webhook not found"}));
        assert_eq!(state.registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_read_back_unknown_webhook() {
        let state = test_state(Config::default());
        let response = read_back(&state, "doesnotexist").await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: Value = read_json(response).await;
        assert_eq!(body, json!({"error": "Webhook not found"}));
    }

    #[tokio::test]
    async fn test_read_back_body_shapes() {
        let state = test_state(Config::default());
        let created = create(&state).await;

        for (content_type, body) in [
            ("application/json", r#"{"event":"ping"}"#),
            ("application/json", "{oops"),
            ("text/plain", "hello"),
            ("text/plain", ""),
        ] {
            router(state.clone())
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri(format!("/webhook/{}", created.webhook_id))
                        .header("content-type", content_type)
                        .body(Body::from(body))
                        .unwrap(),
                )
                .await
                .unwrap();
        }

        let response = read_back(&state, &created.webhook_id).await;
        let endpoint: Value = read_json(response).await;
        let bodies: Vec<&Value> = endpoint["requests"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| &r["body"])
            .collect();
        assert_eq!(
            bodies,
            vec![&json!({"event": "ping"}), &json!("{oops"), &json!("hello"), &Value::Null]
        );

        // Typed read-back keeps text bodies as text
        let response = read_back(&state, &created.webhook_id).await;
        let endpoint: Endpoint = read_json(response).await;
        assert_eq!(endpoint.requests[1].body, CapturedBody::Text("{oops".to_string()));
        assert_eq!(endpoint.requests[2].body, CapturedBody::Text("hello".to_string()));
    }

    #[tokio::test]
    async fn test_read_back_is_stable() {
        let state = test_state(Config::default());
        let created = create(&state).await;
        state
            .registry
            .append(
                &created.webhook_id,
                capture_request(
                    InboundRequest {
                        method: &Method::POST,
                        headers: &HeaderMap::new(),
                        raw_query: Some("a=1"),
                        body: b"hello",
                        remote_addr: None,
                    },
                    false,
                ),
            )
            .await
            .unwrap();

        let first = axum::body::to_bytes(
            read_back(&state, &created.webhook_id).await.into_body(),
            usize::MAX,
        )
        .await
        .unwrap();
        let second = axum::body::to_bytes(
            read_back(&state, &created.webhook_id).await.into_body(),
            usize::MAX,
        )
        .await
        .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_health_counts_webhooks() {
        let state = test_state(Config::default());
        create(&state).await;
        create(&state).await;

        let response = router(state.clone())
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = read_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["activeWebhooks"], 2);
        assert!(body["uptime"].as_f64().unwrap() >= 0.0);
        assert!(body.get("publicUrl").is_none());
        assert!(body.get("isLive").is_none());
    }

    #[tokio::test]
    async fn test_health_reports_exposure() {
        let state = test_state(Config {
            tunnel_auth_token: Some("token".to_string()),
            ..Config::default()
        });

        let response = router(state.clone())
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body: HealthResponse = read_json(response).await;
        assert_eq!(body.is_live, Some(false));
        assert_eq!(body.public_url, None);

        state
            .exposure
            .set(TunnelOutcome::Live(
                PublicUrl::parse("https://abc123.ngrok.app").unwrap(),
            ))
            .await;

        let response = router(state.clone())
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body: HealthResponse = read_json(response).await;
        assert_eq!(body.is_live, Some(true));
        assert_eq!(body.public_url.as_deref(), Some("https://abc123.ngrok.app"));
    }

    #[tokio::test]
    async fn test_public_url_endpoint() {
        let state = test_state(Config {
            port: 3005,
            ..Config::default()
        });

        let response = router(state.clone())
            .oneshot(Request::builder().uri("/api/public-url").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body: Value = read_json(response).await;
        assert_eq!(
            body,
            json!({"publicUrl": null, "isLive": false, "localUrl": "http://localhost:3005"})
        );

        state
            .exposure
            .set(TunnelOutcome::Live(
                PublicUrl::parse("https://abc123.ngrok.app").unwrap(),
            ))
            .await;

        let response = router(state.clone())
            .oneshot(Request::builder().uri("/api/public-url").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body: PublicUrlResponse = read_json(response).await;
        assert!(body.is_live);
        assert_eq!(body.public_url.as_deref(), Some("https://abc123.ngrok.app"));
        assert_eq!(body.local_url, "http://localhost:3005");
    }
}
