//! Rate limit decision endpoints.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::client::{client_identity, ClientAddr};
use super::response::DecisionResponse;
use super::state::AppState;
use crate::error::{Result, TurnstileError};
use crate::ratelimit::RateLimitKey;

/// Body of `POST /v1/ratelimit`.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckRequest {
    pub key: String,
    pub window_ms: u64,
    pub max: u64,
}

/// Optional body of `POST /v1/ratelimit/{purpose}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PurposeCheckRequest {
    /// Client identifier supplied by the calling route handler
    #[serde(default)]
    pub client: Option<String>,
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/ratelimit", post(check))
        .route("/v1/ratelimit/{purpose}", post(check_purpose))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Check an explicit key, window and maximum.
async fn check(State(state): State<AppState>, body: Bytes) -> Result<DecisionResponse> {
    let request: CheckRequest = parse_body(&body)?;

    let decision = state
        .limiter
        .check_and_consume(&request.key, request.window_ms, request.max)
        .await
        .inspect_err(|e| warn!(key = %request.key, error = %e, "Rejected rate limit request"))?;

    info!(
        key = %request.key,
        allowed = decision.allowed,
        remaining = decision.remaining,
        "Rate limit decision made"
    );

    Ok(DecisionResponse(decision))
}

/// Check the configured policy for a purpose on behalf of a client.
async fn check_purpose(
    State(state): State<AppState>,
    Path(purpose): Path<String>,
    ClientAddr(peer): ClientAddr,
    headers: HeaderMap,
    body: Bytes,
) -> Result<DecisionResponse> {
    let request: PurposeCheckRequest = if body.is_empty() {
        PurposeCheckRequest::default()
    } else {
        parse_body(&body)?
    };

    let quota = state
        .policies
        .find_quota(&purpose)
        .ok_or_else(|| TurnstileError::UnknownPurpose(purpose.clone()))?;

    let client = request
        .client
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| client_identity(&headers, peer, state.trust_forwarded_headers));

    let key = RateLimitKey::new(purpose, client);
    let decision = state.limiter.check(&key, quota).await?;

    info!(
        key = %key,
        allowed = decision.allowed,
        remaining = decision.remaining,
        "Rate limit decision made"
    );

    Ok(DecisionResponse(decision))
}

/// Decode a JSON body; any shape or type error is the caller's fault.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body)
        .map_err(|e| TurnstileError::InvalidArgument(format!("invalid body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{ManualClock, MemoryStore, PolicyTable, RateLimitRules, RateLimiter};
    use axum::body::{to_bytes, Body};
    use axum::http::header::RETRY_AFTER;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    const RULES: &str = r#"
policies:
  - purpose: site-submission
    requests_per_unit: 2
    unit: minute
"#;

    fn test_state() -> AppState {
        let limiter = RateLimiter::with_parts(
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(0)),
        );
        let policies = PolicyTable::new(RateLimitRules::from_yaml(RULES).unwrap());
        AppState::new(Arc::new(limiter), Arc::new(policies))
    }

    fn json_post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_check_allows_then_rejects() {
        let app = router(test_state());
        let body = r#"{"key":"contact:203.0.113.7","window_ms":60000,"max":1}"#;

        let response = app.clone().oneshot(json_post("/v1/ratelimit", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "allowed": true, "remaining": 0, "retry_after_secs": 0 })
        );

        let response = app.oneshot(json_post("/v1/ratelimit", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "60");
    }

    #[tokio::test]
    async fn test_check_empty_key_is_bad_request() {
        let app = router(test_state());
        let body = r#"{"key":"","window_ms":60000,"max":1}"#;

        let response = app.oneshot(json_post("/v1/ratelimit", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_check_malformed_bodies_are_json_bad_requests() {
        let app = router(test_state());
        let bodies = [
            r#"{"key":"a","window_ms":-1,"max":1}"#,
            r#"{"key":"a"}"#,
            "not json",
        ];

        for body in bodies {
            let response = app.clone().oneshot(json_post("/v1/ratelimit", body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
            assert!(body_json(response).await["error"].is_string());
        }
    }

    #[tokio::test]
    async fn test_check_without_content_type_is_accepted() {
        let app = router(test_state());
        let request = Request::post("/v1/ratelimit")
            .body(Body::from(r#"{"key":"a","window_ms":60000,"max":1}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_purpose_uses_policy_and_body_client() {
        let state = test_state();
        let app = router(state.clone());
        let body = r#"{"client":"203.0.113.7"}"#;

        for expected in [StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS] {
            let response = app
                .clone()
                .oneshot(json_post("/v1/ratelimit/site-submission", body))
                .await
                .unwrap();
            assert_eq!(response.status(), expected);
        }

        // A different client has its own window
        let response = app
            .oneshot(json_post(
                "/v1/ratelimit/site-submission",
                r#"{"client":"203.0.113.8"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.limiter.tracked_keys().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_purpose_without_body_falls_back_to_unknown() {
        let state = test_state();
        let app = router(state.clone());

        let request = Request::post("/v1/ratelimit/site-submission")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let decision = state
            .limiter
            .check_and_consume("site-submission:unknown", 60_000, 2)
            .await
            .unwrap();
        assert_eq!(decision.remaining, 0);
    }

    #[tokio::test]
    async fn test_purpose_trusts_forwarded_header_when_enabled() {
        let state = test_state().trust_forwarded_headers(true);
        let app = router(state.clone());

        let request = Request::post("/v1/ratelimit/site-submission")
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        app.oneshot(request).await.unwrap();

        let decision = state
            .limiter
            .check_and_consume("site-submission:203.0.113.7", 60_000, 2)
            .await
            .unwrap();
        assert_eq!(decision.remaining, 0);
    }

    #[tokio::test]
    async fn test_unknown_purpose_is_not_found() {
        let app = router(test_state());
        let response = app
            .oneshot(json_post("/v1/ratelimit/newsletter", "{}"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_purpose_body_is_bad_request() {
        let app = router(test_state());
        let response = app
            .oneshot(json_post("/v1/ratelimit/site-submission", "{not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
