//! HTTP rendering of decisions and errors.

use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::TurnstileError;
use crate::ratelimit::Decision;

/// Header carrying the requests left in the current window.
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// A decision rendered as `200` (allowed) or `429` with `Retry-After` (denied).
#[derive(Debug, Clone, Copy)]
pub struct DecisionResponse(pub Decision);

impl IntoResponse for DecisionResponse {
    fn into_response(self) -> Response {
        let decision = self.0;
        let status = if decision.allowed {
            StatusCode::OK
        } else {
            StatusCode::TOO_MANY_REQUESTS
        };

        let mut response = (status, Json(decision)).into_response();
        apply_headers(&mut response, &decision);
        response
    }
}

/// The response a guarded route returns instead of running its handler.
pub fn rejection(decision: &Decision) -> Response {
    let body = json!({
        "error": "too many requests",
        "retry_after_secs": decision.retry_after_secs,
    });
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    apply_headers(&mut response, decision);
    response
}

fn apply_headers(response: &mut Response, decision: &Decision) {
    let headers = response.headers_mut();
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    if !decision.allowed {
        headers.insert(RETRY_AFTER, HeaderValue::from(decision.retry_after_secs));
    }
}

impl TurnstileError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            TurnstileError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            TurnstileError::UnknownPurpose(_) => StatusCode::NOT_FOUND,
            TurnstileError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            TurnstileError::Config(_) | TurnstileError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TurnstileError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => "internal error".to_string(),
            _ => self.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
