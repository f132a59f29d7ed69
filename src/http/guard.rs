//! Middleware that rate limits an axum route by purpose.
//!
//! ```ignore
//! let contact = Router::new()
//!     .route("/api/contact", post(submit_contact))
//!     .route_layer(middleware::from_fn_with_state(
//!         Guard::new(state.clone(), "contact"),
//!         enforce,
//!     ));
//! ```

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, warn};

use super::client::{client_identity, ClientAddr};
use super::response::rejection;
use super::state::AppState;
use crate::ratelimit::RateLimitKey;

/// Binds a purpose label to the shared limiter and policies.
#[derive(Clone)]
pub struct Guard {
    state: AppState,
    purpose: Arc<str>,
}

impl Guard {
    pub fn new(state: AppState, purpose: &str) -> Self {
        Self {
            state,
            purpose: Arc::from(purpose),
        }
    }

    pub fn purpose(&self) -> &str {
        &self.purpose
    }
}

/// Reject over-limit callers with `429` before the inner handler runs.
///
/// A purpose with no policy, or a store failure, lets the request through.
pub async fn enforce(
    State(guard): State<Guard>,
    ClientAddr(peer): ClientAddr,
    request: Request,
    next: Next,
) -> Response {
    let Some(quota) = guard.state.policies.find_quota(&guard.purpose) else {
        warn!(purpose = %guard.purpose, "No rate limit policy, request not limited");
        return next.run(request).await;
    };

    let client = client_identity(request.headers(), peer, guard.state.trust_forwarded_headers);
    let key = RateLimitKey::new(guard.purpose.as_ref(), client);

    match guard.state.limiter.check(&key, quota).await {
        Ok(decision) if decision.allowed => next.run(request).await,
        Ok(decision) => {
            debug!(
                key = %key,
                retry_after_secs = decision.retry_after_secs,
                "Rejecting request over limit"
            );
            rejection(&decision)
        }
        Err(e) => {
            warn!(key = %key, error = %e, "Rate limit check failed, request not limited");
            next.run(request).await
        }
    }
}
