//! HTTP surface: the decision service and route middleware.

mod client;
mod guard;
mod response;
mod server;
mod service;
mod state;

pub use client::{client_identity, ClientAddr, UNKNOWN_CLIENT};
pub use guard::{enforce, Guard};
pub use response::{rejection, DecisionResponse, X_RATELIMIT_REMAINING};
pub use server::HttpServer;
pub use service::{router, CheckRequest, PurposeCheckRequest};
pub use state::AppState;
