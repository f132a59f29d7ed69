//! Turnstile - Fixed-Window Rate Limiting
//!
//! This crate throttles abuse of the form endpoints of a travel-guide
//! website (site submission, contact and newsletter forms, prediction
//! entries). It provides a per-key fixed-window rate limiter, axum middleware
//! for guarding routes, and a small HTTP service answering admit/deny
//! decisions for callers that cannot embed the library.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
