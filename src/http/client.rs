//! Client address extraction.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;

/// Used when no client address can be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// The socket peer address, when the server was started with connect info.
///
/// Never rejects; routers built without connect info yield `None`.
#[derive(Debug, Clone, Copy)]
pub struct ClientAddr(pub Option<IpAddr>);

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(ClientAddr(peer))
    }
}

/// Work out who is calling.
///
/// Forwarded headers are consulted only when `trust_forwarded` is set:
/// `X-Real-IP` first, then the first non-empty `X-Forwarded-For` hop. After
/// that the socket peer, then [`UNKNOWN_CLIENT`].
pub fn client_identity(headers: &HeaderMap, peer: Option<IpAddr>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        if let Some(ip) = forwarded_client(headers) {
            return ip;
        }
    }
    peer.map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn forwarded_client(headers: &HeaderMap) -> Option<String> {
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = real_ip {
        return Some(ip.to_string());
    }

    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').map(str::trim).find(|hop| !hop.is_empty()))
        .map(str::to_string)
}
