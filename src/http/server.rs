//! HTTP server implementation.

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::service::router;
use super::state::AppState;
use crate::error::Result;

/// HTTP server for the rate limit service.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// Shared handler state
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self { addr, state }
    }

    /// Start the HTTP server.
    ///
    /// This method will block until the server is shut down.
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            error!(addr = %self.addr, error = %e, "Failed to bind HTTP listener");
            e
        })?;

        info!(
            addr = %self.addr,
            "Starting HTTP server for rate limit decisions"
        );

        let app = router(self.state).into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server failed");
                e.into()
            })
    }
}
