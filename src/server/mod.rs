//! HTTP server side of the tunnel.
//!
//! # Data Flow
//! ```text
//! POST /upload   → auth → params → registry insert/lookup → target write
//! GET  /download → auth → registry wait → claim → streamed response
//! reaper tick    → registry sweep → evicted sessions closed
//! ```
//!
//! # Responsibilities
//! - Build the Axum router for the two endpoints
//! - Share the registry between handlers and the reaper
//! - Enforce the shared secret before any session state is touched
//! - Serve with graceful shutdown

mod download;
mod reaper;
mod upload;

pub use reaper::HeartbeatReaper;

use std::sync::Arc;

use axum::http::{header, HeaderMap};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::{TimeoutConfig, TunnelConfig};
use crate::error::TunnelError;
use crate::registry::ConnectionRegistry;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConnectionRegistry>,
    pub secret: Arc<str>,
    pub timeouts: TimeoutConfig,
}

/// HTTP server hosting the upload/download endpoints.
pub struct TunnelServer {
    router: Router,
    registry: Arc<ConnectionRegistry>,
    timeouts: TimeoutConfig,
}

impl TunnelServer {
    pub fn new(config: &TunnelConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());

        let state = AppState {
            registry: registry.clone(),
            secret: config.server.secret.as_str().into(),
            timeouts: config.timeouts.clone(),
        };

        let router = Self::build_router(state);
        Self {
            router,
            registry,
            timeouts: config.timeouts.clone(),
        }
    }

    /// Method routing answers 405 for anything but POST/GET on the
    /// respective endpoint.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/upload", post(upload::handle))
            .route("/download", get(download::handle))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Registry handle, shared with the reaper and visible to tests.
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Tunnel server starting");

        let reaper = HeartbeatReaper::new(self.registry.clone(), self.timeouts.idle_threshold());
        let reaper_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            reaper.run(reaper_shutdown).await;
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Tunnel server stopped");
        Ok(())
    }
}

/// Compare the bearer secret by exact equality.
///
/// A mismatch classifies exactly like a malformed request so the endpoint
/// never reveals which check failed.
pub(crate) fn authorize(headers: &HeaderMap, secret: &str) -> Result<(), TunnelError> {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    match presented {
        Some(value) if value == format!("Bearer {}", secret) => Ok(()),
        _ => Err(TunnelError::AuthMismatch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn exact_bearer_match_is_required() {
        assert!(authorize(&headers_with("Bearer hunter2"), "hunter2").is_ok());
        assert!(authorize(&headers_with("Bearer hunter2 "), "hunter2").is_err());
        assert!(authorize(&headers_with("bearer hunter2"), "hunter2").is_err());
        assert!(authorize(&headers_with("Bearer hunter"), "hunter2").is_err());
        assert!(authorize(&HeaderMap::new(), "hunter2").is_err());
    }
}
