//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the relay handlers
//! - Wire up middleware (request ID, tracing, body limit)
//! - Serve over plain TCP or TLS until shutdown is broadcast
//! - Turn forwarder results into envelopes or 500 error bodies

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{DefaultBodyLimit, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_server::tls_rustls::RustlsConfig;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::config::RelayConfig;
use crate::envelope::ProxyEnvelope;
use crate::error::ProxyError;
use crate::forward::{Forwarder, ProxyRequest};
use crate::http::request::{self, UuidRequestId, X_REQUEST_ID};
use crate::observability::{forward_span, metrics};

/// How long in-flight TLS connections may drain after shutdown.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub forwarder: Arc<Forwarder>,
}

/// Reply of `GET /api/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub version: String,
    pub status: String,
}

/// HTTP server for the relay.
pub struct RelayServer {
    router: Router,
}

impl RelayServer {
    /// Create a server with a forwarder built from `config`.
    pub fn new(config: &RelayConfig) -> Result<Self, std::io::Error> {
        let forwarder = Forwarder::new(config)?;
        Ok(Self::with_forwarder(config, forwarder))
    }

    pub fn with_forwarder(config: &RelayConfig, forwarder: Forwarder) -> Self {
        let state = AppState {
            forwarder: Arc::new(forwarder),
        };
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        Router::new()
            .route("/api/proxy", post(proxy_handler))
            .route("/api/status", get(status_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
    }

    /// The configured router, for serving it elsewhere.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Relay server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Relay server stopped");
        Ok(())
    }

    /// Serve over TLS on `addr` until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "Relay server starting (TLS)");

        let handle = axum_server::Handle::new();
        let trigger = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            trigger.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("Relay server stopped");
        Ok(())
    }
}

/// `POST /api/proxy`: replay the descriptor and return its envelope.
///
/// Origin error statuses come back as 200 envelopes; only relay failures
/// produce a 500.
async fn proxy_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ProxyRequest>,
) -> Result<Json<ProxyEnvelope>, ProxyError> {
    let start = Instant::now();
    let descriptor = payload.request;
    let method = descriptor.method.trim().to_ascii_uppercase();
    let span = forward_span(request::request_id(&headers), &method, &descriptor.url);

    async move {
        tracing::debug!("Forwarding request");
        match state.forwarder.forward(descriptor).await {
            Ok(envelope) => {
                let status = envelope.response.status;
                metrics::record_request(&method, status, start);
                tracing::info!(
                    status,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Request forwarded"
                );
                Ok(Json(envelope))
            }
            Err(e) => {
                metrics::record_error(e.kind());
                metrics::record_request(&method, 500, start);
                tracing::warn!(error = %e, kind = e.kind(), "Forwarding failed");
                Err(e)
            }
        }
    }
    .instrument(span)
    .await
}

/// `GET /api/status`: liveness plus the running version.
async fn status_handler() -> Json<StatusReport> {
    Json(StatusReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
    })
}
