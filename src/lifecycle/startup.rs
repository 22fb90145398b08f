//! Startup orchestration.
//!
//! # Responsibilities
//! - Start the metrics exporter when enabled
//! - Build the forwarder (trust roots, ALPN)
//! - Bind the listener and serve until shutdown

use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::RelayConfig;
use crate::http::RelayServer;
use crate::lifecycle::Shutdown;
use crate::net::tls;
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid address '{0}'")]
    Address(String),
    #[error("metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

/// Run the relay described by `config` until `shutdown` fires.
pub async fn start(config: RelayConfig, shutdown: &Shutdown) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr = parse_addr(&config.observability.metrics_address)?;
        metrics::init_metrics(addr)?;
    }

    let server = RelayServer::new(&config)?;
    tracing::info!(
        bind_address = %config.listener.bind_address,
        tls = config.listener.tls.is_some(),
        max_redirects = config.forwarding.max_redirects,
        request_timeout_secs = config.timeouts.request_secs,
        "Relay configured"
    );

    match &config.listener.tls {
        Some(tls_files) => {
            let addr = parse_addr(&config.listener.bind_address)?;
            let rustls =
                tls::listener_config(Path::new(&tls_files.cert_path), Path::new(&tls_files.key_path)).await?;
            server.run_tls(addr, rustls, shutdown.subscribe()).await?;
        }
        None => {
            let listener = TcpListener::bind(&config.listener.bind_address).await?;
            server.run(listener, shutdown.subscribe()).await?;
        }
    }
    Ok(())
}

fn parse_addr(raw: &str) -> Result<SocketAddr, StartupError> {
    raw.parse().map_err(|_| StartupError::Address(raw.to_string()))
}
