//! Origin connections: establishment, phase timing and lifetime.
//!
//! # Responsibilities
//! - Resolve the hop's host and connect to the first reachable address
//! - Run the TLS handshake for https URLs and capture session details
//! - Perform the HTTP/1.1 or HTTP/2 handshake and drive the connection
//! - Abort the connection driver when the connection is dropped

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper::body::{Body, Incoming};
use hyper::client::conn::{http1, http2};
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;
use url::{Host, Url};

use crate::error::ProxyError;
use crate::inspect::{ConnectionDetails, TlsDetails};
use crate::net::body::TimedBody;
use crate::net::timing::HopClock;
use crate::net::tls::is_h2;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an origin connection, used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "origin-{}", self.0)
    }
}

/// Connection driver task, aborted on drop.
#[derive(Debug)]
struct DriverTask {
    handle: JoinHandle<()>,
    id: ConnectionId,
}

impl Drop for DriverTask {
    fn drop(&mut self) {
        self.handle.abort();
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

enum Sender {
    Http1(http1::SendRequest<TimedBody>),
    Http2(http2::SendRequest<TimedBody>),
}

/// A ready-to-use connection to an origin for a single hop.
pub struct OriginConnection {
    id: ConnectionId,
    sender: Sender,
    details: ConnectionDetails,
    _driver: DriverTask,
}

impl OriginConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Whether requests must be sent in HTTP/2 form (absolute URI, no `host`).
    pub fn is_http2(&self) -> bool {
        matches!(self.sender, Sender::Http2(_))
    }

    /// Addresses and TLS session captured at connect time.
    pub fn details(&self) -> &ConnectionDetails {
        &self.details
    }

    /// Send the hop's request and wait for the response head.
    pub async fn send(
        &mut self,
        request: Request<TimedBody>,
        clock: &mut HopClock,
    ) -> Result<Response<Incoming>, ProxyError> {
        if request.body().is_end_stream() {
            clock.mark_upload();
        }
        let response = match &mut self.sender {
            Sender::Http1(sender) => {
                sender.ready().await?;
                sender.send_request(request).await?
            }
            Sender::Http2(sender) => {
                sender.ready().await?;
                sender.send_request(request).await?
            }
        };
        clock.mark_upload();
        clock.mark_response();
        Ok(response)
    }
}

/// Opens origin connections with a shared TLS config and connect timeout.
#[derive(Clone)]
pub struct Connector {
    tls: TlsConnector,
    connect_timeout: Duration,
}

impl Connector {
    pub fn new(tls: Arc<ClientConfig>, connect_timeout: Duration) -> Self {
        Self {
            tls: TlsConnector::from(tls),
            connect_timeout,
        }
    }

    /// Establish a connection for `url`, stamping phases on `clock`.
    pub async fn connect(&self, url: &Url, clock: &mut HopClock) -> Result<OriginConnection, ProxyError> {
        let host = url
            .host()
            .ok_or_else(|| ProxyError::invalid(format!("Invalid URL: {url} has no host")))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| ProxyError::invalid(format!("Invalid URL: {url} has no port")))?;

        clock.mark_socket();
        let addrs = resolve(&host, port).await?;
        clock.mark_lookup();

        let tcp = self.connect_any(&addrs).await?;
        clock.mark_connect();
        let _ = tcp.set_nodelay(true);

        let id = ConnectionId::new();
        let mut details = ConnectionDetails {
            local: tcp.local_addr().ok(),
            remote: tcp.peer_addr().ok(),
            tls: None,
        };

        let (sender, handle) = if url.scheme() == "https" {
            let host_name = url.host_str().unwrap_or_default();
            let server_name = ServerName::try_from(host_name.trim_matches(['[', ']']).to_string())
                .map_err(|e| ProxyError::Tls {
                    host: host_name.to_string(),
                    message: e.to_string(),
                })?;
            let stream = self
                .tls
                .connect(server_name, tcp)
                .await
                .map_err(|e| ProxyError::Tls {
                    host: host_name.to_string(),
                    message: e.to_string(),
                })?;
            clock.mark_secure_connect();

            let (_, session) = stream.get_ref();
            let h2 = is_h2(session.alpn_protocol());
            details.tls = Some(TlsDetails::capture(session));
            handshake(stream, h2, id).await?
        } else {
            handshake(tcp, false, id).await?
        };

        tracing::debug!(
            connection_id = %id,
            remote = ?details.remote,
            tls = details.tls.is_some(),
            http2 = matches!(sender, Sender::Http2(_)),
            "Origin connection established"
        );

        Ok(OriginConnection {
            id,
            sender,
            details,
            _driver: DriverTask { handle, id },
        })
    }

    async fn connect_any(&self, addrs: &[SocketAddr]) -> Result<TcpStream, ProxyError> {
        let mut last_err = None;
        for addr in addrs {
            match tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => return Ok(stream),
                Ok(Err(source)) => {
                    tracing::debug!(address = %addr, error = %source, "Connect attempt failed");
                    last_err = Some(ProxyError::Connect {
                        address: addr.to_string(),
                        source,
                    });
                }
                Err(_) => {
                    last_err = Some(ProxyError::Timeout {
                        phase: "connect",
                        millis: self.connect_timeout.as_millis(),
                    });
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ProxyError::Transport("no address to connect to".into())))
    }
}

async fn resolve(host: &Host<&str>, port: u16) -> Result<Vec<SocketAddr>, ProxyError> {
    match host {
        Host::Ipv4(ip) => Ok(vec![SocketAddr::new((*ip).into(), port)]),
        Host::Ipv6(ip) => Ok(vec![SocketAddr::new((*ip).into(), port)]),
        Host::Domain(name) => {
            let addrs: Vec<SocketAddr> = tokio::net::lookup_host((*name, port))
                .await
                .map_err(|e| ProxyError::Dns {
                    host: name.to_string(),
                    message: e.to_string(),
                })?
                .collect();
            if addrs.is_empty() {
                return Err(ProxyError::Dns {
                    host: name.to_string(),
                    message: "no addresses found".into(),
                });
            }
            Ok(addrs)
        }
    }
}

async fn handshake<S>(io: S, h2: bool, id: ConnectionId) -> Result<(Sender, JoinHandle<()>), ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(io);
    if h2 {
        let (sender, conn) = http2::Builder::new(TokioExecutor::new()).handshake(io).await?;
        let handle = tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(connection_id = %id, error = %e, "Origin connection error");
            }
        });
        Ok((Sender::Http2(sender), handle))
    } else {
        let (sender, conn) = http1::Builder::new().handshake(io).await?;
        let handle = tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(connection_id = %id, error = %e, "Origin connection error");
            }
        });
        Ok((Sender::Http1(sender), handle))
    }
}
