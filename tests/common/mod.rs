//! Shared utilities for integration tests: scriptable origin servers.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use api_relay::config::RelayConfig;
use api_relay::forward::Forwarder;
use rustls::ServerConfig;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

pub const CA_PEM: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/ca.pem");
const ORIGIN_PEM: &[u8] = include_bytes!("../fixtures/origin.pem");
const ORIGIN_KEY: &[u8] = include_bytes!("../fixtures/origin.key");

/// One request as the origin received it.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Captured {
    /// First value of `name`, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A running origin and the requests it has seen so far.
pub struct MockOrigin {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Captured>>>,
}

impl MockOrigin {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn tls_url(&self, path: &str) -> String {
        format!("https://{}{}", self.addr, path)
    }

    pub fn requests(&self) -> Vec<Captured> {
        self.requests.lock().unwrap().clone()
    }
}

/// Build a raw HTTP/1.1 response that closes the connection.
pub fn response(status: &str, headers: &[(&str, &str)], body: &str) -> String {
    let mut out = format!("HTTP/1.1 {status}\r\n");
    for (name, value) in headers {
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    out.push_str(&format!("Content-Length: {}\r\nConnection: close\r\n\r\n{body}", body.len()));
    out
}

/// A `302 Found` pointing at `location`, with optional cookies.
pub fn redirect(location: &str, cookies: &[&str]) -> String {
    let mut headers = vec![("Location", location)];
    headers.extend(cookies.iter().map(|c| ("Set-Cookie", *c)));
    response("302 Found", &headers, "")
}

/// Start a plaintext origin on an ephemeral port; `handler` scripts each reply.
pub async fn start_origin<F>(handler: F) -> MockOrigin
where
    F: Fn(&Captured) -> String + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);

    let seen = requests.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(serve(socket, handler.clone(), seen.clone()));
        }
    });

    MockOrigin { addr, requests }
}

/// Same as [`start_origin`] behind TLS with the fixture certificate.
pub async fn start_tls_origin<F>(handler: F) -> MockOrigin
where
    F: Fn(&Captured) -> String + Send + Sync + 'static,
{
    let certs = rustls_pemfile::certs(&mut &ORIGIN_PEM[..])
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let key = rustls_pemfile::private_key(&mut &ORIGIN_KEY[..]).unwrap().unwrap();
    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .unwrap();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);

    let seen = requests.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            let handler = handler.clone();
            let seen = seen.clone();
            tokio::spawn(async move {
                if let Ok(stream) = acceptor.accept(socket).await {
                    serve(stream, handler, seen).await;
                }
            });
        }
    });

    MockOrigin { addr, requests }
}

async fn serve<S, F>(mut stream: S, handler: Arc<F>, seen: Arc<Mutex<Vec<Captured>>>)
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: Fn(&Captured) -> String,
{
    let Some(request) = read_request(&mut stream).await else {
        return;
    };
    let reply = handler(&request);
    seen.lock().unwrap().push(request);
    let _ = stream.write_all(reply.as_bytes()).await;
    let _ = stream.flush().await;
    let _ = stream.shutdown().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Read one request head and its `Content-Length` body.
pub async fn read_request<S: AsyncRead + Unpin>(stream: &mut S) -> Option<Captured> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(Captured {
        method,
        path,
        headers,
        body,
    })
}

/// Relay config suitable for tests (short timeouts, test CA trusted).
pub fn test_config() -> RelayConfig {
    let mut config = RelayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.timeouts.connect_secs = 2;
    config.timeouts.request_secs = 10;
    config.forwarding.extra_root_certs = vec![CA_PEM.to_string()];
    config
}

pub fn forwarder(config: &RelayConfig) -> Forwarder {
    Forwarder::new(config).unwrap()
}
