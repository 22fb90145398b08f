//! The forwarding engine.
//!
//! # Responsibilities
//! - Validate the descriptor and build the first hop
//! - Send each hop on a fresh origin connection, replaying jar cookies
//! - Follow redirects up to the cap, notifying the observer before each one
//! - Buffer the final body and hand everything to envelope assembly
//!
//! # Design Decisions
//! - Origin 4xx/5xx responses are ordinary results, never errors
//! - The replay jar lives inside `follow`; the accumulator is owned by the
//!   call and only sees headers through the observer and the final hop
//! - The whole call may be bounded by a deadline; dropping the future
//!   aborts the in-flight hop

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::{HeaderMap, HeaderValue, COOKIE, HOST};
use hyper::{Request, StatusCode, Uri, Version};
use rustls::ClientConfig;
use serde_json::Value;
use url::{Position, Url};

use crate::config::{ForwardingConfig, RelayConfig};
use crate::cookies::{CookieAccumulator, CookieRecord, ReplayJar};
use crate::envelope::{self, ProxyEnvelope};
use crate::error::ProxyError;
use crate::forward::descriptor::{PreparedRequest, RequestBody, RequestDescriptor};
use crate::forward::hooks::RedirectObserver;
use crate::forward::redirect::{redirect_target, HopRequest};
use crate::headers::HeaderFields;
use crate::inspect::ConnectionDetails;
use crate::net::timing::UploadMarker;
use crate::net::{tls, Connector, HopClock, TimedBody, TimingPhases};
use crate::observability::metrics;

/// The last response of a redirect chain.
#[derive(Debug)]
pub struct FinalResponse {
    /// Effective URL that produced this response.
    pub url: Url,
    pub status: StatusCode,
    /// Reason phrase from the wire, or the canonical one.
    pub status_text: String,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub timings: TimingPhases,
    pub connection: ConnectionDetails,
    /// Redirects followed before this response.
    pub redirects: usize,
}

/// Everything envelope assembly needs from one forwarded call.
#[derive(Debug)]
pub struct Exchange {
    pub response: FinalResponse,
    pub cookies: Option<Vec<CookieRecord>>,
    /// Headers exactly as the caller sent them.
    pub request_headers: HeaderFields,
    /// Body exactly as the caller sent it, even when it was not transmitted.
    pub request_body: Option<Value>,
}

/// Replays request descriptors against origin servers.
#[derive(Clone)]
pub struct Forwarder {
    connector: Connector,
    settings: ForwardingConfig,
    request_timeout: Option<Duration>,
}

impl Forwarder {
    /// Build a forwarder, loading the TLS trust roots named in `config`.
    pub fn new(config: &RelayConfig) -> Result<Self, std::io::Error> {
        let tls = tls::client_config(&config.forwarding.extra_root_certs, config.forwarding.http2)?;
        Ok(Self::with_tls(config, tls))
    }

    /// Build a forwarder around an existing rustls client config.
    pub fn with_tls(config: &RelayConfig, tls: Arc<ClientConfig>) -> Self {
        let request_timeout = match config.timeouts.request_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        Self {
            connector: Connector::new(tls, Duration::from_secs(config.timeouts.connect_secs)),
            settings: config.forwarding.clone(),
            request_timeout,
        }
    }

    /// Forward one descriptor and build the response envelope.
    pub async fn forward(&self, descriptor: RequestDescriptor) -> Result<ProxyEnvelope, ProxyError> {
        let exchange = self.exchange(descriptor).await?;
        Ok(envelope::assemble(exchange))
    }

    /// Forward one descriptor, returning the raw exchange.
    pub async fn exchange(&self, descriptor: RequestDescriptor) -> Result<Exchange, ProxyError> {
        let request_headers = descriptor.headers.clone();
        let request_body = descriptor.body.clone();
        let prepared = PreparedRequest::from_descriptor(descriptor, &self.settings.user_agent)?;

        let call = self.run(prepared);
        let (response, cookies) = match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| ProxyError::Timeout {
                    phase: "request",
                    millis: limit.as_millis(),
                })??,
            None => call.await?,
        };

        Ok(Exchange {
            response,
            cookies,
            request_headers,
            request_body,
        })
    }

    async fn run(
        &self,
        prepared: PreparedRequest,
    ) -> Result<(FinalResponse, Option<Vec<CookieRecord>>), ProxyError> {
        let mut cookies = CookieAccumulator::new();
        let first = HopRequest {
            method: prepared.method,
            url: prepared.url,
            headers: prepared.headers,
            body: prepared.body.as_ref().map(RequestBody::encode),
        };

        let response = self.follow(first, &mut cookies).await?;
        cookies.record(&response.headers, &response.url);
        tracing::debug!(
            url = %response.url,
            status = response.status.as_u16(),
            redirects = response.redirects,
            "Redirect chain resolved"
        );

        Ok((response, cookies.export()))
    }

    /// Send `first` and follow redirects until a final response arrives.
    ///
    /// `observer` sees each redirect hop's headers before the next hop is
    /// sent; the final response is returned, not observed.
    pub async fn follow(
        &self,
        first: HopRequest,
        observer: &mut dyn RedirectObserver,
    ) -> Result<FinalResponse, ProxyError> {
        let mut jar = ReplayJar::new();
        let mut hop = first;
        let mut redirects = 0usize;

        loop {
            let mut clock = HopClock::start();
            let mut conn = self.connector.connect(&hop.url, &mut clock).await?;
            let request = build_request(
                &hop,
                jar.cookie_header(&hop.url),
                conn.is_http2(),
                clock.upload_marker(),
            )?;
            let response = conn.send(request, &mut clock).await?;
            let (parts, body) = response.into_parts();

            tracing::debug!(
                connection_id = %conn.id(),
                method = %hop.method,
                url = %hop.url,
                status = parts.status.as_u16(),
                elapsed_ms = clock.elapsed().as_millis() as u64,
                "Hop completed"
            );
            jar.store(&hop.url, &parts.headers);

            if let Some(target) = redirect_target(parts.status, &parts.headers, &hop.url)? {
                if redirects >= self.settings.max_redirects {
                    tracing::warn!(url = %hop.url, redirects, "Redirect cap reached");
                    return Err(ProxyError::TooManyRedirects(redirects));
                }
                observer.before_redirect(&parts.headers, &hop.url);
                redirects += 1;
                metrics::record_redirect();
                tracing::debug!(from = %hop.url, to = %target, status = parts.status.as_u16(), "Following redirect");
                hop = hop.redirected(parts.status, target);
                continue;
            }

            let connection = conn.details().clone();
            let body = read_body(body, self.settings.max_response_bytes).await?;
            clock.mark_end();
            drop(conn);

            let status_text = parts
                .extensions
                .get::<hyper::ext::ReasonPhrase>()
                .map(|r| String::from_utf8_lossy(r.as_bytes()).into_owned())
                .or_else(|| parts.status.canonical_reason().map(str::to_string))
                .unwrap_or_default();

            return Ok(FinalResponse {
                url: hop.url,
                status: parts.status,
                status_text,
                version: parts.version,
                headers: parts.headers,
                body,
                timings: clock.phases(),
                connection,
                redirects,
            });
        }
    }
}

fn build_request(
    hop: &HopRequest,
    jar_cookies: Option<String>,
    http2: bool,
    uploaded: UploadMarker,
) -> Result<Request<TimedBody>, ProxyError> {
    let target = if http2 {
        &hop.url[..Position::AfterQuery]
    } else {
        &hop.url[Position::BeforePath..Position::AfterQuery]
    };
    let uri: Uri = target
        .parse()
        .map_err(|e| ProxyError::invalid(format!("Invalid URL: {e}")))?;

    let body = match &hop.body {
        Some(bytes) => TimedBody::new(bytes.clone(), uploaded),
        None => TimedBody::empty(uploaded),
    };
    let mut request = Request::new(body);
    *request.method_mut() = hop.method.clone();
    *request.uri_mut() = uri;
    *request.headers_mut() = hop.headers.clone();

    if http2 {
        *request.version_mut() = Version::HTTP_2;
        request.headers_mut().remove(HOST);
    } else if !request.headers().contains_key(HOST) {
        request.headers_mut().insert(HOST, host_header(&hop.url)?);
    }

    if let Some(jar_cookies) = jar_cookies {
        let headers = request.headers_mut();
        let value = match headers.get(COOKIE) {
            Some(existing) => format!("{}; {jar_cookies}", String::from_utf8_lossy(existing.as_bytes())),
            None => jar_cookies,
        };
        let value = HeaderValue::from_str(&value)
            .map_err(|_| ProxyError::invalid("Invalid cookie header"))?;
        headers.insert(COOKIE, value);
    }

    Ok(request)
}

fn host_header(url: &Url) -> Result<HeaderValue, ProxyError> {
    let host = url.host_str().unwrap_or_default();
    let value = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    HeaderValue::from_str(&value).map_err(|_| ProxyError::invalid(format!("Invalid host: {value}")))
}

async fn read_body(body: Incoming, limit: usize) -> Result<Bytes, ProxyError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => Err(ProxyError::ResponseTooLarge(limit)),
        Err(e) => Err(ProxyError::Transport(e.to_string())),
    }
}
