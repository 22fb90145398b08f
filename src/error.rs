//! Failure type for a forwarded call.
//!
//! Variants exist for logging and metrics only. At the HTTP boundary every
//! variant becomes the same `500 Proxy Error` reply with `to_string()` as the
//! detail (see `http::response`). HTTP statuses from the origin never land
//! here.

use thiserror::Error;

/// A forwarded call that could not produce an envelope.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The descriptor itself is unusable (bad method, URL or header).
    #[error("{0}")]
    InvalidRequest(String),

    /// Host name resolution failed.
    #[error("getaddrinfo failed for {host}: {message}")]
    Dns { host: String, message: String },

    /// TCP connect failed (refused, reset, unreachable).
    #[error("connect {address} failed: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// TLS handshake or configuration failure.
    #[error("TLS handshake with {host} failed: {message}")]
    Tls { host: String, message: String },

    /// A configured deadline elapsed.
    #[error("Timeout awaiting '{phase}' for {millis}ms")]
    Timeout { phase: &'static str, millis: u128 },

    /// HTTP framing or connection failure after the socket was up.
    #[error("{0}")]
    Transport(String),

    /// The redirect chain exceeded the configured cap.
    #[error("Redirected {0} times. Aborting.")]
    TooManyRedirects(usize),

    /// The origin sent more body than the relay is willing to buffer.
    #[error("response body exceeds {0} bytes")]
    ResponseTooLarge(usize),
}

impl ProxyError {
    /// Short label used for the `kind` metric dimension and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::InvalidRequest(_) => "invalid_request",
            ProxyError::Dns { .. } => "dns",
            ProxyError::Connect { .. } => "connect",
            ProxyError::Tls { .. } => "tls",
            ProxyError::Timeout { .. } => "timeout",
            ProxyError::Transport(_) => "transport",
            ProxyError::TooManyRedirects(_) => "redirects",
            ProxyError::ResponseTooLarge(_) => "too_large",
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        ProxyError::InvalidRequest(message.into())
    }
}

impl From<hyper::Error> for ProxyError {
    fn from(e: hyper::Error) -> Self {
        ProxyError::Transport(e.to_string())
    }
}
