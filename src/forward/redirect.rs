//! Redirect policy: which responses are followed and how the next hop looks.

use bytes::Bytes;
use hyper::header::{HeaderMap, AUTHORIZATION, COOKIE, HOST, LOCATION};
use hyper::{Method, StatusCode};
use url::Url;

use crate::error::ProxyError;

/// Statuses that are followed when they carry a `Location`.
const REDIRECT_STATUSES: [u16; 6] = [300, 301, 302, 303, 307, 308];

/// The request sent on one hop.
#[derive(Debug, Clone)]
pub struct HopRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl HopRequest {
    /// Derive the request for `target` after `status` redirected us there.
    pub fn redirected(&self, status: StatusCode, target: Url) -> HopRequest {
        let mut next = self.clone();

        if status == StatusCode::SEE_OTHER && self.method != Method::GET && self.method != Method::HEAD {
            next.method = Method::GET;
            next.body = None;
            let content_headers: Vec<_> = next
                .headers
                .keys()
                .filter(|name| name.as_str().starts_with("content-"))
                .cloned()
                .collect();
            for name in content_headers {
                next.headers.remove(name);
            }
        }

        next.headers.remove(HOST);
        if !same_origin(&self.url, &target) {
            next.headers.remove(AUTHORIZATION);
            next.headers.remove(COOKIE);
        }

        next.url = target;
        next
    }
}

/// Where a response redirects to, if it is a redirect we follow.
pub fn redirect_target(status: StatusCode, headers: &HeaderMap, current: &Url) -> Result<Option<Url>, ProxyError> {
    if !REDIRECT_STATUSES.contains(&status.as_u16()) {
        return Ok(None);
    }
    let Some(location) = headers.get(LOCATION) else {
        return Ok(None);
    };

    let location = String::from_utf8_lossy(location.as_bytes());
    let target = current
        .join(location.trim())
        .map_err(|e| ProxyError::Transport(format!("Invalid redirect location '{location}': {e}")))?;
    match target.scheme() {
        "http" | "https" => Ok(Some(target)),
        other => Err(ProxyError::Transport(format!(
            "Refusing redirect to unsupported protocol {other}:"
        ))),
    }
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}
