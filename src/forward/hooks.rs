//! Observer interface invoked by the engine before it follows a redirect.

use hyper::header::HeaderMap;
use url::Url;

use crate::cookies::CookieAccumulator;

/// Called synchronously for every redirect hop, before the next request is
/// sent, with that hop's response headers and the URL that produced them.
pub trait RedirectObserver: Send {
    fn before_redirect(&mut self, headers: &HeaderMap, url: &Url);
}

impl RedirectObserver for CookieAccumulator {
    fn before_redirect(&mut self, headers: &HeaderMap, url: &Url) {
        self.record(headers, url);
    }
}
