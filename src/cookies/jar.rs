//! Call-scoped cookie jar that replays cookies on later redirect hops.
//!
//! Follows the RFC 6265 storage model closely enough for redirect chains:
//! host-only vs domain cookies, default-path, path-match, `Secure`, and
//! expiry via `Max-Age` (preferred) or `Expires`. Never exported.

use chrono::{DateTime, Duration, Utc};
use hyper::header::{HeaderMap, SET_COOKIE};
use url::{Host, Url};

use crate::cookies::parse::{parse_set_cookie, SetCookie};

#[derive(Debug, Clone)]
struct StoredCookie {
    name: String,
    value: String,
    domain: String,
    host_only: bool,
    path: String,
    secure: bool,
    expires: Option<DateTime<Utc>>,
    seq: u64,
}

impl StoredCookie {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }

    fn matches(&self, url: &Url, now: DateTime<Utc>) -> bool {
        let Some(host) = request_host(url) else {
            return false;
        };
        if self.is_expired(now) {
            return false;
        }
        let domain_ok = if self.host_only {
            host == self.domain
        } else {
            domain_match(url, &host, &self.domain)
        };
        domain_ok && path_match(url.path(), &self.path) && (!self.secure || url.scheme() == "https")
    }
}

/// In-memory RFC 6265 jar for one forwarded call.
#[derive(Debug, Default)]
pub struct ReplayJar {
    cookies: Vec<StoredCookie>,
    next_seq: u64,
}

impl ReplayJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store every `Set-Cookie` of a response received from `url`.
    pub fn store(&mut self, url: &Url, headers: &HeaderMap) {
        let now = Utc::now();
        for value in headers.get_all(SET_COOKIE) {
            let raw = String::from_utf8_lossy(value.as_bytes());
            self.store_parsed(url, parse_set_cookie(&raw), now);
        }
    }

    /// `cookie` header value for a request to `url`, if any cookie applies.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        self.cookie_header_at(url, Utc::now())
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    fn store_parsed(&mut self, url: &Url, cookie: SetCookie, now: DateTime<Utc>) {
        let Some(host) = request_host(url) else {
            return;
        };

        let (domain, host_only) = match cookie
            .domain
            .as_deref()
            .map(|d| d.trim_start_matches('.').to_ascii_lowercase())
            .filter(|d| !d.is_empty())
        {
            Some(d) if domain_match(url, &host, &d) => (d, false),
            Some(d) => {
                tracing::trace!(cookie = %cookie.name, domain = %d, host = %host, "Rejected cookie for foreign domain");
                return;
            }
            None => (host, true),
        };

        let path = match cookie.path {
            Some(p) if p.starts_with('/') => p,
            _ => default_path(url.path()),
        };

        let expires = match cookie.max_age {
            Some(secs) if secs <= 0 => Some(DateTime::<Utc>::MIN_UTC),
            Some(secs) => Duration::try_seconds(secs).and_then(|d| now.checked_add_signed(d)),
            None => cookie.expires,
        };

        self.cookies
            .retain(|c| !(c.name == cookie.name && c.domain == domain && c.path == path));

        let stored = StoredCookie {
            name: cookie.name,
            value: cookie.value,
            domain,
            host_only,
            path,
            secure: cookie.secure,
            expires,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        if !stored.is_expired(now) {
            self.cookies.push(stored);
        }
    }

    fn cookie_header_at(&self, url: &Url, now: DateTime<Utc>) -> Option<String> {
        let mut matching: Vec<&StoredCookie> =
            self.cookies.iter().filter(|c| c.matches(url, now)).collect();
        if matching.is_empty() {
            return None;
        }
        // Longer paths first, then creation order.
        matching.sort_by(|a, b| b.path.len().cmp(&a.path.len()).then(a.seq.cmp(&b.seq)));

        let pairs: Vec<String> = matching
            .into_iter()
            .map(|c| {
                if c.name.is_empty() {
                    c.value.clone()
                } else {
                    format!("{}={}", c.name, c.value)
                }
            })
            .collect();
        Some(pairs.join("; "))
    }
}

fn request_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_ascii_lowercase())
}

/// RFC 6265 §5.1.3. IP hosts only match exactly.
fn domain_match(url: &Url, host: &str, domain: &str) -> bool {
    if host == domain {
        return true;
    }
    matches!(url.host(), Some(Host::Domain(_)))
        && host.len() > domain.len()
        && host.ends_with(domain)
        && host.as_bytes()[host.len() - domain.len() - 1] == b'.'
}

/// RFC 6265 §5.1.4 default-path.
fn default_path(request_path: &str) -> String {
    if !request_path.starts_with('/') {
        return "/".to_string();
    }
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => request_path[..idx].to_string(),
    }
}

/// RFC 6265 §5.1.4 path-match.
fn path_match(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/')
            || request_path.as_bytes().get(cookie_path.len()) == Some(&b'/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn store(jar: &mut ReplayJar, at: &str, header: &str) {
        jar.store_parsed(&url(at), parse_set_cookie(header), Utc::now());
    }

    #[test]
    fn host_only_cookie_stays_on_its_host() {
        let mut jar = ReplayJar::new();
        store(&mut jar, "http://example.com/", "sid=1");

        assert_eq!(jar.cookie_header(&url("http://example.com/next")).as_deref(), Some("sid=1"));
        assert!(jar.cookie_header(&url("http://sub.example.com/")).is_none());
        assert!(jar.cookie_header(&url("http://other.com/")).is_none());
    }

    #[test]
    fn domain_cookie_reaches_subdomains() {
        let mut jar = ReplayJar::new();
        store(&mut jar, "http://www.example.com/", "sid=1; Domain=.example.com");

        assert!(jar.cookie_header(&url("http://api.example.com/")).is_some());
        assert!(jar.cookie_header(&url("http://example.com/")).is_some());
        assert!(jar.cookie_header(&url("http://notexample.com/")).is_none());
    }

    #[test]
    fn foreign_domain_is_rejected() {
        let mut jar = ReplayJar::new();
        store(&mut jar, "http://example.com/", "sid=1; Domain=evil.com");
        assert!(jar.is_empty());
    }

    #[test]
    fn default_path_and_path_match() {
        assert_eq!(default_path("/a/b/c"), "/a/b");
        assert_eq!(default_path("/a"), "/");
        assert_eq!(default_path(""), "/");

        let mut jar = ReplayJar::new();
        store(&mut jar, "http://example.com/app/login", "sid=1");

        assert!(jar.cookie_header(&url("http://example.com/app")).is_some());
        assert!(jar.cookie_header(&url("http://example.com/app/home")).is_some());
        assert!(jar.cookie_header(&url("http://example.com/apple")).is_none());
        assert!(jar.cookie_header(&url("http://example.com/")).is_none());
    }

    #[test]
    fn secure_cookie_needs_https() {
        let mut jar = ReplayJar::new();
        store(&mut jar, "https://example.com/", "sid=1; Secure");

        assert!(jar.cookie_header(&url("https://example.com/")).is_some());
        assert!(jar.cookie_header(&url("http://example.com/")).is_none());
    }

    #[test]
    fn replacement_and_deletion() {
        let mut jar = ReplayJar::new();
        store(&mut jar, "http://example.com/", "sid=1");
        store(&mut jar, "http://example.com/", "sid=2");
        assert_eq!(jar.len(), 1);
        assert_eq!(jar.cookie_header(&url("http://example.com/")).as_deref(), Some("sid=2"));

        store(&mut jar, "http://example.com/", "sid=gone; Max-Age=0");
        assert!(jar.is_empty());
    }

    #[test]
    fn past_expiry_is_not_stored() {
        let mut jar = ReplayJar::new();
        store(&mut jar, "http://example.com/", "old=1; Expires=Wed, 21 Oct 2015 07:28:00 GMT");
        assert!(jar.is_empty());
    }

    #[test]
    fn max_age_wins_over_expires() {
        let mut jar = ReplayJar::new();
        store(
            &mut jar,
            "http://example.com/",
            "keep=1; Expires=Wed, 21 Oct 2015 07:28:00 GMT; Max-Age=600",
        );
        assert_eq!(jar.len(), 1);
    }

    #[test]
    fn longer_paths_sort_first() {
        let mut jar = ReplayJar::new();
        store(&mut jar, "http://example.com/", "a=1; Path=/");
        store(&mut jar, "http://example.com/", "b=2; Path=/deep");

        assert_eq!(
            jar.cookie_header(&url("http://example.com/deep/x")).as_deref(),
            Some("b=2; a=1")
        );
    }

    #[test]
    fn ip_hosts_match_exactly() {
        let mut jar = ReplayJar::new();
        store(&mut jar, "http://127.0.0.1:8080/", "sid=1");
        assert!(jar.cookie_header(&url("http://127.0.0.1:9090/")).is_some());
        assert!(jar.cookie_header(&url("http://127.0.0.2/")).is_none());
    }
}
