//! Append-only record of every cookie an origin set during one call.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use hyper::header::{HeaderMap, SET_COOKIE};
use percent_encoding::percent_decode_str;
use serde::Serialize;
use url::Url;

use crate::cookies::parse::{parse_set_cookie, SameSite, SetCookie};

/// One `Set-Cookie` as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub partitioned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

impl Default for CookieRecord {
    fn default() -> Self {
        Self {
            name: String::new(),
            value: String::new(),
            domain: None,
            path: "/".to_string(),
            expires: None,
            max_age: None,
            http_only: false,
            secure: false,
            same_site: SameSite::Lax,
            partitioned: false,
            priority: None,
        }
    }
}

impl CookieRecord {
    /// Built-in defaults, then the origin's host, then whatever the cookie
    /// itself spelled out.
    pub fn resolve(parsed: SetCookie, origin: &Url) -> Self {
        let mut record = CookieRecord::default();

        record.domain = origin.host_str().map(str::to_string);

        record.name = parsed.name;
        record.value = decode_value(&parsed.value).into_owned();
        if let Some(domain) = parsed.domain {
            record.domain = Some(domain);
        }
        if let Some(path) = parsed.path {
            record.path = path;
        }
        if let Some(same_site) = parsed.same_site {
            record.same_site = same_site;
        }
        record.expires = parsed.expires;
        record.max_age = parsed.max_age;
        record.http_only |= parsed.http_only;
        record.secure |= parsed.secure;
        record.partitioned = parsed.partitioned;
        record.priority = parsed.priority;
        record
    }
}

fn decode_value(raw: &str) -> Cow<'_, str> {
    match percent_decode_str(raw).decode_utf8() {
        Ok(decoded) => decoded,
        Err(_) => Cow::Borrowed(raw),
    }
}

/// Collects cookies from every hop, in hop order, without deduplication.
#[derive(Debug, Default)]
pub struct CookieAccumulator {
    records: Vec<CookieRecord>,
}

impl CookieAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record per `Set-Cookie` line in `headers`. Returns how many
    /// were added.
    pub fn record(&mut self, headers: &HeaderMap, origin: &Url) -> usize {
        let before = self.records.len();
        for value in headers.get_all(SET_COOKIE) {
            let raw = String::from_utf8_lossy(value.as_bytes());
            self.records
                .push(CookieRecord::resolve(parse_set_cookie(&raw), origin));
        }
        let added = self.records.len() - before;
        if added > 0 {
            tracing::debug!(origin = %origin, added, total = self.records.len(), "Captured cookies");
        }
        added
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Hand the sequence to the caller; `None` when no cookie was ever seen.
    pub fn export(self) -> Option<Vec<CookieRecord>> {
        if self.records.is_empty() {
            None
        } else {
            Some(self.records)
        }
    }
}
