//! `Set-Cookie` header parsing.
//!
//! Lenient by design of the header itself: the name/value pair is always
//! kept, attributes that cannot be understood are skipped.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

/// The `SameSite` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl SameSite {
    fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("strict") {
            Some(SameSite::Strict)
        } else if value.eq_ignore_ascii_case("lax") {
            Some(SameSite::Lax)
        } else if value.eq_ignore_ascii_case("none") {
            Some(SameSite::None)
        } else {
            None
        }
    }
}

/// One parsed `Set-Cookie` line. Attribute fields are `None`/`false` unless
/// the header spelled them out.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetCookie {
    pub name: String,
    /// Value exactly as sent (not percent-decoded).
    pub value: String,
    pub expires: Option<DateTime<Utc>>,
    pub max_age: Option<i64>,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
    pub partitioned: bool,
    pub priority: Option<String>,
}

/// Parse a single `Set-Cookie` header value.
pub fn parse_set_cookie(header: &str) -> SetCookie {
    let mut parts = header.split(';');
    let pair = parts.next().unwrap_or_default();

    let (name, value) = match pair.split_once('=') {
        Some((n, v)) => (n.trim(), v.trim()),
        None => ("", pair.trim()),
    };
    let mut cookie = SetCookie {
        name: name.to_string(),
        value: value.to_string(),
        ..SetCookie::default()
    };

    for attr in parts {
        let (key, val) = match attr.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (attr.trim(), ""),
        };

        match key.to_ascii_lowercase().as_str() {
            "expires" => {
                if let Some(at) = parse_cookie_date(val) {
                    cookie.expires = Some(at);
                }
            }
            "max-age" => {
                if let Ok(secs) = val.parse::<i64>() {
                    cookie.max_age = Some(secs);
                }
            }
            "domain" if !val.is_empty() => cookie.domain = Some(val.to_string()),
            "path" if !val.is_empty() => cookie.path = Some(val.to_string()),
            "samesite" => {
                if let Some(s) = SameSite::parse(val) {
                    cookie.same_site = Some(s);
                }
            }
            "secure" => cookie.secure = true,
            "httponly" => cookie.http_only = true,
            "partitioned" => cookie.partitioned = true,
            "priority" if !val.is_empty() => cookie.priority = Some(val.to_ascii_lowercase()),
            _ => {}
        }
    }

    cookie
}

/// Cookie dates: RFC 1123 plus the two legacy Netscape/RFC 850 spellings.
fn parse_cookie_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc2822(value) {
        return Some(at.with_timezone(&Utc));
    }
    ["%A, %d-%b-%y %H:%M:%S GMT", "%a, %d-%b-%Y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn name_value_only() {
        let c = parse_set_cookie("session=abc123");
        assert_eq!(c.name, "session");
        assert_eq!(c.value, "abc123");
        assert!(c.domain.is_none());
        assert!(c.path.is_none());
        assert!(!c.secure);
        assert!(c.same_site.is_none());
    }

    #[test]
    fn full_attribute_set() {
        let c = parse_set_cookie(
            "id=a3fWa; Expires=Wed, 21 Oct 2015 07:28:00 GMT; Max-Age=3600; Domain=example.com; \
             Path=/docs; Secure; HttpOnly; SameSite=Strict; Partitioned; Priority=High",
        );
        assert_eq!(c.name, "id");
        assert_eq!(c.value, "a3fWa");
        assert_eq!(
            c.expires,
            Some(Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap())
        );
        assert_eq!(c.max_age, Some(3600));
        assert_eq!(c.domain.as_deref(), Some("example.com"));
        assert_eq!(c.path.as_deref(), Some("/docs"));
        assert!(c.secure);
        assert!(c.http_only);
        assert_eq!(c.same_site, Some(SameSite::Strict));
        assert!(c.partitioned);
        assert_eq!(c.priority.as_deref(), Some("high"));
    }

    #[test]
    fn malformed_attributes_are_skipped() {
        let c = parse_set_cookie("k=v; Expires=not-a-date; Max-Age=soon; SameSite=sometimes; ;=; Path=");
        assert_eq!(c.name, "k");
        assert_eq!(c.value, "v");
        assert!(c.expires.is_none());
        assert!(c.max_age.is_none());
        assert!(c.same_site.is_none());
        assert!(c.path.is_none());
    }

    #[test]
    fn value_keeps_equals_signs() {
        let c = parse_set_cookie("token=a=b=c; Path=/");
        assert_eq!(c.name, "token");
        assert_eq!(c.value, "a=b=c");
    }

    #[test]
    fn missing_equals_means_empty_name() {
        let c = parse_set_cookie("lonely");
        assert_eq!(c.name, "");
        assert_eq!(c.value, "lonely");
    }

    #[test]
    fn legacy_date_format() {
        let c = parse_set_cookie("a=1; expires=Wednesday, 21-Oct-15 07:28:00 GMT");
        assert_eq!(
            c.expires,
            Some(Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap())
        );
    }
}
