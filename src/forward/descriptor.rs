//! Caller-supplied request descriptors and their validated form.

use bytes::Bytes;
use hyper::header::{
    HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING, USER_AGENT,
};
use hyper::Method;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::ProxyError;
use crate::headers::{self, HeaderField, HeaderFields};

/// Methods a descriptor may use.
const ALLOWED_METHODS: [Method; 8] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
    Method::TRACE,
];

/// Inbound payload of `POST /api/proxy`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyRequest {
    pub request: RequestDescriptor,
}

/// What the caller wants replayed. Untrusted.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestDescriptor {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: HeaderFields,
    #[serde(default)]
    pub body: Option<Value>,
    /// Appended to `url` as a query string before dispatch.
    #[serde(default)]
    pub params: Option<IndexMap<String, Value>>,
}

impl RequestDescriptor {
    /// Convenience constructor for a descriptor without headers or body.
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
            headers: HeaderFields::new(),
            body: None,
            params: None,
        }
    }
}

/// The two mutually exclusive ways a body goes out.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Structured value, serialized as JSON.
    Json(Value),
    /// String sent verbatim.
    Text(String),
}

impl RequestBody {
    /// Pick the framing for `body`, or `None` when nothing is sent: GET and
    /// HEAD never carry a body, and neither do null, empty strings, numbers
    /// or booleans.
    pub fn select(method: &Method, body: Option<Value>) -> Option<Self> {
        if *method == Method::GET || *method == Method::HEAD {
            return None;
        }
        match body? {
            Value::String(s) if !s.is_empty() => Some(RequestBody::Text(s)),
            v @ (Value::Object(_) | Value::Array(_)) => Some(RequestBody::Json(v)),
            _ => None,
        }
    }

    pub fn encode(&self) -> Bytes {
        match self {
            RequestBody::Json(v) => Bytes::from(v.to_string()),
            RequestBody::Text(s) => Bytes::from(s.clone()),
        }
    }
}

/// A descriptor after validation, ready for the first hop.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    /// Outbound headers for the first hop.
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
}

impl PreparedRequest {
    /// Validate `descriptor` and apply the relay's header rules.
    pub fn from_descriptor(descriptor: RequestDescriptor, user_agent: &str) -> Result<Self, ProxyError> {
        let method = parse_method(&descriptor.method)?;
        let mut url = parse_url(&descriptor.url)?;
        if let Some(params) = descriptor.params.as_ref().filter(|p| !p.is_empty()) {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, &param_string(value));
            }
        }

        let body = RequestBody::select(&method, descriptor.body);

        let mut header_fields: HeaderFields = descriptor
            .headers
            .into_iter()
            .filter(|(name, _)| {
                !name.eq_ignore_ascii_case(CONTENT_LENGTH.as_str())
                    && !name.eq_ignore_ascii_case(TRANSFER_ENCODING.as_str())
            })
            .collect();
        if headers::find(&header_fields, USER_AGENT.as_str()).is_none() {
            header_fields.insert(USER_AGENT.as_str().to_string(), HeaderField::from(user_agent));
        }
        if matches!(body, Some(RequestBody::Json(_)))
            && headers::find(&header_fields, CONTENT_TYPE.as_str()).is_none()
        {
            header_fields.insert(
                CONTENT_TYPE.as_str().to_string(),
                HeaderField::from("application/json"),
            );
        }

        let headers = to_header_map(&header_fields)?;

        Ok(Self {
            method,
            url,
            headers,
            body,
        })
    }
}

fn parse_method(raw: &str) -> Result<Method, ProxyError> {
    let upper = raw.trim().to_ascii_uppercase();
    ALLOWED_METHODS
        .iter()
        .find(|m| m.as_str() == upper)
        .cloned()
        .ok_or_else(|| ProxyError::invalid(format!("Unsupported method: {raw}")))
}

fn parse_url(raw: &str) -> Result<Url, ProxyError> {
    let url = Url::parse(raw.trim()).map_err(|e| ProxyError::invalid(format!("Invalid URL: {e}")))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        "http" | "https" => Err(ProxyError::invalid(format!("Invalid URL: {raw} has no host"))),
        other => Err(ProxyError::invalid(format!("Unsupported protocol: {other}:"))),
    }
}

/// Query-string rendering of a param value (strings unquoted).
fn param_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_header_map(fields: &HeaderFields) -> Result<HeaderMap, ProxyError> {
    let mut map = HeaderMap::with_capacity(fields.len());
    for (name, field) in fields {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ProxyError::invalid(format!("Invalid header name: {name}")))?;
        for value in field.values() {
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| ProxyError::invalid(format!("Invalid value for header {name}")))?;
            map.append(header_name.clone(), header_value);
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const UA: &str = "api-relay/test";

    fn descriptor(value: Value) -> RequestDescriptor {
        serde_json::from_value::<ProxyRequest>(json!({ "request": value }))
            .unwrap()
            .request
    }

    #[test]
    fn get_and_head_never_carry_a_body() {
        for method in [Method::GET, Method::HEAD] {
            assert!(RequestBody::select(&method, Some(json!({"a": 1}))).is_none());
            assert!(RequestBody::select(&method, Some(json!("text"))).is_none());
        }
    }

    #[test]
    fn framing_is_json_or_text() {
        assert_eq!(
            RequestBody::select(&Method::POST, Some(json!({"a": 1}))),
            Some(RequestBody::Json(json!({"a": 1})))
        );
        assert_eq!(
            RequestBody::select(&Method::PUT, Some(json!("raw"))),
            Some(RequestBody::Text("raw".into()))
        );
        assert!(RequestBody::select(&Method::POST, Some(json!(""))).is_none());
        assert!(RequestBody::select(&Method::POST, Some(json!(7))).is_none());
        assert!(RequestBody::select(&Method::POST, None).is_none());
    }

    #[test]
    fn user_agent_injected_unless_overridden() {
        let prepared =
            PreparedRequest::from_descriptor(descriptor(json!({"method": "get", "url": "http://a.test/"})), UA)
                .unwrap();
        assert_eq!(prepared.method, Method::GET);
        assert_eq!(prepared.headers[USER_AGENT], UA);

        let prepared = PreparedRequest::from_descriptor(
            descriptor(json!({"method": "GET", "url": "http://a.test/", "headers": {"User-Agent": "mine/2"}})),
            UA,
        )
        .unwrap();
        assert_eq!(prepared.headers.get_all(USER_AGENT).iter().count(), 1);
        assert_eq!(prepared.headers[USER_AGENT], "mine/2");
    }

    #[test]
    fn json_body_gets_content_type_once() {
        let prepared = PreparedRequest::from_descriptor(
            descriptor(json!({"method": "POST", "url": "http://a.test/", "body": {"k": "v"}})),
            UA,
        )
        .unwrap();
        assert_eq!(prepared.headers[CONTENT_TYPE], "application/json");
        assert_eq!(prepared.body.as_ref().unwrap().encode(), Bytes::from(r#"{"k":"v"}"#));

        let prepared = PreparedRequest::from_descriptor(
            descriptor(json!({
                "method": "POST",
                "url": "http://a.test/",
                "headers": {"Content-Type": "application/vnd.api+json"},
                "body": {"k": "v"}
            })),
            UA,
        )
        .unwrap();
        assert_eq!(prepared.headers[CONTENT_TYPE], "application/vnd.api+json");
    }

    #[test]
    fn text_body_adds_no_content_type() {
        let prepared = PreparedRequest::from_descriptor(
            descriptor(json!({"method": "POST", "url": "http://a.test/", "body": "a=1&b=2"})),
            UA,
        )
        .unwrap();
        assert!(prepared.headers.get(CONTENT_TYPE).is_none());
        assert_eq!(prepared.body, Some(RequestBody::Text("a=1&b=2".into())));
    }

    #[test]
    fn params_extend_existing_query() {
        let prepared = PreparedRequest::from_descriptor(
            descriptor(json!({
                "method": "GET",
                "url": "http://a.test/search?q=rust",
                "params": {"page": 2, "lang": "en us"}
            })),
            UA,
        )
        .unwrap();
        assert_eq!(prepared.url.as_str(), "http://a.test/search?q=rust&page=2&lang=en+us");
    }

    #[test]
    fn caller_framing_headers_are_dropped() {
        let prepared = PreparedRequest::from_descriptor(
            descriptor(json!({
                "method": "POST",
                "url": "http://a.test/",
                "headers": {"Content-Length": "999", "X-Tags": ["a", "b"]},
                "body": "x"
            })),
            UA,
        )
        .unwrap();
        assert!(prepared.headers.get(CONTENT_LENGTH).is_none());
        assert_eq!(prepared.headers.get_all("x-tags").iter().count(), 2);
    }

    #[test]
    fn rejects_bad_descriptors() {
        for bad in [
            json!({"method": "BREW", "url": "http://a.test/"}),
            json!({"method": "GET", "url": "not a url"}),
            json!({"method": "GET", "url": "ftp://a.test/"}),
            json!({"method": "GET", "url": "http://a.test/", "headers": {"bad header": "x"}}),
            json!({"method": "GET", "url": "http://a.test/", "headers": {"x-ok": "line\nbreak"}}),
        ] {
            let err = PreparedRequest::from_descriptor(descriptor(bad), UA).unwrap_err();
            assert!(matches!(err, ProxyError::InvalidRequest(_)), "{err}");
        }
    }
}
