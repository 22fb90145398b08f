//! Envelope assembly: the JSON document returned for one forwarded call.

use hyper::header::CONTENT_TYPE;
use hyper::Version;
use serde::Serialize;

use crate::cookies::CookieRecord;
use crate::forward::Exchange;
use crate::headers::{self, HeaderFields};
use crate::inspect::{compute_body_size, compute_header_size, get_network_info, BodyShape, NetworkInfo};
use crate::net::TimingPhases;

/// Success reply of `POST /api/proxy`.
#[derive(Debug, Clone, Serialize)]
pub struct ProxyEnvelope {
    pub response: ResponsePayload,
    pub request: RequestSummary,
}

/// The final origin response with its telemetry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePayload {
    pub status: u16,
    pub status_text: String,
    /// Final hop's headers only.
    pub headers: HeaderFields,
    /// Every cookie seen across the chain, `null` when there were none.
    pub cookies: Option<Vec<CookieRecord>>,
    pub body: BodyPayload,
    pub meta: ResponseMeta,
}

/// Raw response bytes and their declared media type.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyPayload {
    pub content: Vec<u8>,
    pub media_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseMeta {
    pub timings: TimingPhases,
    pub size: SizeSummary,
    pub network: NetworkInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SizeSummary {
    pub headers: usize,
    pub body: usize,
    pub total: usize,
}

impl SizeSummary {
    fn new(headers: usize, body: usize) -> Self {
        Self {
            headers,
            body,
            total: headers + body,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestSummary {
    pub meta: RequestMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestMeta {
    pub size: SizeSummary,
}

/// Node-style protocol label for the final hop.
pub fn http_version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "1.1",
    }
}

/// Combine an exchange into the envelope. Never fails.
pub fn assemble(exchange: Exchange) -> ProxyEnvelope {
    let Exchange {
        response,
        cookies,
        request_headers,
        request_body,
    } = exchange;

    let request_size = SizeSummary::new(
        compute_header_size(&request_headers),
        compute_body_size(BodyShape::from(request_body.as_ref())),
    );

    let response_headers = headers::from_header_map(&response.headers);
    let media_type = headers::find(&response_headers, CONTENT_TYPE.as_str()).map(|v| v.joined());
    let response_size = SizeSummary::new(
        compute_header_size(&response_headers),
        compute_body_size(BodyShape::Binary(&response.body)),
    );
    let network = get_network_info(&response.connection, http_version_label(response.version));

    ProxyEnvelope {
        response: ResponsePayload {
            status: response.status.as_u16(),
            status_text: response.status_text,
            headers: response_headers,
            cookies,
            body: BodyPayload {
                content: response.body.to_vec(),
                media_type,
            },
            meta: ResponseMeta {
                timings: response.timings,
                size: response_size,
                network,
            },
        },
        request: RequestSummary {
            meta: RequestMeta { size: request_size },
        },
    }
}
