//! Spans for forwarded calls.

use tracing::Span;

/// Span wrapping one `POST /api/proxy` call from descriptor to envelope.
pub fn forward_span(request_id: &str, method: &str, url: &str) -> Span {
    tracing::info_span!("forward", request_id = %request_id, method = %method, url = %url)
}
