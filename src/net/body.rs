//! Outbound request body that records when it has been fully handed over.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::{Body, Frame, SizeHint};

use crate::net::timing::UploadMarker;

/// `Full<Bytes>` that stamps the upload marker on its last frame.
#[derive(Debug)]
pub struct TimedBody {
    inner: Full<Bytes>,
    uploaded: UploadMarker,
}

impl TimedBody {
    pub fn new(data: Bytes, uploaded: UploadMarker) -> Self {
        Self {
            inner: Full::new(data),
            uploaded,
        }
    }

    pub fn empty(uploaded: UploadMarker) -> Self {
        Self::new(Bytes::new(), uploaded)
    }

    fn stamp(&self) {
        let _ = self.uploaded.set(Instant::now());
    }
}

impl Body for TimedBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(None) => this.stamp(),
            Poll::Ready(Some(_)) if this.inner.is_end_stream() => this.stamp(),
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
