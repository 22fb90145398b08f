//! Per-hop phase timestamps.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Phase durations in milliseconds. Phases that never happened are 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingPhases {
    pub wait: f64,
    pub dns: f64,
    pub tcp: f64,
    pub tls: f64,
    pub request: f64,
    pub first_byte: f64,
    pub download: f64,
    pub total: f64,
}

/// Shared slot the request body fills once it has been fully written.
pub type UploadMarker = Arc<OnceLock<Instant>>;

/// Timestamps for one request/response exchange.
#[derive(Debug, Clone)]
pub struct HopClock {
    start: Instant,
    socket: Option<Instant>,
    lookup: Option<Instant>,
    connect: Option<Instant>,
    secure_connect: Option<Instant>,
    upload: UploadMarker,
    response: Option<Instant>,
    end: Option<Instant>,
}

impl HopClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
            socket: None,
            lookup: None,
            connect: None,
            secure_connect: None,
            upload: Arc::new(OnceLock::new()),
            response: None,
            end: None,
        }
    }

    pub fn mark_socket(&mut self) {
        self.socket = Some(Instant::now());
    }

    pub fn mark_lookup(&mut self) {
        self.lookup = Some(Instant::now());
    }

    pub fn mark_connect(&mut self) {
        self.connect = Some(Instant::now());
    }

    pub fn mark_secure_connect(&mut self) {
        self.secure_connect = Some(Instant::now());
    }

    /// Record upload completion unless the body already did.
    pub fn mark_upload(&self) {
        let _ = self.upload.set(Instant::now());
    }

    pub fn mark_response(&mut self) {
        self.response = Some(Instant::now());
    }

    pub fn mark_end(&mut self) {
        self.end = Some(Instant::now());
    }

    /// Handle given to the request body so it can stamp its own completion.
    pub fn upload_marker(&self) -> UploadMarker {
        Arc::clone(&self.upload)
    }

    /// Time since the hop started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn phases(&self) -> TimingPhases {
        let upload = self.upload.get().copied();
        let ready = self.secure_connect.or(self.connect);
        TimingPhases {
            wait: between(Some(self.start), self.socket),
            dns: between(self.socket, self.lookup),
            tcp: between(self.lookup, self.connect),
            tls: between(self.connect, self.secure_connect),
            request: between(ready, upload),
            first_byte: between(upload, self.response),
            download: between(self.response, self.end),
            total: between(Some(self.start), self.end),
        }
    }
}

fn between(from: Option<Instant>, to: Option<Instant>) -> f64 {
    match (from, to) {
        (Some(a), Some(b)) => b.saturating_duration_since(a).as_secs_f64() * 1000.0,
        _ => 0.0,
    }
}
