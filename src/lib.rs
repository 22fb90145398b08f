//! API relay library.
//!
//! Accepts a caller-described HTTP request, replays it against the origin,
//! follows redirects with a per-call cookie jar and returns the final
//! response together with timing, size and transport telemetry.

pub mod config;
pub mod cookies;
pub mod envelope;
pub mod error;
pub mod forward;
pub mod headers;
pub mod http;
pub mod inspect;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::RelayConfig;
pub use envelope::ProxyEnvelope;
pub use error::ProxyError;
pub use forward::{Forwarder, RequestDescriptor};
pub use http::RelayServer;
pub use lifecycle::Shutdown;
