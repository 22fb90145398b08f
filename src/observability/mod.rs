//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! http handler / forwarding engine
//!     → spans.rs (one span per forwarded call, carrying the request id)
//!     → logging.rs (tracing-subscriber: env filter + pretty or JSON output)
//!     → metrics.rs (counters and histograms, Prometheus scrape endpoint)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows from the HTTP layer into the forwarding span
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
pub mod spans;

pub use logging::init_logging;
pub use spans::forward_span;
