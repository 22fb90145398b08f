//! HTTP surface of the relay.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum router, middleware stack, graceful shutdown)
//!     → request.rs (x-request-id generation and lookup)
//!     → forward::Forwarder (descriptor → envelope)
//!     → response.rs (ProxyError → 500 "Proxy Error" body)
//!     → Send to caller
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{request_id, UuidRequestId, X_REQUEST_ID};
pub use response::ErrorBody;
pub use server::{AppState, RelayServer, StatusReport};
