//! Outbound network layer.
//!
//! # Data Flow
//! ```text
//! hop URL
//!     → connection.rs (DNS lookup → TCP connect → optional TLS → hyper handshake)
//!     → tls.rs (rustls client config, ALPN, trust roots)
//!     → timing.rs (per-hop phase timestamps)
//!     → body.rs (request body that timestamps its own upload)
//!     → OriginConnection handed to the forwarding engine
//! ```
//!
//! # Design Decisions
//! - One connection per hop so every hop's phases are measured from scratch
//! - The hyper connection driver runs in a task aborted when the connection
//!   is dropped; cancelling a call never leaks a socket
//! - Plaintext connections carry no TLS details at all

pub mod body;
pub mod connection;
pub mod timing;
pub mod tls;

pub use body::TimedBody;
pub use connection::{ConnectionId, Connector, OriginConnection};
pub use timing::{HopClock, TimingPhases};
