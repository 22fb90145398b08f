//! Request forwarding.
//!
//! # Data Flow
//! ```text
//! RequestDescriptor (untrusted JSON)
//!     → descriptor.rs (validate method/URL/headers, pick body framing)
//!     → engine.rs (one connection per hop, jar replay, timing)
//!         ↔ redirect.rs (which statuses are followed, next-hop rewrite)
//!         → hooks.rs (RedirectObserver sees every redirect hop)
//!     → Exchange
//!     → envelope::assemble
//! ```
//!
//! # Design Decisions
//! - Validation failures and transport failures share `ProxyError`
//! - The redirect cap is a hard failure, never a truncated chain

pub mod descriptor;
pub mod engine;
pub mod hooks;
pub mod redirect;

pub use descriptor::{PreparedRequest, ProxyRequest, RequestBody, RequestDescriptor};
pub use engine::{Exchange, FinalResponse, Forwarder};
pub use hooks::RedirectObserver;
pub use redirect::HopRequest;
