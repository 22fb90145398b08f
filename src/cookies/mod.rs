//! Cookie state for one forwarded call.
//!
//! # Data Flow
//! ```text
//! each hop's response headers
//!     → parse.rs (Set-Cookie → SetCookie, one per header line)
//!     ├→ jar.rs         (ReplayJar: RFC 6265 store, sent back on later hops)
//!     └→ accumulator.rs (CookieAccumulator: append-only list for the caller)
//! ```
//!
//! # Design Decisions
//! - Two structures with two lifetimes: the jar only feeds outbound `cookie`
//!   headers and is dropped with the call; the accumulator is what the
//!   caller sees and never deduplicates
//! - Both are created per call; nothing is shared across calls

pub mod accumulator;
pub mod jar;
pub mod parse;

pub use accumulator::{CookieAccumulator, CookieRecord};
pub use jar::ReplayJar;
pub use parse::{parse_set_cookie, SameSite, SetCookie};
