//! Size and network inspection.
//!
//! # Data Flow
//! ```text
//! caller's request headers/body ──┐
//! final response headers/bytes ───┼─→ size.rs (wire-format byte counts)
//! final hop connection details ───┴─→ network.rs (addresses, TLS summary)
//!     → envelope assembly
//! ```
//!
//! # Design Decisions
//! - Pure functions, never fail; unknown shapes count as zero bytes
//! - Header size approximates the HTTP/1 wire block, not in-memory size

pub mod network;
pub mod size;

pub use network::{get_network_info, CertificateSummary, ConnectionDetails, NetworkInfo, TlsDetails};
pub use size::{compute_body_size, compute_header_size, BodyShape};
