//! Outbound HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! Client::call(ctx, operation, request)
//!     → client.rs (breaker admission, effective deadline)
//!     → headers.rs (trace context, user agent)
//!     → transport.rs (hyper-util pool, or any tower service)
//!     → client.rs (classify outcome, record on breaker)
//!     → response or error.rs kind back to the caller
//! ```

pub mod client;
pub mod error;
pub mod headers;
pub mod transport;

pub use client::Client;
pub use error::CallError;
pub use transport::{from_service, BoxError, HyperTransport, SharedTransport, TowerTransport, Transport, TransportTimeouts};
