//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Loopback listener (net)
//!     → server.rs (accept exactly one connection, or inject a fault)
//!     → request.rs (consume lines up to the blank line; body ignored)
//!     → response.rs (canned 200 OK with Content-Length framing)
//!     → half-close (or hold until the peer closes), release listener and connection
//! ```

pub mod request;
pub mod response;
pub mod server;

use thiserror::Error;

use crate::net::ListenerError;

pub use response::{build_response, declared_content_length, response_body};
pub use server::{AbortHandle, AsyncSyntheticServer, ExchangeReport, FaultMode, SyntheticServer};

/// Errors raised by the synthetic server side of an exchange.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("listener setup failed: {0}")]
    Listener(#[from] ListenerError),

    #[error("failed to register listener with the runtime: {0}")]
    Register(#[source] std::io::Error),

    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    #[error("failed to read request head: {0}")]
    Read(#[source] std::io::Error),

    #[error("connection closed after {bytes_read} bytes, before the request head ended")]
    RequestTruncated { bytes_read: usize },

    #[error("request head exceeded {bytes_read} bytes")]
    RequestTooLarge { bytes_read: usize },

    #[error("failed to write response: {0}")]
    Write(#[source] std::io::Error),

    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("exchange aborted before the request head was read")]
    Aborted,
}
