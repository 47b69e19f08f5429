//! Client-under-test seam.
//!
//! # Data Flow
//! ```text
//! scenario iteration
//!     → HttpClient::get / BlockingHttpClient::get (url, completion mode)
//!     → reqwest (connect, send, read headers, optionally buffer body)
//!     → ClientResponse (owned by the caller, counted until released)
//! ```
//!
//! # Design Decisions
//! - Scenarios depend on the two traits, not on reqwest directly
//! - Connection pooling is off: each synthetic server serves one exchange,
//!   and async workers each run their own runtime
//! - Errors are classified once, at the seam, into connection / timeout /
//!   protocol buckets

pub mod reqwest_client;
pub mod response;

use std::future::Future;

use thiserror::Error;
use url::Url;

use crate::net::ConnectionTracker;

pub use reqwest_client::{BlockingStressClient, StressClient};
pub use response::ClientResponse;

/// How much of the response `get` waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionMode {
    /// Return after the whole body has been buffered.
    #[default]
    ReadFullBody,
    /// Return as soon as the headers are in; the body stays on the wire.
    ReadHeadersOnly,
}

impl CompletionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadFullBody => "full-body",
            Self::ReadHeadersOnly => "headers-only",
        }
    }
}

/// Failures surfaced by the client under test.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Target unreachable, reset, or closed before a response arrived.
    #[error("connection failed: {0}")]
    Connection(#[source] reqwest::Error),

    #[error("request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    /// Response did not match its own framing.
    #[error("malformed response: {0}")]
    Protocol(#[source] reqwest::Error),

    #[error("failed to build client: {0}")]
    Build(#[source] reqwest::Error),
}

impl ClientError {
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            Self::Build(e)
        } else if e.is_timeout() {
            Self::Timeout(e)
        } else if e.is_body() || e.is_decode() {
            Self::Protocol(e)
        } else {
            Self::Connection(e)
        }
    }
}

/// An async HTTP client driven by the scenarios.
pub trait HttpClient: Send + Sync {
    fn get(
        &self,
        url: &Url,
        mode: CompletionMode,
    ) -> impl Future<Output = Result<ClientResponse, ClientError>> + Send;

    /// Responses handed out by this client and not yet released.
    fn live_responses(&self) -> &ConnectionTracker;
}

/// A blocking HTTP client driven by the scenarios.
///
/// Implementations may run their own runtime internally; call them from
/// plain threads, never from inside an async context.
pub trait BlockingHttpClient: Send + Sync {
    fn get(&self, url: &Url, mode: CompletionMode) -> Result<ClientResponse, ClientError>;

    fn live_responses(&self) -> &ConnectionTracker;
}
