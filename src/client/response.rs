//! Responses returned by the client seam.

use crate::net::ConnectionGuard;

#[derive(Debug)]
enum Body {
    Buffered(String),
    /// Headers-only; the body is still on the connection.
    Deferred(reqwest::Response),
    DeferredBlocking(reqwest::blocking::Response),
}

/// A response owned by the caller.
///
/// Holding one keeps the underlying connection (for headers-only responses)
/// and a slot in the issuing client's live-response count. Both are released
/// by [`ClientResponse::release`] or by dropping it.
#[derive(Debug)]
pub struct ClientResponse {
    status: u16,
    content_length: Option<u64>,
    body: Body,
    _live: ConnectionGuard,
}

impl ClientResponse {
    pub(crate) fn buffered(
        status: u16,
        content_length: Option<u64>,
        text: String,
        live: ConnectionGuard,
    ) -> Self {
        Self {
            status,
            content_length,
            body: Body::Buffered(text),
            _live: live,
        }
    }

    pub(crate) fn deferred(response: reqwest::Response, live: ConnectionGuard) -> Self {
        Self {
            status: response.status().as_u16(),
            content_length: response.content_length(),
            body: Body::Deferred(response),
            _live: live,
        }
    }

    pub(crate) fn deferred_blocking(
        response: reqwest::blocking::Response,
        live: ConnectionGuard,
    ) -> Self {
        Self {
            status: response.status().as_u16(),
            content_length: response.content_length(),
            body: Body::DeferredBlocking(response),
            _live: live,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Declared `Content-Length`, if the server sent one.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Buffered body text; `None` for headers-only responses.
    pub fn body(&self) -> Option<&str> {
        match &self.body {
            Body::Buffered(text) => Some(text),
            Body::Deferred(_) | Body::DeferredBlocking(_) => None,
        }
    }

    pub fn is_body_deferred(&self) -> bool {
        !matches!(self.body, Body::Buffered(_))
    }

    /// Release the response and everything it holds.
    pub fn release(self) {
        drop(self);
    }
}
