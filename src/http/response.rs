//! Response construction for the synthetic server.
//!
//! # Responsibilities
//! - Format a complete HTTP/1.1 `200 OK` response around a text body
//! - Read the framing back out for verification
//!
//! # Design Decisions
//! - `Content-Length` is the byte length of the body; bodies are ASCII
//! - The body is followed by a trailing CRLF that is not counted by the
//!   declared length, so well-behaved clients stop reading before it

/// Header/body separator.
const HEAD_TERMINATOR: &str = "\r\n\r\n";

/// Build a `200 OK` text/plain response carrying `body`.
pub fn build_response(body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{}\r\n",
        body.len(),
        body
    )
}

/// Extract the declared `Content-Length` from a raw response.
pub fn declared_content_length(response: &str) -> Option<usize> {
    let (head, _) = response.split_once(HEAD_TERMINATOR)?;
    head.lines().skip(1).find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

/// Return the body bytes framed by the declared `Content-Length`.
///
/// `None` when the head is incomplete or the response is shorter than its
/// declared length.
pub fn response_body(response: &str) -> Option<&str> {
    let length = declared_content_length(response)?;
    let (_, rest) = response.split_once(HEAD_TERMINATOR)?;
    rest.get(..length)
}
