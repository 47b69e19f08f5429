//! Request head consumption.
//!
//! The synthetic server does not parse requests. It only needs to know when
//! the client has finished sending headers, which is the first empty line.
//! Any request body is left unread.

use std::io::BufRead;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::http::ServerError;

/// Upper bound on the request head; a peer exceeding it is not an HTTP client.
pub const MAX_REQUEST_HEAD_BYTES: usize = 64 * 1024;

/// Outcome of feeding one line to the head scanner.
enum Line {
    Header,
    End,
}

fn classify(line: &str) -> Line {
    if line.trim_end_matches(['\r', '\n']).is_empty() {
        Line::End
    } else {
        Line::Header
    }
}

fn check_budget(bytes_read: usize) -> Result<(), ServerError> {
    if bytes_read > MAX_REQUEST_HEAD_BYTES {
        return Err(ServerError::RequestTooLarge { bytes_read });
    }
    Ok(())
}

/// Read lines until the blank line that ends the request head.
///
/// Returns the number of bytes consumed.
pub fn read_request_head<R: BufRead>(reader: &mut R) -> Result<usize, ServerError> {
    let mut line = String::new();
    let mut bytes_read = 0;
    loop {
        line.clear();
        let n = reader.read_line(&mut line).map_err(ServerError::Read)?;
        if n == 0 {
            return Err(ServerError::RequestTruncated { bytes_read });
        }
        bytes_read += n;
        if let Line::End = classify(&line) {
            return Ok(bytes_read);
        }
        check_budget(bytes_read)?;
    }
}

/// Async counterpart of [`read_request_head`].
pub async fn read_request_head_async<R>(reader: &mut R) -> Result<usize, ServerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let mut bytes_read = 0;
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await.map_err(ServerError::Read)?;
        if n == 0 {
            return Err(ServerError::RequestTruncated { bytes_read });
        }
        bytes_read += n;
        if let Line::End = classify(&line) {
            return Ok(bytes_read);
        }
        check_budget(bytes_read)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const REQUEST: &str = "GET / HTTP/1.1\r\nHost: 127.0.0.1\r\nAccept: */*\r\n\r\nleftover body";

    #[test]
    fn stops_at_blank_line() {
        let mut reader = Cursor::new(REQUEST.as_bytes());
        let read = read_request_head(&mut reader).unwrap();
        assert_eq!(read, REQUEST.find("leftover").unwrap());
    }

    #[test]
    fn bare_newlines_are_accepted() {
        let mut reader = Cursor::new(&b"GET / HTTP/1.1\nHost: x\n\n"[..]);
        assert_eq!(read_request_head(&mut reader).unwrap(), 24);
    }

    #[test]
    fn eof_before_blank_line_is_truncation() {
        let mut reader = Cursor::new(&b"GET / HTTP/1.1\r\nHost: x\r\n"[..]);
        match read_request_head(&mut reader) {
            Err(ServerError::RequestTruncated { bytes_read }) => assert_eq!(bytes_read, 25),
            other => panic!("expected truncation, got {:?}", other),
        }
    }

    #[test]
    fn oversized_head_is_rejected() {
        let header = format!("X-Filler: {}\r\n", "a".repeat(1024));
        let request = format!("GET / HTTP/1.1\r\n{}\r\n", header.repeat(80));
        let mut reader = Cursor::new(request.into_bytes());
        assert!(matches!(
            read_request_head(&mut reader),
            Err(ServerError::RequestTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn async_reader_matches_blocking_reader() {
        let mut reader = tokio::io::BufReader::new(REQUEST.as_bytes());
        let read = read_request_head_async(&mut reader).await.unwrap();
        assert_eq!(read, REQUEST.find("leftover").unwrap());
    }
}
