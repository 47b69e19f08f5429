//! Loopback TCP listener construction.
//!
//! # Responsibilities
//! - Bind an OS-assigned ephemeral port on the IPv4 loopback interface
//! - Apply the caller's listen backlog (std's `bind` fixes it at 128)
//! - Hand back a plain `std::net::TcpListener` for blocking or async use

use std::net::{Ipv4Addr, SocketAddr, TcpListener};

use socket2::{Domain, Protocol, Socket, Type};

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to create or bind the socket.
    Bind(std::io::Error),
    /// Failed to start listening.
    Listen(std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ListenerError::Listen(e) => write!(f, "Failed to listen: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::Bind(e) | ListenerError::Listen(e) => Some(e),
        }
    }
}

/// Bind `127.0.0.1:0` and start listening with `backlog` pending connections.
pub fn bind_loopback(backlog: i32) -> Result<TcpListener, ListenerError> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
        .map_err(ListenerError::Bind)?;

    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
    socket.bind(&addr.into()).map_err(ListenerError::Bind)?;
    socket.listen(backlog).map_err(ListenerError::Listen)?;

    let listener: TcpListener = socket.into();
    if let Ok(local_addr) = listener.local_addr() {
        tracing::trace!(address = %local_addr, backlog, "Loopback listener bound");
    }
    Ok(listener)
}
