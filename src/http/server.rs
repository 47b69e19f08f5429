//! Single-exchange synthetic HTTP server.
//!
//! # Responsibilities
//! - Bind an ephemeral loopback port with a scenario-chosen backlog
//! - Accept exactly one connection and consume its request head
//! - Write a canned response and half-close, or inject a fault instead
//! - Optionally hold the connection open until the peer closes it
//! - Release the listener and connection on every exit path
//!
//! Two variants share the same wire behaviour:
//! - [`SyntheticServer`] blocks the calling thread
//! - [`AsyncSyntheticServer`] suspends on the tokio runtime it was created in
//!
//! A blocked [`SyntheticServer::accept_and_respond`] can be woken through an
//! [`AbortHandle`], whether it is waiting in accept or on the accepted
//! connection. The async variant is cancelled by dropping its future.

use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use url::Url;

use crate::http::request::{read_request_head, read_request_head_async};
use crate::http::ServerError;
use crate::net::{bind_loopback, ConnectionGuard, ConnectionTracker};
use crate::observability::metrics;

/// How long an abort waits for its wake-up connection.
const ABORT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// What the server does with its one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultMode {
    /// Read the request head, write the response, half-close.
    #[default]
    Respond,
    /// Read the request head, then close without writing anything.
    AbortAfterRequest,
    /// Close the listening socket without ever accepting.
    CloseWithoutAccept,
}

impl FaultMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Respond => "respond",
            Self::AbortAfterRequest => "abort-after-request",
            Self::CloseWithoutAccept => "close-without-accept",
        }
    }
}

impl std::fmt::Display for FaultMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FaultMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "respond" => Ok(Self::Respond),
            "abort-after-request" | "abort" => Ok(Self::AbortAfterRequest),
            "close-without-accept" | "close" => Ok(Self::CloseWithoutAccept),
            _ => Err(format!("Unknown fault mode: {}", s)),
        }
    }
}

/// What happened during one exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeReport {
    /// Peer address, if a connection was accepted.
    pub peer: Option<SocketAddr>,
    /// Bytes of request head consumed.
    pub request_bytes: usize,
    /// Bytes of response written.
    pub response_bytes: usize,
}

fn endpoint_url(addr: SocketAddr) -> Result<Url, ServerError> {
    Ok(Url::parse(&format!("http://{}/", addr))?)
}

fn timed_out(what: &str) -> ServerError {
    ServerError::Read(std::io::Error::new(std::io::ErrorKind::TimedOut, what.to_owned()))
}

fn ignore_not_connected(result: std::io::Result<()>) -> std::io::Result<()> {
    match result {
        Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
        other => other,
    }
}

/// The accepted connection, shared with [`AbortHandle`] so an abort can
/// shut it down under a blocked read.
type AcceptedSlot = Arc<Mutex<Option<TcpStream>>>;

/// Wakes a [`SyntheticServer`] blocked in accept or on its connection.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    addr: SocketAddr,
    aborted: Arc<AtomicBool>,
    accepted: AcceptedSlot,
}

impl AbortHandle {
    /// Mark the exchange aborted and unblock the server: shut down the
    /// accepted connection if there is one, otherwise poke the listener so
    /// accept returns.
    pub fn abort(&self) {
        if self.aborted.swap(true, Ordering::SeqCst) {
            return;
        }
        let accepted = self
            .accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match accepted {
            // Already closed by the server is fine too.
            Some(stream) => {
                let _ = stream.shutdown(Shutdown::Both);
            }
            // The listener may already be gone; either way accept is no longer blocked.
            None => {
                let _ = TcpStream::connect_timeout(&self.addr, ABORT_CONNECT_TIMEOUT);
            }
        }
        tracing::debug!(address = %self.addr, "Synthetic server aborted");
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// Blocking single-exchange server.
#[derive(Debug)]
pub struct SyntheticServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    url: Url,
    read_timeout: Option<Duration>,
    aborted: Arc<AtomicBool>,
    accepted: AcceptedSlot,
    tracker: Option<ConnectionTracker>,
    _listener_guard: Option<ConnectionGuard>,
}

impl SyntheticServer {
    /// Bind `127.0.0.1:0` with the given backlog.
    pub fn listen(backlog: i32) -> Result<Self, ServerError> {
        let listener = bind_loopback(backlog)?;
        let local_addr = listener.local_addr().map_err(ServerError::Accept)?;
        Ok(Self {
            listener,
            local_addr,
            url: endpoint_url(local_addr)?,
            read_timeout: None,
            aborted: Arc::new(AtomicBool::new(false)),
            accepted: Arc::new(Mutex::new(None)),
            tracker: None,
            _listener_guard: None,
        })
    }

    /// Bound the time spent waiting for the request head.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Count this listener and its accepted connection in `tracker`.
    pub fn tracked(mut self, tracker: &ConnectionTracker) -> Self {
        self._listener_guard = Some(tracker.track());
        self.tracker = Some(tracker.clone());
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Target URL for clients: `http://127.0.0.1:<port>/`.
    pub fn url(&self) -> Url {
        self.url.clone()
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            addr: self.local_addr,
            aborted: Arc::clone(&self.aborted),
            accepted: Arc::clone(&self.accepted),
        }
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Serve the one exchange, consuming the server.
    pub fn accept_and_respond(
        self,
        response: &str,
        fault: FaultMode,
    ) -> Result<ExchangeReport, ServerError> {
        let accepted = Arc::clone(&self.accepted);
        let result = self.exchange(response, fault);
        // The abort handle's clone must not keep the socket open.
        accepted.lock().unwrap_or_else(PoisonError::into_inner).take();
        metrics::record_exchange(fault, result.is_ok());
        result
    }

    fn exchange(self, response: &str, fault: FaultMode) -> Result<ExchangeReport, ServerError> {
        if fault == FaultMode::CloseWithoutAccept {
            tracing::debug!(address = %self.local_addr, "Closing listener without accepting");
            return Ok(ExchangeReport::default());
        }

        let (stream, peer) = self.listener.accept().map_err(ServerError::Accept)?;
        let _connection = self.tracker.as_ref().map(ConnectionTracker::track);
        // Publish before checking the flag: an abort either sees the stream
        // or is seen here.
        if let Ok(clone) = stream.try_clone() {
            *self.accepted.lock().unwrap_or_else(PoisonError::into_inner) = Some(clone);
        }
        if self.is_aborted() {
            return Err(ServerError::Aborted);
        }
        tracing::trace!(peer_addr = %peer, "Synthetic server accepted");

        stream
            .set_read_timeout(self.read_timeout)
            .map_err(ServerError::Read)?;
        let request_bytes = match read_request_head(&mut BufReader::new(&stream)) {
            Ok(bytes) => bytes,
            Err(_) if self.is_aborted() => return Err(ServerError::Aborted),
            Err(e) => return Err(e),
        };

        let mut report = ExchangeReport {
            peer: Some(peer),
            request_bytes,
            response_bytes: 0,
        };
        if fault == FaultMode::AbortAfterRequest {
            return Ok(report);
        }

        let mut writer = &stream;
        writer
            .write_all(response.as_bytes())
            .map_err(ServerError::Write)?;
        writer.flush().map_err(ServerError::Write)?;
        ignore_not_connected(stream.shutdown(Shutdown::Write)).map_err(ServerError::Write)?;
        report.response_bytes = response.len();
        Ok(report)
    }
}

/// Suspending single-exchange server.
///
/// Must be created inside a tokio runtime; the listener is registered with
/// that runtime's reactor.
#[derive(Debug)]
pub struct AsyncSyntheticServer {
    listener: tokio::net::TcpListener,
    local_addr: SocketAddr,
    url: Url,
    read_timeout: Option<Duration>,
    linger: bool,
    tracker: Option<ConnectionTracker>,
    _listener_guard: Option<ConnectionGuard>,
}

impl AsyncSyntheticServer {
    /// Bind `127.0.0.1:0` with the given backlog.
    pub fn listen(backlog: i32) -> Result<Self, ServerError> {
        let listener = bind_loopback(backlog)?;
        listener
            .set_nonblocking(true)
            .map_err(ServerError::Register)?;
        let listener = tokio::net::TcpListener::from_std(listener).map_err(ServerError::Register)?;
        let local_addr = listener.local_addr().map_err(ServerError::Accept)?;
        Ok(Self {
            listener,
            local_addr,
            url: endpoint_url(local_addr)?,
            read_timeout: None,
            linger: false,
            tracker: None,
            _listener_guard: None,
        })
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn tracked(mut self, tracker: &ConnectionTracker) -> Self {
        self._listener_guard = Some(tracker.track());
        self.tracker = Some(tracker.clone());
        self
    }

    /// After responding, keep the connection open (no half-close) and
    /// counted until the peer closes or resets it. Bounded by the read
    /// timeout, which fails the exchange when it expires.
    pub fn hold_until_peer_close(mut self) -> Self {
        self.linger = true;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn url(&self) -> Url {
        self.url.clone()
    }

    /// Serve the one exchange, consuming the server.
    pub async fn accept_and_respond(
        self,
        response: &str,
        fault: FaultMode,
    ) -> Result<ExchangeReport, ServerError> {
        let result = self.exchange(response, fault).await;
        metrics::record_exchange(fault, result.is_ok());
        result
    }

    async fn exchange(self, response: &str, fault: FaultMode) -> Result<ExchangeReport, ServerError> {
        if fault == FaultMode::CloseWithoutAccept {
            tracing::debug!(address = %self.local_addr, "Closing listener without accepting");
            return Ok(ExchangeReport::default());
        }

        let (mut stream, peer) = self.listener.accept().await.map_err(ServerError::Accept)?;
        let _connection = self.tracker.as_ref().map(ConnectionTracker::track);
        tracing::trace!(peer_addr = %peer, "Synthetic server accepted");

        let (read_half, mut write_half) = stream.split();
        let mut reader = tokio::io::BufReader::new(read_half);
        let request_bytes = match self.read_timeout {
            Some(timeout) => tokio::time::timeout(timeout, read_request_head_async(&mut reader))
                .await
                .map_err(|_| timed_out("request head not received in time"))??,
            None => read_request_head_async(&mut reader).await?,
        };

        let mut report = ExchangeReport {
            peer: Some(peer),
            request_bytes,
            response_bytes: 0,
        };
        if fault == FaultMode::AbortAfterRequest {
            return Ok(report);
        }

        write_half
            .write_all(response.as_bytes())
            .await
            .map_err(ServerError::Write)?;
        write_half.flush().await.map_err(ServerError::Write)?;
        report.response_bytes = response.len();
        if !self.linger {
            ignore_not_connected(write_half.shutdown().await).map_err(ServerError::Write)?;
            return Ok(report);
        }

        // A reset counts as closed; only a peer that stays silent and open fails.
        let mut sink = tokio::io::sink();
        let drained = tokio::io::copy(&mut reader, &mut sink);
        match self.read_timeout {
            Some(timeout) => {
                if tokio::time::timeout(timeout, drained).await.is_err() {
                    return Err(timed_out("peer kept the connection open"));
                }
            }
            None => {
                let _ = drained.await;
            }
        }
        tracing::trace!(peer_addr = %peer, "Peer closed held connection");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::build_response;
    use std::io::Read;
    use std::thread;
    use std::time::Instant;
    use tokio::io::AsyncReadExt;

    const REQUEST: &[u8] = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";

    fn raw_exchange(addr: SocketAddr) -> std::io::Result<String> {
        let mut stream = TcpStream::connect(addr)?;
        stream.write_all(REQUEST)?;
        let mut response = String::new();
        stream.read_to_string(&mut response)?;
        Ok(response)
    }

    #[test]
    fn blocking_server_answers_one_request() {
        let server = SyntheticServer::listen(1).unwrap();
        let addr = server.local_addr();
        let body = build_response("hello");

        let client = thread::spawn(move || raw_exchange(addr).unwrap());
        let report = server.accept_and_respond(&body, FaultMode::Respond).unwrap();

        assert_eq!(client.join().unwrap(), body);
        assert_eq!(report.request_bytes, REQUEST.len());
        assert_eq!(report.response_bytes, body.len());
        assert!(report.peer.is_some());
    }

    #[test]
    fn url_points_at_loopback_port() {
        let server = SyntheticServer::listen(1).unwrap();
        let url = server.url();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.host_str(), Some("127.0.0.1"));
        assert_eq!(url.port(), Some(server.local_addr().port()));
        assert_eq!(url.path(), "/");
    }

    #[test]
    fn abort_after_request_writes_nothing() {
        let server = SyntheticServer::listen(1).unwrap();
        let addr = server.local_addr();

        let client = thread::spawn(move || raw_exchange(addr));
        let report = server
            .accept_and_respond("unused", FaultMode::AbortAfterRequest)
            .unwrap();

        assert_eq!(report.response_bytes, 0);
        // Either a clean EOF with no bytes or a reset, never a response.
        if let Ok(text) = client.join().unwrap() {
            assert!(text.is_empty());
        }
    }

    #[test]
    fn abort_handle_unblocks_accept() {
        let server = SyntheticServer::listen(1).unwrap();
        let handle = server.abort_handle();

        let serving = thread::spawn(move || server.accept_and_respond("unused", FaultMode::Respond));
        thread::sleep(Duration::from_millis(20));
        handle.abort();

        assert!(handle.is_aborted());
        assert!(matches!(serving.join().unwrap(), Err(ServerError::Aborted)));
    }

    #[test]
    fn abort_handle_unblocks_read_on_accepted_connection() {
        let server = SyntheticServer::listen(1)
            .unwrap()
            .with_read_timeout(Duration::from_secs(30));
        let handle = server.abort_handle();
        let _silent = TcpStream::connect(server.local_addr()).unwrap();
        let started = Instant::now();

        let serving = thread::spawn(move || server.accept_and_respond("unused", FaultMode::Respond));
        thread::sleep(Duration::from_millis(50));
        handle.abort();

        assert!(matches!(serving.join().unwrap(), Err(ServerError::Aborted)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn endpoint_url_brackets_ipv6_and_reports_parse_errors() {
        let v6: SocketAddr = "[::1]:8080".parse().unwrap();
        assert_eq!(endpoint_url(v6).unwrap().as_str(), "http://[::1]:8080/");

        let err = ServerError::from(Url::parse("http://[::1/").unwrap_err());
        assert!(matches!(err, ServerError::Url(_)));
    }

    #[test]
    fn tracker_released_on_every_path() {
        let tracker = ConnectionTracker::new("server");

        let server = SyntheticServer::listen(1).unwrap().tracked(&tracker);
        assert_eq!(tracker.active_count(), 1);
        server
            .accept_and_respond("unused", FaultMode::CloseWithoutAccept)
            .unwrap();
        assert_eq!(tracker.active_count(), 0);

        let server = SyntheticServer::listen(1).unwrap().tracked(&tracker);
        let handle = server.abort_handle();
        let serving = thread::spawn(move || server.accept_and_respond("unused", FaultMode::Respond));
        handle.abort();
        assert!(serving.join().unwrap().is_err());
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    fn read_timeout_bounds_silent_peer() {
        let server = SyntheticServer::listen(1)
            .unwrap()
            .with_read_timeout(Duration::from_millis(50));
        let _silent = TcpStream::connect(server.local_addr()).unwrap();

        assert!(matches!(
            server.accept_and_respond("unused", FaultMode::Respond),
            Err(ServerError::Read(_))
        ));
    }

    #[test]
    fn fault_mode_parses() {
        assert_eq!("respond".parse::<FaultMode>().unwrap(), FaultMode::Respond);
        assert_eq!("close".parse::<FaultMode>().unwrap(), FaultMode::CloseWithoutAccept);
        assert_eq!(
            "Abort-After-Request".parse::<FaultMode>().unwrap(),
            FaultMode::AbortAfterRequest
        );
        assert!("explode".parse::<FaultMode>().is_err());
    }

    #[tokio::test]
    async fn async_server_answers_one_request() {
        let server = AsyncSyntheticServer::listen(1).unwrap();
        let addr = server.local_addr();
        let body = build_response("abcdefghijklmnopqrstuvwxyz");

        let client = async {
            let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
            stream.write_all(REQUEST).await.unwrap();
            let mut response = String::new();
            stream.read_to_string(&mut response).await.unwrap();
            response
        };

        let (report, response) = tokio::join!(server.accept_and_respond(&body, FaultMode::Respond), client);
        let report = report.unwrap();

        assert_eq!(response, body);
        assert_eq!(report.request_bytes, REQUEST.len());
    }

    #[tokio::test]
    async fn held_connection_stays_tracked_until_peer_closes() {
        let tracker = ConnectionTracker::new("server");
        let server = AsyncSyntheticServer::listen(1)
            .unwrap()
            .with_read_timeout(Duration::from_secs(30))
            .tracked(&tracker)
            .hold_until_peer_close();
        let addr = server.local_addr();
        let body = build_response("held");
        let serving = tokio::spawn(async move { server.accept_and_respond(&body, FaultMode::Respond).await });

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(REQUEST).await.unwrap();
        let mut head = [0_u8; 12];
        stream.read_exact(&mut head).await.unwrap();
        assert_eq!(&head, b"HTTP/1.1 200");

        // Listener and connection both still counted while the peer holds on.
        assert!(!tracker.wait_until_idle(Duration::from_millis(100)).await);
        assert_eq!(tracker.active_count(), 2);

        drop(stream);
        assert!(tracker.wait_until_idle(Duration::from_secs(5)).await);
        assert!(serving.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn held_connection_times_out_when_peer_never_closes() {
        let server = AsyncSyntheticServer::listen(1)
            .unwrap()
            .with_read_timeout(Duration::from_millis(100))
            .hold_until_peer_close();
        let addr = server.local_addr();
        let body = build_response("held");
        let serving = tokio::spawn(async move { server.accept_and_respond(&body, FaultMode::Respond).await });

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(REQUEST).await.unwrap();

        assert!(matches!(serving.await.unwrap(), Err(ServerError::Read(_))));
        drop(stream);
    }

    #[tokio::test]
    async fn async_close_without_accept_refuses_later_connections() {
        let server = AsyncSyntheticServer::listen(1).unwrap();
        let addr = server.local_addr();
        server
            .accept_and_respond("unused", FaultMode::CloseWithoutAccept)
            .await
            .unwrap();

        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn async_read_timeout_bounds_silent_peer() {
        let server = AsyncSyntheticServer::listen(1)
            .unwrap()
            .with_read_timeout(Duration::from_millis(50));
        let _silent = tokio::net::TcpStream::connect(server.local_addr()).await.unwrap();

        assert!(matches!(
            server.accept_and_respond("unused", FaultMode::Respond).await,
            Err(ServerError::Read(_))
        ));
    }
}
