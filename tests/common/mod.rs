//! Shared utilities for integration and stress testing.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};

use http_stress::config::{load_from_env, StressConfig};

pub const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";

/// Whether `HTTP_STRESS_ENABLED` asks for the full-size runs.
pub fn stress_enabled() -> bool {
    load_from_env().map(|config| config.enabled).unwrap_or(false)
}

/// Small, fast configuration for runs that always execute.
pub fn quick_config() -> StressConfig {
    let mut config = StressConfig::default();
    config.driver.dop = 4;
    config.driver.requests = 32;
    config.fault.pending_requests = 32;
    config.mass.clients = 100;
    config
}

/// Full-size configuration, with any environment overrides applied.
pub fn stress_config() -> StressConfig {
    load_from_env().unwrap_or_default()
}

/// Send a minimal GET and read until the server closes.
pub fn raw_get(addr: SocketAddr) -> std::io::Result<String> {
    let mut stream = TcpStream::connect(addr)?;
    stream.write_all(b"GET / HTTP/1.1\r\nHost: 127.0.0.1\r\nConnection: close\r\n\r\n")?;
    let mut response = String::new();
    stream.read_to_string(&mut response)?;
    Ok(response)
}
