//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the harness.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the stress harness.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StressConfig {
    /// Stress gate. Scenarios only run when this is set (or forced).
    pub enabled: bool,

    /// Bounded driver settings.
    pub driver: DriverConfig,

    /// Synthetic server settings.
    pub server: ServerConfig,

    /// Client-under-test settings.
    pub client: ClientConfig,

    /// Fault-injection scenario settings.
    pub fault: FaultConfig,

    /// Leak-check scenario settings.
    pub leak: LeakConfig,

    /// Mass create/destroy scenario settings.
    pub mass: MassConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Bounded driver configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Degree of parallelism: dedicated worker threads.
    pub dop: usize,

    /// Iterations per request scenario.
    pub requests: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            dop: 32,
            requests: 5_000,
        }
    }
}

/// Synthetic server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Body served by every exchange (ASCII only).
    pub response_body: String,

    /// Maximum wait for a request head after accepting, in milliseconds.
    pub read_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            response_body: "abcdefghijklmnopqrstuvwxyz".to_string(),
            read_timeout_ms: 30_000,
        }
    }
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Client-under-test configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Fault-injection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FaultConfig {
    /// Requests left pending against the non-accepting listener.
    pub pending_requests: usize,

    /// Delay between issuing the requests and closing the listener, in milliseconds.
    pub settle_ms: u64,

    /// Every pending request must have failed within this many seconds of the close.
    pub deadline_secs: u64,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            pending_requests: 5_000,
            settle_ms: 100,
            deadline_secs: 30,
        }
    }
}

impl FaultConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

/// Leak-check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LeakConfig {
    /// Reclamation cycles attempted before giving up.
    pub max_cycles: usize,

    /// Overall time budget in seconds.
    pub budget_secs: u64,
}

impl Default for LeakConfig {
    fn default() -> Self {
        Self {
            max_cycles: 10,
            budget_secs: 10,
        }
    }
}

impl LeakConfig {
    pub fn budget(&self) -> Duration {
        Duration::from_secs(self.budget_secs)
    }
}

/// Mass create/destroy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MassConfig {
    /// Clients created and dropped in sequence.
    pub clients: usize,
}

impl Default for MassConfig {
    fn default() -> Self {
        Self { clients: 5_000 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
