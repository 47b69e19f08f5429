//! Scenario orchestrators.
//!
//! # Data Flow
//! ```text
//! Scenario (CLI or test)
//!     → single_client.rs / multi_client.rs (driver × (server ⇄ client) per iteration)
//!     → mass_create.rs (sequential client construction, no networking)
//!     → fault_injection.rs (one non-accepting listener, N pending requests)
//!     → leak_check.rs (headers-only request, weak handle, bounded reclaim)
//!     → ScenarioReport or the first ScenarioError
//! ```
//!
//! # Design Decisions
//! - An iteration owns its server, connection and call state; nothing but
//!   the driver's counter and signal is shared
//! - Iteration failures carry their index through `DriverError`
//! - Async scenarios that fan out inside one task take the caller's runtime;
//!   driver-based ones never do

pub mod fault_injection;
pub mod leak_check;
pub mod mass_create;
pub mod multi_client;
pub mod single_client;

use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::client::{ClientError, ClientResponse};
use crate::config::StressConfig;
use crate::driver::{DriverError, DriverReport};
use crate::http::ServerError;

pub use fault_injection::run_fault_injection;
pub use leak_check::{run_leak_check, ReclaimWatch};
pub use mass_create::run_mass_create;
pub use multi_client::run_multi_client;
pub use single_client::{run_async_single, run_sync_single};

/// The scenarios this harness knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    SyncSingle,
    AsyncSingle,
    MultiClient,
    MassCreate,
    FaultInjection,
    LeakCheck,
}

impl Scenario {
    pub const ALL: [Scenario; 6] = [
        Scenario::SyncSingle,
        Scenario::AsyncSingle,
        Scenario::MultiClient,
        Scenario::MassCreate,
        Scenario::FaultInjection,
        Scenario::LeakCheck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SyncSingle => "sync-single",
            Self::AsyncSingle => "async-single",
            Self::MultiClient => "multi-client",
            Self::MassCreate => "mass-create",
            Self::FaultInjection => "fault-injection",
            Self::LeakCheck => "leak-check",
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.to_lowercase();
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.as_str() == name)
            .ok_or_else(|| format!("Unknown scenario: {}", s))
    }
}

/// Outcome of a scenario that passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    /// Iterations, clients, requests or reclaim cycles, depending on the scenario.
    pub iterations: usize,
    /// Concurrency the scenario was configured with.
    pub dop: usize,
    /// Highest concurrency actually observed.
    pub peak_active: usize,
    /// Requests that failed the way the scenario required.
    pub expected_failures: usize,
    pub elapsed_ms: u64,
}

impl ScenarioReport {
    pub(crate) fn from_driver(scenario: Scenario, dop: usize, report: &DriverReport) -> Self {
        Self {
            scenario,
            iterations: report.completed,
            dop,
            peak_active: report.peak_active,
            expected_failures: 0,
            elapsed_ms: duration_ms(report.elapsed),
        }
    }
}

impl std::fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} iterations, dop {}, peak {}, {} expected failures, {} ms",
            self.scenario,
            self.iterations,
            self.dop,
            self.peak_active,
            self.expected_failures,
            self.elapsed_ms
        )
    }
}

pub(crate) fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Why a single server/client iteration failed.
#[derive(Debug, Error)]
pub enum IterationError {
    #[error("server side failed: {0}")]
    Server(#[from] ServerError),

    #[error("client side failed: {0}")]
    Client(#[from] ClientError),

    #[error("unexpected response: status {status}, body {body:?}")]
    UnexpectedResponse { status: u16, body: Option<String> },

    #[error("failed to spawn server thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("server thread panicked")]
    ServerPanicked,
}

/// Why a scenario failed.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("{scenario} failed: {source}")]
    Driver {
        scenario: Scenario,
        #[source]
        source: DriverError<IterationError>,
    },

    #[error("failed to build client: {0}")]
    Client(#[source] ClientError),

    #[error("failed to start synthetic server: {0}")]
    Server(#[source] ServerError),

    #[error("exchange failed: {0}")]
    Exchange(#[source] IterationError),

    #[error("request {index} succeeded after the listener closed")]
    UnexpectedSuccess { index: usize },

    #[error("request {index} failed with a non-connection error: {source}")]
    UnexpectedError {
        index: usize,
        #[source]
        source: ClientError,
    },

    #[error("request task {index} did not complete: {source}")]
    RequestTask {
        index: usize,
        #[source]
        source: tokio::task::JoinError,
    },

    #[error("{pending} requests still pending after {deadline:?}")]
    Hung { pending: usize, deadline: Duration },

    #[error("response not reclaimed after {cycles} cycles ({live} tracked resources still live)")]
    NotReclaimed { cycles: usize, live: u64 },
}

impl ScenarioError {
    /// Iteration or request index of the first offending item, if known.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Driver { source, .. } => source.index(),
            Self::UnexpectedSuccess { index }
            | Self::UnexpectedError { index, .. }
            | Self::RequestTask { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Every iteration must see a 200 carrying exactly the configured body.
pub(crate) fn check_response(
    response: &ClientResponse,
    expected_body: &str,
) -> Result<(), IterationError> {
    if response.status() == 200 && response.body() == Some(expected_body) {
        return Ok(());
    }
    Err(IterationError::UnexpectedResponse {
        status: response.status(),
        body: response.body().map(str::to_owned),
    })
}

/// Run one scenario. Async scenarios block on `runtime`; the others must not
/// be called from inside it.
pub fn run(
    scenario: Scenario,
    config: &StressConfig,
    runtime: &tokio::runtime::Runtime,
) -> Result<ScenarioReport, ScenarioError> {
    tracing::info!(
        scenario = %scenario,
        dop = config.driver.dop,
        requests = config.driver.requests,
        "Running scenario"
    );
    let result = match scenario {
        Scenario::SyncSingle => run_sync_single(config),
        Scenario::AsyncSingle => run_async_single(config),
        Scenario::MultiClient => run_multi_client(config),
        Scenario::MassCreate => run_mass_create(config),
        Scenario::FaultInjection => runtime.block_on(run_fault_injection(config)),
        Scenario::LeakCheck => runtime.block_on(run_leak_check(config)),
    };
    match &result {
        Ok(report) => tracing::info!(
            scenario = %scenario,
            iterations = report.iterations,
            elapsed_ms = report.elapsed_ms,
            "Scenario passed"
        ),
        Err(e) => tracing::error!(
            scenario = %scenario,
            index = ?e.index(),
            error = %e,
            "Scenario failed"
        ),
    }
    result
}
