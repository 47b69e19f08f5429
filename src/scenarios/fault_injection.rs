//! Abrupt connection loss under load.
//!
//! # Data Flow
//! ```text
//! listen(backlog = N), never accept
//!     → spawn N requests against it (they queue in the backlog or retry SYN)
//!     → settle, then close the listener (CloseWithoutAccept)
//!     → await each request against one shared deadline
//!     → every result must be ClientError::Connection
//! ```
//!
//! # Design Decisions
//! - Each request's result is checked on its own; the lowest offending
//!   index is reported
//! - Requests still pending at the deadline are aborted and reported as hung
//! - The report's peak is the highest number of requests observed in flight
//!   at once, measured by the tasks themselves

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;

use crate::client::{ClientError, ClientResponse, CompletionMode, HttpClient, StressClient};
use crate::config::StressConfig;
use crate::driver::ActivityGauge;
use crate::http::{AsyncSyntheticServer, FaultMode};
use crate::scenarios::{duration_ms, Scenario, ScenarioError, ScenarioReport};

type PendingRequest = JoinHandle<Result<ClientResponse, ClientError>>;

fn keep_first(slot: &mut Option<ScenarioError>, error: ScenarioError) {
    if slot.is_none() {
        *slot = Some(error);
    }
}

/// Issue `fault.pending_requests` concurrent requests at a listener that
/// never accepts, close it, and require every request to fail at the
/// connection level within `fault.deadline_secs`.
pub async fn run_fault_injection(config: &StressConfig) -> Result<ScenarioReport, ScenarioError> {
    let started = Instant::now();
    let total = config.fault.pending_requests;
    let backlog = i32::try_from(total).unwrap_or(i32::MAX);

    let client = StressClient::new(&config.client).map_err(ScenarioError::Client)?;
    let server = AsyncSyntheticServer::listen(backlog).map_err(ScenarioError::Server)?;
    let url = server.url();
    let in_flight = Arc::new(ActivityGauge::default());

    let requests: Vec<PendingRequest> = (0..total)
        .map(|_| {
            let client = client.clone();
            let url = url.clone();
            let in_flight = Arc::clone(&in_flight);
            tokio::spawn(async move {
                let _active = in_flight.enter();
                client.get(&url, CompletionMode::ReadFullBody).await
            })
        })
        .collect();

    tokio::time::sleep(config.fault.settle()).await;
    server
        .accept_and_respond("", FaultMode::CloseWithoutAccept)
        .await
        .map_err(ScenarioError::Server)?;
    tracing::debug!(total, address = %url, "Listener closed with requests pending");

    let deadline = config.fault.deadline();
    let expires = tokio::time::Instant::now() + deadline;
    let mut first_error = None;
    let mut completed = 0;
    let mut failures = 0;
    let mut hung = 0;

    for (index, mut request) in requests.into_iter().enumerate() {
        let outcome = tokio::time::timeout_at(expires, &mut request).await;
        if matches!(outcome, Ok(Ok(_))) {
            completed += 1;
        }
        match outcome {
            Ok(Ok(Err(e))) if e.is_connection() => failures += 1,
            Ok(Ok(Err(source))) => {
                keep_first(&mut first_error, ScenarioError::UnexpectedError { index, source })
            }
            Ok(Ok(Ok(_response))) => {
                keep_first(&mut first_error, ScenarioError::UnexpectedSuccess { index })
            }
            Ok(Err(source)) => {
                keep_first(&mut first_error, ScenarioError::RequestTask { index, source })
            }
            Err(_) => {
                request.abort();
                hung += 1;
            }
        }
    }

    if let Some(error) = first_error {
        return Err(error);
    }
    if hung > 0 {
        return Err(ScenarioError::Hung {
            pending: hung,
            deadline,
        });
    }

    tracing::debug!(
        failures,
        peak_in_flight = in_flight.peak(),
        "Every pending request failed at the connection level"
    );
    Ok(ScenarioReport {
        scenario: Scenario::FaultInjection,
        iterations: completed,
        dop: total,
        peak_active: in_flight.peak(),
        expected_failures: failures,
        elapsed_ms: duration_ms(started.elapsed()),
    })
}
