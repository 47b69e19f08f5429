//! Single shared client, many iterations.
//!
//! One client instance serves every iteration of the run, so anything it
//! shares between calls (resolver, connector, internal runtime) sees the
//! full concurrency of the driver.

use std::thread;
use std::time::Duration;

use crate::client::{
    BlockingHttpClient, BlockingStressClient, CompletionMode, HttpClient, StressClient,
};
use crate::config::StressConfig;
use crate::driver::{run_bounded, run_bounded_async};
use crate::http::{build_response, AsyncSyntheticServer, FaultMode, SyntheticServer};
use crate::scenarios::{check_response, IterationError, Scenario, ScenarioError, ScenarioReport};

/// One blocking exchange: server on a helper thread, client on this one.
pub(crate) fn blocking_iteration<C: BlockingHttpClient>(
    client: &C,
    response: &str,
    expected_body: &str,
    read_timeout: Duration,
) -> Result<(), IterationError> {
    let server = SyntheticServer::listen(1)?.with_read_timeout(read_timeout);
    let url = server.url();
    let abort = server.abort_handle();

    thread::scope(|scope| {
        let serving = thread::Builder::new()
            .name("synthetic-server".into())
            .spawn_scoped(scope, move || {
                server.accept_and_respond(response, FaultMode::Respond)
            })
            .map_err(IterationError::Spawn)?;

        let fetched = client.get(&url, CompletionMode::ReadFullBody);
        if fetched.is_err() {
            // The server may still be parked in accept.
            abort.abort();
        }
        let served = serving.join().map_err(|_| IterationError::ServerPanicked)?;

        let fetched = fetched?;
        served?;
        check_response(&fetched, expected_body)
    })
}

/// One suspending exchange: server and client joined in the same task.
///
/// A failure on either side drops the other future, which releases its
/// socket.
pub(crate) async fn async_iteration<C: HttpClient>(
    client: &C,
    response: &str,
    expected_body: &str,
    read_timeout: Duration,
) -> Result<(), IterationError> {
    let server = AsyncSyntheticServer::listen(1)?.with_read_timeout(read_timeout);
    let url = server.url();

    let (_, fetched) = tokio::try_join!(
        async {
            server
                .accept_and_respond(response, FaultMode::Respond)
                .await
                .map_err(IterationError::from)
        },
        async {
            client
                .get(&url, CompletionMode::ReadFullBody)
                .await
                .map_err(IterationError::from)
        },
    )?;
    check_response(&fetched, expected_body)
}

/// Blocking client shared across `driver.requests` iterations at `driver.dop`.
pub fn run_sync_single(config: &StressConfig) -> Result<ScenarioReport, ScenarioError> {
    let client = BlockingStressClient::new(&config.client).map_err(ScenarioError::Client)?;
    let body = config.server.response_body.as_str();
    let response = build_response(body);
    let read_timeout = config.server.read_timeout();

    let report = run_bounded(config.driver.requests, config.driver.dop, |_| {
        blocking_iteration(&client, &response, body, read_timeout)
    })
    .map_err(|source| ScenarioError::Driver {
        scenario: Scenario::SyncSingle,
        source,
    })?;

    Ok(ScenarioReport::from_driver(
        Scenario::SyncSingle,
        config.driver.dop,
        &report,
    ))
}

/// Async client shared across `driver.requests` iterations at `driver.dop`.
///
/// Each worker drives its iterations on its own runtime; call this from
/// blocking code.
pub fn run_async_single(config: &StressConfig) -> Result<ScenarioReport, ScenarioError> {
    let client = StressClient::new(&config.client).map_err(ScenarioError::Client)?;
    let body = config.server.response_body.as_str();
    let response = build_response(body);
    let read_timeout = config.server.read_timeout();

    let client = &client;
    let response = response.as_str();
    let report = run_bounded_async(config.driver.requests, config.driver.dop, move |_| {
        async_iteration(client, response, body, read_timeout)
    })
    .map_err(|source| ScenarioError::Driver {
        scenario: Scenario::AsyncSingle,
        source,
    })?;

    Ok(ScenarioReport::from_driver(
        Scenario::AsyncSingle,
        config.driver.dop,
        &report,
    ))
}
