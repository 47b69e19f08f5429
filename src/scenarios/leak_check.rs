//! Response reclamation check.
//!
//! A headers-only response still owns its connection and unread body. Once
//! the caller drops its last strong reference, nothing inside the client may
//! keep it alive: the weak handle must go dead, the client's live-response
//! count must return to zero, and the server must see the client close the
//! connection it was holding open.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::client::{ClientResponse, CompletionMode, HttpClient, StressClient};
use crate::config::StressConfig;
use crate::http::{build_response, AsyncSyntheticServer, ExchangeReport, FaultMode, ServerError};
use crate::net::ConnectionTracker;
use crate::scenarios::{duration_ms, IterationError, Scenario, ScenarioError, ScenarioReport};

type Serving = JoinHandle<Result<ExchangeReport, ServerError>>;

/// Watches one shared object and every tracker that must drain with it.
#[derive(Debug)]
pub struct ReclaimWatch<T> {
    target: Weak<T>,
    trackers: Vec<ConnectionTracker>,
}

impl<T> ReclaimWatch<T> {
    pub fn new(target: &Arc<T>) -> Self {
        Self {
            target: Arc::downgrade(target),
            trackers: Vec::new(),
        }
    }

    /// Also require `tracker` to be idle before counting as reclaimed.
    pub fn watching(mut self, tracker: &ConnectionTracker) -> Self {
        self.trackers.push(tracker.clone());
        self
    }

    /// No strong reference remains and every watched tracker is idle.
    pub fn is_reclaimed(&self) -> bool {
        self.target.strong_count() == 0 && self.live_count() == 0
    }

    /// Sum of live resources across watched trackers.
    pub fn live_count(&self) -> u64 {
        self.trackers.iter().map(ConnectionTracker::active_count).sum()
    }

    /// Give pending drops up to `max_cycles` chances to run within `budget`.
    ///
    /// Returns the number of cycles used.
    pub async fn wait_reclaimed(
        &self,
        max_cycles: usize,
        budget: Duration,
    ) -> Result<usize, ScenarioError> {
        let started = Instant::now();
        let pause = budget / u32::try_from(max_cycles.max(1)).unwrap_or(u32::MAX);
        let mut cycles = 0;
        while !self.is_reclaimed() {
            if cycles >= max_cycles || started.elapsed() >= budget {
                return Err(ScenarioError::NotReclaimed {
                    cycles,
                    live: self.live_count(),
                });
            }
            cycles += 1;
            tokio::task::yield_now().await;
            tokio::time::sleep(pause).await;
        }
        Ok(cycles)
    }
}

/// Serve one response from a server that holds its connection until the
/// client closes it, and fetch it headers-only.
async fn headers_only_exchange(
    client: &StressClient,
    config: &StressConfig,
    connections: &ConnectionTracker,
) -> Result<(ClientResponse, Serving), ScenarioError> {
    let server = AsyncSyntheticServer::listen(1)
        .map_err(ScenarioError::Server)?
        .with_read_timeout(config.server.read_timeout())
        .tracked(connections)
        .hold_until_peer_close();
    let url = server.url();
    let response = build_response(&config.server.response_body);
    let serving = tokio::spawn(async move {
        server.accept_and_respond(&response, FaultMode::Respond).await
    });

    match client.get(&url, CompletionMode::ReadHeadersOnly).await {
        Ok(fetched) => Ok((fetched, serving)),
        Err(e) => {
            serving.abort();
            Err(ScenarioError::Exchange(IterationError::from(e)))
        }
    }
}

async fn finish_serving(serving: Serving) -> Result<ExchangeReport, ScenarioError> {
    match serving.await {
        Ok(result) => result.map_err(|e| ScenarioError::Exchange(IterationError::from(e))),
        Err(source) => Err(ScenarioError::RequestTask { index: 0, source }),
    }
}

/// Issue one headers-only request, drop the response, and require it to be
/// reclaimed within `leak.max_cycles` cycles and `leak.budget_secs`.
pub async fn run_leak_check(config: &StressConfig) -> Result<ScenarioReport, ScenarioError> {
    let started = Instant::now();
    let client = StressClient::new(&config.client).map_err(ScenarioError::Client)?;
    let connections = ConnectionTracker::new("server");
    let (fetched, serving) = headers_only_exchange(&client, config, &connections).await?;

    let fetched = Arc::new(fetched);
    let watch = ReclaimWatch::new(&fetched)
        .watching(client.live_responses())
        .watching(&connections);
    drop(fetched);

    let cycles = match watch
        .wait_reclaimed(config.leak.max_cycles, config.leak.budget())
        .await
    {
        Ok(cycles) => cycles,
        Err(e) => {
            serving.abort();
            return Err(e);
        }
    };
    let exchange = finish_serving(serving).await?;

    tracing::debug!(
        cycles,
        response_bytes = exchange.response_bytes,
        "Headers-only response reclaimed"
    );
    Ok(ScenarioReport {
        scenario: Scenario::LeakCheck,
        iterations: cycles,
        dop: 1,
        peak_active: 1,
        expected_failures: 0,
        elapsed_ms: duration_ms(started.elapsed()),
    })
}
