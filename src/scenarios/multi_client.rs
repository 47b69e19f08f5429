//! One client per iteration.

use crate::client::StressClient;
use crate::config::StressConfig;
use crate::driver::run_bounded_async;
use crate::http::build_response;
use crate::scenarios::single_client::async_iteration;
use crate::scenarios::{IterationError, Scenario, ScenarioError, ScenarioReport};

/// Like [`run_async_single`](crate::scenarios::run_async_single), but every
/// iteration builds its own client and drops it once the exchange is checked.
pub fn run_multi_client(config: &StressConfig) -> Result<ScenarioReport, ScenarioError> {
    let body = config.server.response_body.as_str();
    let response = build_response(body);
    let read_timeout = config.server.read_timeout();

    let client_config = &config.client;
    let response = response.as_str();
    let report = run_bounded_async(config.driver.requests, config.driver.dop, move |_| async move {
        let client = StressClient::new(client_config).map_err(IterationError::Client)?;
        async_iteration(&client, response, body, read_timeout).await
    })
    .map_err(|source| ScenarioError::Driver {
        scenario: Scenario::MultiClient,
        source,
    })?;

    Ok(ScenarioReport::from_driver(
        Scenario::MultiClient,
        config.driver.dop,
        &report,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_iteration_gets_a_fresh_client() {
        let mut config = StressConfig::default();
        config.driver.dop = 3;
        config.driver.requests = 12;

        let report = run_multi_client(&config).unwrap();
        assert_eq!(report.scenario, Scenario::MultiClient);
        assert_eq!(report.iterations, 12);
        assert_eq!(report.dop, 3);
    }
}
