//! Client construction churn.

use std::time::Instant;

use crate::client::StressClient;
use crate::config::StressConfig;
use crate::scenarios::{duration_ms, Scenario, ScenarioError, ScenarioReport};

/// Build and immediately drop `mass.clients` clients, one after another.
///
/// No request is sent; this exercises construction and teardown only.
pub fn run_mass_create(config: &StressConfig) -> Result<ScenarioReport, ScenarioError> {
    let started = Instant::now();
    for index in 0..config.mass.clients {
        let client = StressClient::new(&config.client).map_err(ScenarioError::Client)?;
        drop(client);
        if (index + 1) % 1000 == 0 {
            tracing::debug!(created = index + 1, "Mass create progress");
        }
    }

    Ok(ScenarioReport {
        scenario: Scenario::MassCreate,
        iterations: config.mass.clients,
        dop: 1,
        peak_active: usize::from(config.mass.clients > 0),
        expected_failures: 0,
        elapsed_ms: duration_ms(started.elapsed()),
    })
}
