//! End-to-end scenario runs.
//!
//! Small sizes always run. Full-size runs (5000 iterations, 5000 pending
//! fault requests) only run with `HTTP_STRESS_ENABLED` set.

use http_stress::scenarios::{
    run_async_single, run_fault_injection, run_leak_check, run_mass_create, run_multi_client,
    run_sync_single, Scenario,
};

mod common;

#[test]
fn sync_single_client_small() {
    let config = common::quick_config();
    let report = run_sync_single(&config).unwrap();
    assert_eq!(report.scenario, Scenario::SyncSingle);
    assert_eq!(report.iterations, config.driver.requests);
    assert!(report.peak_active <= config.driver.dop);
}

#[test]
fn async_single_client_small() {
    let config = common::quick_config();
    let report = run_async_single(&config).unwrap();
    assert_eq!(report.iterations, config.driver.requests);
    assert!(report.peak_active <= config.driver.dop);
}

#[test]
fn multi_client_small() {
    let config = common::quick_config();
    let report = run_multi_client(&config).unwrap();
    assert_eq!(report.iterations, config.driver.requests);
}

#[test]
fn mass_create_small() {
    let config = common::quick_config();
    let report = run_mass_create(&config).unwrap();
    assert_eq!(report.iterations, config.mass.clients);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fault_injection_small() {
    let config = common::quick_config();
    let report = run_fault_injection(&config).await.unwrap();
    assert_eq!(report.expected_failures, config.fault.pending_requests);
}

#[tokio::test]
async fn leak_check_reclaims_headers_only_response() {
    let config = common::quick_config();
    let report = run_leak_check(&config).await.unwrap();
    assert!(report.iterations <= config.leak.max_cycles);
}

#[test]
fn sync_single_client_stress() {
    if !common::stress_enabled() {
        return;
    }
    let config = common::stress_config();
    let report = run_sync_single(&config).unwrap();
    assert_eq!(report.iterations, config.driver.requests);
}

#[test]
fn async_single_client_stress() {
    if !common::stress_enabled() {
        return;
    }
    let config = common::stress_config();
    let report = run_async_single(&config).unwrap();
    assert_eq!(report.iterations, config.driver.requests);
}

#[test]
fn multi_client_stress() {
    if !common::stress_enabled() {
        return;
    }
    let config = common::stress_config();
    let report = run_multi_client(&config).unwrap();
    assert_eq!(report.iterations, config.driver.requests);
}

#[test]
fn mass_create_stress() {
    if !common::stress_enabled() {
        return;
    }
    let config = common::stress_config();
    assert_eq!(run_mass_create(&config).unwrap().iterations, config.mass.clients);
}

#[tokio::test(flavor = "multi_thread")]
async fn fault_injection_stress() {
    if !common::stress_enabled() {
        return;
    }
    let config = common::stress_config();
    let report = run_fault_injection(&config).await.unwrap();
    assert_eq!(report.expected_failures, config.fault.pending_requests);
}
