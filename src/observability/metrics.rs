//! Metrics collection and exposition.
//!
//! # Metrics
//! - `stress_work_items_total` (counter): work items that completed successfully
//! - `stress_work_failures_total` (counter): work items that failed or panicked
//! - `stress_active_workers` (gauge): dedicated driver threads currently running
//! - `stress_server_exchanges_total` (counter): synthetic server exchanges by fault mode, outcome
//! - `stress_client_requests_total` (counter): client calls by completion mode, outcome

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::client::CompletionMode;
use crate::http::FaultMode;

fn outcome(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "error"
    }
}

/// Install the Prometheus recorder with an HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_work_item() {
    ::metrics::counter!("stress_work_items_total").increment(1);
}

pub fn record_work_failure() {
    ::metrics::counter!("stress_work_failures_total").increment(1);
}

pub fn workers_started(workers: usize) {
    ::metrics::gauge!("stress_active_workers").increment(workers as f64);
}

pub fn workers_finished(workers: usize) {
    ::metrics::gauge!("stress_active_workers").decrement(workers as f64);
}

pub fn record_exchange(fault: FaultMode, ok: bool) {
    ::metrics::counter!(
        "stress_server_exchanges_total",
        "fault" => fault.as_str(),
        "outcome" => outcome(ok)
    )
    .increment(1);
}

pub fn record_client_request(mode: CompletionMode, ok: bool) {
    ::metrics::counter!(
        "stress_client_requests_total",
        "mode" => mode.as_str(),
        "outcome" => outcome(ok)
    )
    .increment(1);
}
