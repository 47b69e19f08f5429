//! Serve exactly one synthetic HTTP exchange on an ephemeral loopback port.
//!
//! Prints the target URL on stdout as soon as the listener is bound, so a
//! script or another client can pick it up and connect.

use std::io::Write;
use std::time::Duration;

use clap::Parser;

use http_stress::config::ObservabilityConfig;
use http_stress::http::{build_response, declared_content_length, FaultMode, SyntheticServer};
use http_stress::observability::logging;

#[derive(Parser)]
#[command(name = "synthetic-server")]
#[command(about = "Single-exchange HTTP responder for client testing", long_about = None)]
struct Cli {
    /// Response body (ASCII)
    #[arg(short, long, default_value = "abcdefghijklmnopqrstuvwxyz")]
    body: String,

    /// respond, abort-after-request or close-without-accept
    #[arg(short, long, default_value = "respond")]
    fault: FaultMode,

    /// Listen backlog
    #[arg(long, default_value_t = 1)]
    backlog: i32,

    /// Seconds to wait for the request head once connected
    #[arg(long, default_value_t = 30)]
    read_timeout_secs: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    if !cli.body.is_ascii() {
        return Err("body must be ASCII".into());
    }
    logging::init_logging(&ObservabilityConfig::default())?;

    let server = SyntheticServer::listen(cli.backlog)?
        .with_read_timeout(Duration::from_secs(cli.read_timeout_secs));
    println!("{}", server.url());
    std::io::stdout().flush()?;

    let response = build_response(&cli.body);
    let report = server.accept_and_respond(&response, cli.fault)?;
    tracing::info!(
        fault = %cli.fault,
        content_length = ?declared_content_length(&response),
        peer = ?report.peer,
        request_bytes = report.request_bytes,
        response_bytes = report.response_bytes,
        "Exchange complete"
    );
    Ok(())
}
