//! HTTP client stress harness.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │                        http-stress                               │
//!   │                                                                  │
//!   │  config ──▶ scenarios ──▶ driver (min(dop, total) threads)       │
//!   │                │              │                                  │
//!   │                │              ▼  per iteration                   │
//!   │                │     ┌─────────────────┐      ┌───────────────┐  │
//!   │                │     │ synthetic server│◀────▶│ client (seam) │  │
//!   │                │     │ 127.0.0.1:0     │ HTTP │ reqwest       │  │
//!   │                │     └─────────────────┘      └───────────────┘  │
//!   │                ▼                                                 │
//!   │          ScenarioReport ──▶ stdout (text or JSON)                │
//!   │                                                                  │
//!   │  observability: tracing to stderr, optional Prometheus exporter  │
//!   └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Scenarios only run when `HTTP_STRESS_ENABLED` is truthy or `--force` is
//! given.

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

use http_stress::config::{load_config, load_from_env, validate_config, ConfigError};
use http_stress::observability::{logging, metrics};
use http_stress::scenarios::{self, Scenario, ScenarioReport};

/// A single scenario or all of them, in declaration order.
#[derive(Debug, Clone, Copy)]
enum Target {
    All,
    One(Scenario),
}

impl Target {
    fn scenarios(self) -> Vec<Scenario> {
        match self {
            Target::All => Scenario::ALL.to_vec(),
            Target::One(scenario) => vec![scenario],
        }
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(Target::All);
        }
        s.parse().map(Target::One)
    }
}

#[derive(Parser)]
#[command(name = "http-stress")]
#[command(about = "Stress and fault-injection harness for an HTTP client", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults plus environment when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override driver.dop
    #[arg(long)]
    dop: Option<usize>,

    /// Override driver.requests
    #[arg(long)]
    requests: Option<usize>,

    /// Print reports as JSON lines
    #[arg(long)]
    json: bool,

    /// Run even when HTTP_STRESS_ENABLED is not set
    #[arg(long)]
    force: bool,

    /// sync-single, async-single, multi-client, mass-create, fault-injection, leak-check or all
    scenario: Target,
}

fn print_report(report: &ScenarioReport, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string(report)?);
    } else {
        println!("{}", report);
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };
    if let Some(dop) = cli.dop {
        config.driver.dop = dop;
    }
    if let Some(requests) = cli.requests {
        config.driver.requests = requests;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability)?;
    let run_id = uuid::Uuid::new_v4();
    let _span = tracing::info_span!("run", run_id = %run_id).entered();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        dop = config.driver.dop,
        requests = config.driver.requests,
        "http-stress starting"
    );

    // Sync scenarios block this thread; async ones borrow the runtime.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            let _entered = runtime.enter();
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    if !config.enabled && !cli.force {
        tracing::warn!("Stress mode disabled; set HTTP_STRESS_ENABLED=1 or pass --force");
        return Ok(());
    }

    for scenario in cli.scenario.scenarios() {
        let report = scenarios::run(scenario, &config, &runtime)?;
        print_report(&report, cli.json)?;
    }

    tracing::info!("All scenarios passed");
    Ok(())
}
