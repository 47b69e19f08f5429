//! HTTP client stress harness library.

// Core subsystems
pub mod driver;
pub mod http;
pub mod net;

// Client under test and the scenarios that drive it
pub mod client;
pub mod scenarios;

// Cross-cutting concerns
pub mod config;
pub mod observability;

pub use client::{BlockingStressClient, ClientError, ClientResponse, CompletionMode, StressClient};
pub use config::schema::StressConfig;
pub use driver::{run_bounded, run_bounded_async, DriverError, DriverReport};
pub use http::{build_response, AsyncSyntheticServer, FaultMode, SyntheticServer};
pub use scenarios::{Scenario, ScenarioError, ScenarioReport};
