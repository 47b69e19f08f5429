//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! driver / http / client / scenarios produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Metric updates are no-ops until a recorder is installed, so library
//!   code and tests record unconditionally
//! - Log filter honours `RUST_LOG` first, then the configured level

pub mod logging;
pub mod metrics;
