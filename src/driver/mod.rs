//! Bounded concurrency driver.
//!
//! # Data Flow
//! ```text
//! run_bounded(total, dop, work)
//!     → worker.rs (spawn min(dop, total) dedicated threads)
//!     → counter.rs (each thread: fetch-and-add the next index)
//!     → work(index) on that thread (blocking, or on the thread's own runtime)
//!     → first failure trips the signal and exhausts the counter
//!     → join all threads → DriverReport or the first DriverError
//! ```
//!
//! # Design Decisions
//! - Exactly-once claims come from a single atomic fetch-and-add
//! - Fail-fast stops unclaimed work only; started items run to completion
//! - Never borrows threads from an ambient runtime; a bounded run can mix
//!   blocking and async items without exhausting a pool it also depends on

pub mod bounded;
pub mod counter;
pub mod worker;

use std::time::Duration;

use thiserror::Error;

pub use bounded::{run_bounded, run_bounded_async};
pub use counter::{ActivityGauge, FailureSignal, WorkCounter};
pub use worker::DedicatedWorkers;

/// Why a bounded run stopped early.
#[derive(Debug, Error)]
pub enum DriverError<E> {
    #[error("degree of parallelism must be at least 1")]
    InvalidDop,

    #[error("work item {index} failed: {source}")]
    WorkItem {
        index: usize,
        #[source]
        source: E,
    },

    #[error("work item {index} panicked: {message}")]
    Panicked { index: usize, message: String },

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("worker {worker} could not build its runtime: {source}")]
    Runtime {
        worker: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("worker {worker} terminated abnormally")]
    WorkerLost { worker: usize },
}

impl<E> DriverError<E> {
    /// Index of the work item that failed, if the failure came from one.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::WorkItem { index, .. } | Self::Panicked { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// The work item's own error, if that is what stopped the run.
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::WorkItem { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Summary of a successful bounded run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverReport {
    pub total: usize,
    pub claimed: usize,
    pub completed: usize,
    /// Dedicated threads actually spawned.
    pub workers: usize,
    /// Highest number of work items observed running at once.
    pub peak_active: usize,
    pub elapsed: Duration,
}

impl DriverReport {
    pub(crate) fn empty(elapsed: Duration) -> Self {
        Self {
            total: 0,
            claimed: 0,
            completed: 0,
            workers: 0,
            peak_active: 0,
            elapsed,
        }
    }
}
