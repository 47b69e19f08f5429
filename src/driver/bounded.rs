//! `run_bounded` entry points.

use std::future::Future;
use std::time::Instant;

use crate::driver::worker::{ClaimState, DedicatedWorkers, WorkerOutcome};
use crate::driver::{DriverError, DriverReport};
use crate::observability::metrics;

fn check_dop<E>(dop: usize) -> Result<(), DriverError<E>> {
    if dop == 0 {
        return Err(DriverError::InvalidDop);
    }
    Ok(())
}

/// Fold per-worker outcomes into the run result.
fn collect<E>(
    state: &ClaimState,
    workers: usize,
    started: Instant,
    outcomes: std::io::Result<Vec<Option<WorkerOutcome<E>>>>,
) -> Result<DriverReport, DriverError<E>> {
    let outcomes = outcomes.map_err(DriverError::Spawn)?;

    let mut completed = 0;
    let mut failure = None;
    for (worker, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Some(outcome) => {
                completed += outcome.completed;
                if outcome.failure.is_some() {
                    failure = outcome.failure;
                }
            }
            None if failure.is_none() => failure = Some(DriverError::WorkerLost { worker }),
            None => {}
        }
    }

    let report = DriverReport {
        total: state.counter.total(),
        claimed: state.counter.claimed(),
        completed,
        workers,
        peak_active: state.gauge.peak(),
        elapsed: started.elapsed(),
    };
    match failure {
        Some(error) => {
            tracing::warn!(
                claimed = report.claimed,
                completed = report.completed,
                failure = %DisplayIndex(error.index()),
                "Bounded run aborted"
            );
            Err(error)
        }
        None => {
            tracing::debug!(
                total = report.total,
                workers = report.workers,
                peak_active = report.peak_active,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Bounded run complete"
            );
            Ok(report)
        }
    }
}

struct DisplayIndex(Option<usize>);

impl std::fmt::Display for DisplayIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(index) => write!(f, "first failure at index {}", index),
            None => f.write_str("first failure outside a work item"),
        }
    }
}

/// Run `work(index)` for every index in `[0, total)` on `dop` dedicated threads.
///
/// Each index is handed to exactly one call. The first failing (or panicking)
/// call stops all further claims; calls already in flight finish, then the
/// first error is returned.
pub fn run_bounded<E, F>(total: usize, dop: usize, work: F) -> Result<DriverReport, DriverError<E>>
where
    E: Send,
    F: Fn(usize) -> Result<(), E> + Sync,
{
    check_dop(dop)?;
    let started = Instant::now();
    let state = ClaimState::new(total);
    if total == 0 {
        return Ok(DriverReport::empty(started.elapsed()));
    }

    let workers = DedicatedWorkers::new(dop.min(total));
    tracing::debug!(total, dop, workers = workers.size(), "Starting bounded run");
    metrics::workers_started(workers.size());

    let outcomes = workers.run(
        |worker| state.run_blocking(worker, &work),
        || state.halt(),
    );
    metrics::workers_finished(workers.size());
    collect(&state, workers.size(), started, outcomes)
}

/// Async counterpart of [`run_bounded`].
///
/// Every worker thread owns a current-thread tokio runtime and drives its
/// work items to completion on it, one at a time. The caller's runtime (if
/// any) is never used, so this may be called from blocking code only; from
/// async code, wrap it in `spawn_blocking`.
pub fn run_bounded_async<E, F, Fut>(
    total: usize,
    dop: usize,
    work: F,
) -> Result<DriverReport, DriverError<E>>
where
    E: Send,
    F: Fn(usize) -> Fut + Sync,
    Fut: Future<Output = Result<(), E>>,
{
    check_dop(dop)?;
    let started = Instant::now();
    let state = ClaimState::new(total);
    if total == 0 {
        return Ok(DriverReport::empty(started.elapsed()));
    }

    let workers = DedicatedWorkers::new(dop.min(total));
    tracing::debug!(total, dop, workers = workers.size(), "Starting bounded async run");
    metrics::workers_started(workers.size());

    let outcomes = workers.run(
        |worker| {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build();
            match runtime {
                Ok(runtime) => runtime.block_on(state.run_async(worker, &work)),
                Err(source) => WorkerOutcome {
                    completed: 0,
                    failure: state.fail(DriverError::Runtime { worker, source }),
                },
            }
        },
        || state.halt(),
    );
    metrics::workers_finished(workers.size());
    collect(&state, workers.size(), started, outcomes)
}
