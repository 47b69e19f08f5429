//! Dedicated-thread worker pool and the per-worker claim loop.
//!
//! # State Machine (per worker)
//! ```text
//! Idle → ClaimIndex ─┬─ HasIndex → RunWorkItem → ClaimIndex
//!                    ├─ Exhausted → Done
//!                    └─ FailureObserved → Done
//! ```
//!
//! # Design Decisions
//! - One OS thread per worker, never a shared pool: work items may block on
//!   synchronous sockets, and async items get a private current-thread
//!   runtime, so neither can starve the other
//! - Threads are scoped, so work closures may borrow from the caller
//! - Panics inside a work item are caught and reported as a failure

use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

use futures_util::FutureExt;

use crate::driver::counter::{ActivityGauge, FailureSignal, WorkCounter};
use crate::driver::DriverError;
use crate::observability::metrics;

/// Fixed-size set of dedicated threads.
#[derive(Debug, Clone)]
pub struct DedicatedWorkers {
    size: usize,
    name_prefix: String,
}

impl DedicatedWorkers {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            name_prefix: "stress-worker".to_string(),
        }
    }

    /// Thread name prefix; threads are named `<prefix>-<worker>`.
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `body(worker)` once on each dedicated thread and collect the results
    /// in worker order.
    ///
    /// If a thread cannot be spawned, `on_spawn_failure` is invoked so the
    /// threads already running can wind down, and the spawn error is returned
    /// after they have been joined. A thread that panics yields `None`.
    pub fn run<T, F, A>(&self, body: F, on_spawn_failure: A) -> std::io::Result<Vec<Option<T>>>
    where
        T: Send,
        F: Fn(usize) -> T + Sync,
        A: FnOnce(),
    {
        thread::scope(|scope| {
            let body = &body;
            let mut handles = Vec::with_capacity(self.size);
            let mut spawn_error = None;

            for worker in 0..self.size {
                let spawned = thread::Builder::new()
                    .name(format!("{}-{}", self.name_prefix, worker))
                    .spawn_scoped(scope, move || body(worker));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        tracing::error!(worker, error = %e, "Failed to spawn worker thread");
                        spawn_error = Some(e);
                        break;
                    }
                }
            }
            if spawn_error.is_some() {
                on_spawn_failure();
            }

            let results = handles.into_iter().map(|h| h.join().ok()).collect();
            match spawn_error {
                Some(e) => Err(e),
                None => Ok(results),
            }
        })
    }
}

/// What one worker did before reaching `Done`.
#[derive(Debug)]
pub(crate) struct WorkerOutcome<E> {
    pub completed: usize,
    /// Set only on the worker whose failure won the signal.
    pub failure: Option<DriverError<E>>,
}

impl<E> WorkerOutcome<E> {
    fn new() -> Self {
        Self {
            completed: 0,
            failure: None,
        }
    }
}

/// State shared by every worker of one driver run.
#[derive(Debug)]
pub(crate) struct ClaimState {
    pub counter: WorkCounter,
    pub signal: FailureSignal,
    pub gauge: ActivityGauge,
}

impl ClaimState {
    pub fn new(total: usize) -> Self {
        Self {
            counter: WorkCounter::new(total),
            signal: FailureSignal::new(),
            gauge: ActivityGauge::default(),
        }
    }

    /// `ClaimIndex`: `Some` is `HasIndex`, `None` is `Exhausted` or `FailureObserved`.
    fn claim(&self, worker: usize) -> Option<usize> {
        if self.signal.is_tripped() {
            tracing::trace!(worker, "Failure observed, worker done");
            return None;
        }
        let index = self.counter.claim();
        if index.is_none() {
            tracing::trace!(worker, "Work exhausted, worker done");
        }
        index
    }

    /// Record a failure. Returns it back only if it is the first one.
    pub fn fail<E>(&self, error: DriverError<E>) -> Option<DriverError<E>> {
        let first = self.signal.trip();
        self.counter.exhaust();
        metrics::record_work_failure();
        if first {
            tracing::debug!(index = ?error.index(), "First failure, aborting unclaimed work");
            Some(error)
        } else {
            None
        }
    }

    /// Stop handing out work without recording a work-item failure.
    pub fn halt(&self) {
        self.signal.trip();
        self.counter.exhaust();
    }

    fn finish<E>(
        &self,
        outcome: &mut WorkerOutcome<E>,
        index: usize,
        result: std::thread::Result<Result<(), E>>,
    ) -> bool {
        match result {
            Ok(Ok(())) => {
                outcome.completed += 1;
                metrics::record_work_item();
                true
            }
            Ok(Err(source)) => {
                outcome.failure = self.fail(DriverError::WorkItem { index, source });
                false
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                outcome.failure = self.fail(DriverError::Panicked { index, message });
                false
            }
        }
    }

    /// Claim loop for blocking work items.
    pub fn run_blocking<E, F>(&self, worker: usize, work: &F) -> WorkerOutcome<E>
    where
        F: Fn(usize) -> Result<(), E>,
    {
        let mut outcome = WorkerOutcome::new();
        while let Some(index) = self.claim(worker) {
            let result = {
                let _active = self.gauge.enter();
                catch_unwind(AssertUnwindSafe(|| work(index)))
            };
            if !self.finish(&mut outcome, index, result) {
                break;
            }
        }
        outcome
    }

    /// Claim loop for async work items, driven by the worker's own runtime.
    pub async fn run_async<E, F, Fut>(&self, worker: usize, work: &F) -> WorkerOutcome<E>
    where
        F: Fn(usize) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let mut outcome = WorkerOutcome::new();
        while let Some(index) = self.claim(worker) {
            let result = {
                let _active = self.gauge.enter();
                AssertUnwindSafe(async { work(index).await })
                    .catch_unwind()
                    .await
            };
            if !self.finish(&mut outcome, index, result) {
                break;
            }
        }
        outcome
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_body_once_per_worker() {
        let calls = AtomicUsize::new(0);
        let results = DedicatedWorkers::new(4)
            .run(
                |worker| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    worker * 10
                },
                || {},
            )
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(results, vec![Some(0), Some(10), Some(20), Some(30)]);
    }

    #[test]
    fn threads_are_named_and_distinct() {
        let results = DedicatedWorkers::new(3)
            .with_name_prefix("sampler")
            .run(
                |_| {
                    let current = thread::current();
                    (current.id(), current.name().map(str::to_string))
                },
                || {},
            )
            .unwrap();

        let results: Vec<_> = results.into_iter().flatten().collect();
        let ids: HashSet<_> = results.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids.len(), 3);
        assert!(!ids.contains(&thread::current().id()));
        assert_eq!(results[1].1.as_deref(), Some("sampler-1"));
    }

    #[test]
    fn panicking_body_reports_none() {
        let results = DedicatedWorkers::new(2)
            .run(
                |worker| {
                    if worker == 1 {
                        panic!("worker blew up");
                    }
                    worker
                },
                || {},
            )
            .unwrap();
        assert_eq!(results, vec![Some(0), None]);
    }

    #[test]
    fn panic_message_extracts_text() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(payload.as_ref()), "owned message");
        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
