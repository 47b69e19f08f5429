//! Shared claim state for the bounded driver.
//!
//! The counter and the failure signal are the only state shared between
//! workers. Both are plain atomics.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Hands out each index in `[0, total)` exactly once.
#[derive(Debug)]
pub struct WorkCounter {
    next: AtomicUsize,
    handed_out: AtomicUsize,
    total: usize,
}

impl WorkCounter {
    pub fn new(total: usize) -> Self {
        Self {
            next: AtomicUsize::new(0),
            handed_out: AtomicUsize::new(0),
            total,
        }
    }

    /// Claim the next unclaimed index, or `None` once the range is used up.
    ///
    /// Every worker stops on its first `None`, so the counter overshoots
    /// `total` by at most one per worker.
    pub fn claim(&self) -> Option<usize> {
        let index = self.next.fetch_add(1, Ordering::AcqRel);
        if index >= self.total {
            return None;
        }
        self.handed_out.fetch_add(1, Ordering::AcqRel);
        Some(index)
    }

    /// Force the counter to its terminal value so no further index is handed out.
    pub fn exhaust(&self) {
        self.next.fetch_max(self.total, Ordering::AcqRel);
    }

    /// Number of indices handed out so far. Unaffected by [`exhaust`](Self::exhaust).
    pub fn claimed(&self) -> usize {
        self.handed_out.load(Ordering::Acquire)
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

/// First-failure-wins flag.
#[derive(Debug, Default)]
pub struct FailureSignal {
    tripped: AtomicBool,
}

impl FailureSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signal. Returns `true` only for the caller that set it first.
    pub fn trip(&self) -> bool {
        self.tripped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }
}

/// Tracks how many work items are running right now and the highest value seen.
#[derive(Debug, Default)]
pub struct ActivityGauge {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ActivityGauge {
    /// Mark one work item as running until the returned guard drops.
    pub fn enter(&self) -> ActivityGuard<'_> {
        let now = self.active.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        ActivityGuard { gauge: self }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct ActivityGuard<'a> {
    gauge: &'a ActivityGauge,
}

impl Drop for ActivityGuard<'_> {
    fn drop(&mut self) {
        self.gauge.active.fetch_sub(1, Ordering::AcqRel);
    }
}
