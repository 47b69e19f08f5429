//! Live-resource tracking.
//!
//! # Responsibilities
//! - Tag each tracked resource with a unique ID for tracing
//! - Count live server connections and live client responses
//! - Let callers wait until everything they handed out has been released
//!
//! A tracker is cheap to clone; every clone shares one counter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of resource IDs; only uniqueness matters, so relaxed is enough.
static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// How often [`ConnectionTracker::wait_until_idle`] re-checks the count.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Process-unique ID attached to every tracked resource in trace events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    fn next() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Counts resources that are still alive.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    /// Label used in trace events ("server", "response", ...).
    label: &'static str,
    /// Current count of live resources.
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    /// Create a new tracker.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            active_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record a new live resource. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        let guard = ConnectionGuard {
            label: self.label,
            active_count: Arc::clone(&self.active_count),
            id: ResourceId::next(),
        };
        tracing::trace!(kind = self.label, resource_id = %guard.id, "Resource opened");
        guard
    }

    /// Get current live count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until the live count reaches zero or `budget` elapses.
    ///
    /// Returns `true` if the tracker went idle in time.
    pub async fn wait_until_idle(&self, budget: Duration) -> bool {
        let deadline = Instant::now() + budget;
        while self.active_count() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
        }
        true
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new("connection")
    }
}

/// Guard that tracks a resource's lifetime.
/// Decrements the live count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    label: &'static str,
    active_count: Arc<AtomicU64>,
    id: ResourceId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ResourceId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(kind = self.label, resource_id = %self.id, "Resource released");
    }
}
