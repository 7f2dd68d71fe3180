//! Run state and failure tracking for one periodic job.
//!
//! ```text
//! IDLE --[try_start]--> RUNNING --[succeed]--> IDLE (failures = 0)
//!                          |
//!                          +------[fail]-----> IDLE (failures += 1)
//!
//! try_start while RUNNING -> false (trigger dropped)
//! failures >= threshold   -> unhealthy, hard reset due
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::HealthSnapshot;

/// Consecutive failures at which a job is unhealthy and a hard reset is due.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

#[derive(Debug, Default)]
struct HealthInner {
    is_running: bool,
    last_run_time: Option<DateTime<Utc>>,
    consecutive_failures: u32,
    next_poll_delay: Option<Duration>,
    hard_resets: u32,
}

/// What a failed cycle left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    pub consecutive_failures: u32,
    pub hard_reset_due: bool,
}

/// Thread-safe health monitor. Clones share state.
#[derive(Clone)]
pub struct HealthMonitor {
    name: String,
    failure_threshold: u32,
    inner: Arc<Mutex<HealthInner>>,
}

impl HealthMonitor {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_threshold(name, DEFAULT_FAILURE_THRESHOLD)
    }

    pub fn with_threshold(name: impl Into<String>, failure_threshold: u32) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            inner: Arc::new(Mutex::new(HealthInner::default())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquires the inner mutex lock, recovering from poison if necessary.
    fn lock_inner(&self) -> std::sync::MutexGuard<'_, HealthInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!(job = %self.name, "Recovered from poisoned mutex");
            poisoned.into_inner()
        })
    }

    /// Idle → Running. Returns `false` if a cycle is already in flight.
    pub fn try_start(&self) -> bool {
        let mut inner = self.lock_inner();
        if inner.is_running {
            return false;
        }
        inner.is_running = true;
        true
    }

    /// Running → Idle after a successful cycle.
    pub fn succeed(&self, now: DateTime<Utc>) {
        let mut inner = self.lock_inner();
        if inner.consecutive_failures > 0 {
            tracing::info!(
                job = %self.name,
                previous_failures = inner.consecutive_failures,
                "Job recovered"
            );
        }
        inner.is_running = false;
        inner.consecutive_failures = 0;
        inner.last_run_time = Some(now);
    }

    /// Running → Idle after a failed cycle.
    pub fn fail(&self) -> FailureOutcome {
        let mut inner = self.lock_inner();
        inner.is_running = false;
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        let hard_reset_due = inner.consecutive_failures >= self.failure_threshold;
        if hard_reset_due {
            tracing::warn!(
                job = %self.name,
                failures = inner.consecutive_failures,
                "Job is unhealthy after {} consecutive failures",
                inner.consecutive_failures
            );
        }

        FailureOutcome {
            consecutive_failures: inner.consecutive_failures,
            hard_reset_due,
        }
    }

    pub fn reset_failures(&self) {
        let mut inner = self.lock_inner();
        tracing::info!(job = %self.name, "Failure counter reset");
        inner.consecutive_failures = 0;
    }

    pub fn record_hard_reset(&self) -> u32 {
        let mut inner = self.lock_inner();
        inner.hard_resets = inner.hard_resets.saturating_add(1);
        inner.hard_resets
    }

    pub fn set_next_poll_delay(&self, delay: Duration) {
        self.lock_inner().next_poll_delay = Some(delay);
    }

    pub fn is_healthy(&self) -> bool {
        self.lock_inner().consecutive_failures < self.failure_threshold
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let inner = self.lock_inner();
        HealthSnapshot {
            job: self.name.clone(),
            is_running: inner.is_running,
            last_run_time: inner.last_run_time,
            consecutive_failures: inner.consecutive_failures,
            is_healthy: inner.consecutive_failures < self.failure_threshold,
            next_poll_delay: inner.next_poll_delay,
            hard_resets: inner.hard_resets,
        }
    }
}
