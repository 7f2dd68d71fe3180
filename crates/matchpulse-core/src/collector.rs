//! Periodic collection jobs.
//!
//! A [`JobRunner`] owns one collector plus its schedule, retry policy, and
//! health monitor. The scheduling loop is explicit: run a guarded cycle,
//! compute the next delay from the last successful record set, sleep until
//! then or until cancelled.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{Local, TimeZone, Utc};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::CollectorConfig;
use crate::error::AppError;
use crate::extract::{
    MatchExtractor, MatchVariant, RankingExtractor, validate_poll_window, within_horizon,
};
use crate::health::{FailureOutcome, HealthMonitor};
use crate::models::{CollectionResult, MatchEvent, RankedTeam, TimedRecord};
use crate::retry::{RetryOutcome, RetryPolicy, attempt_with_retry};
use crate::schedule::SchedulePolicy;
use crate::traits::{IngestionSink, SnapshotParser, SourceConnector};

/// The two independent job types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Matches,
    Rankings,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Matches => "matches",
            JobKind::Rankings => "rankings",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "matches" => Ok(JobKind::Matches),
            "rankings" | "teams" => Ok(JobKind::Rankings),
            _ => Err(format!("Unknown job: {s}")),
        }
    }
}

/// Events emitted by a job runner for monitoring/logging.
#[derive(Debug, Clone)]
pub enum CollectorEvent<'a> {
    Started {
        job: JobKind,
        policy: &'a SchedulePolicy,
    },
    CycleStarted {
        job: JobKind,
        cycle_id: Uuid,
        manual: bool,
    },
    TriggerDropped {
        job: JobKind,
    },
    AttemptFailed {
        job: JobKind,
        cycle_id: Uuid,
        attempt: u32,
        error: &'a AppError,
        will_retry: bool,
    },
    CycleSucceeded {
        job: JobKind,
        cycle_id: Uuid,
        records: usize,
        attempts: u32,
    },
    CycleFailed {
        job: JobKind,
        cycle_id: Uuid,
        attempts: u32,
        error: &'a AppError,
        consecutive_failures: u32,
    },
    NextPoll {
        job: JobKind,
        delay: Duration,
    },
    HardReset {
        job: JobKind,
        resets: u32,
    },
    Stopped {
        job: JobKind,
    },
}

/// Trait for receiving collector events (decoupled logging).
pub trait CollectorReporter: Send + Sync {
    fn report(&self, event: CollectorEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCollectorReporter;

impl CollectorReporter for TracingCollectorReporter {
    fn report(&self, event: CollectorEvent<'_>) {
        match event {
            CollectorEvent::Started { job, policy } => {
                tracing::info!(%job, %policy, "Collector started");
            }
            CollectorEvent::CycleStarted {
                job,
                cycle_id,
                manual,
            } => {
                tracing::info!(%job, %cycle_id, %manual, "Collection cycle started");
            }
            CollectorEvent::TriggerDropped { job } => {
                tracing::info!(%job, "Cycle already running, trigger dropped");
            }
            CollectorEvent::AttemptFailed {
                job,
                cycle_id,
                attempt,
                error,
                will_retry,
            } => {
                tracing::warn!(
                    %job,
                    %cycle_id,
                    attempt,
                    %error,
                    %will_retry,
                    "Collection attempt failed"
                );
            }
            CollectorEvent::CycleSucceeded {
                job,
                cycle_id,
                records,
                attempts,
            } => {
                tracing::info!(%job, %cycle_id, records, attempts, "Collection cycle succeeded");
            }
            CollectorEvent::CycleFailed {
                job,
                cycle_id,
                attempts,
                error,
                consecutive_failures,
            } => {
                tracing::error!(
                    %job,
                    %cycle_id,
                    attempts,
                    %error,
                    consecutive_failures,
                    "Collection cycle failed after all attempts"
                );
            }
            CollectorEvent::NextPoll { job, delay } => {
                tracing::info!(%job, delay_secs = delay.as_secs(), "Next poll scheduled");
            }
            CollectorEvent::HardReset { job, resets } => {
                tracing::warn!(%job, resets, "Periodic job hard reset");
            }
            CollectorEvent::Stopped { job } => {
                tracing::info!(%job, "Collector stopped");
            }
        }
    }
}

/// One collection attempt: acquire, extract, and (for rankings) forward.
pub trait Collect: Send + Sync {
    type Record: TimedRecord + Send + Sync + 'static;

    fn kind(&self) -> JobKind;

    fn collect(
        &self,
    ) -> impl Future<Output = Result<CollectionResult<Self::Record>, AppError>> + Send;
}

/// Collects match schedules.
pub struct MatchCollector<C, P, Tz>
where
    C: SourceConnector,
    P: SnapshotParser,
    Tz: TimeZone,
{
    connector: C,
    parser: P,
    extractor: MatchExtractor<Tz>,
    url: String,
    variant: MatchVariant,
    poll_window: Duration,
}

impl<C, P, Tz> MatchCollector<C, P, Tz>
where
    C: SourceConnector,
    P: SnapshotParser,
    Tz: TimeZone,
{
    pub fn new(connector: C, parser: P, tz: Tz, config: &CollectorConfig) -> Result<Self, AppError> {
        validate_poll_window(config.poll_window)?;
        Ok(Self {
            connector,
            parser,
            extractor: MatchExtractor::new(&config.source_base_url, tz)?,
            url: config.matches_url(),
            variant: config.variant,
            poll_window: config.poll_window,
        })
    }
}

impl<C, P, Tz> Collect for MatchCollector<C, P, Tz>
where
    C: SourceConnector,
    P: SnapshotParser,
    Tz: TimeZone + Send + Sync,
{
    type Record = MatchEvent;

    fn kind(&self) -> JobKind {
        JobKind::Matches
    }

    async fn collect(&self) -> Result<CollectionResult<MatchEvent>, AppError> {
        let html = self.connector.acquire(&self.url).await?;

        // The parsed tree is not Send; it must not outlive this block.
        let records = {
            let snapshot = self.parser.parse(&html);
            self.extractor.extract(&snapshot)
        };

        let records = match self.variant {
            MatchVariant::Imminent => within_horizon(records, Utc::now(), self.poll_window),
            MatchVariant::All => records,
        };

        Ok(CollectionResult::new(records))
    }
}

/// Collects the team ranking and forwards it to the ingestion boundary.
pub struct RankingCollector<C, P, S>
where
    C: SourceConnector,
    P: SnapshotParser,
    S: IngestionSink,
{
    connector: C,
    parser: P,
    sink: S,
    extractor: RankingExtractor,
    url: String,
}

impl<C, P, S> RankingCollector<C, P, S>
where
    C: SourceConnector,
    P: SnapshotParser,
    S: IngestionSink,
{
    pub fn new(connector: C, parser: P, sink: S, config: &CollectorConfig) -> Result<Self, AppError> {
        Ok(Self {
            connector,
            parser,
            sink,
            extractor: RankingExtractor::new(&config.source_base_url)?,
            url: config.rankings_url(),
        })
    }
}

impl<C, P, S> Collect for RankingCollector<C, P, S>
where
    C: SourceConnector,
    P: SnapshotParser,
    S: IngestionSink,
{
    type Record = RankedTeam;

    fn kind(&self) -> JobKind {
        JobKind::Rankings
    }

    async fn collect(&self) -> Result<CollectionResult<RankedTeam>, AppError> {
        let html = self.connector.acquire(&self.url).await?;

        let teams = {
            let snapshot = self.parser.parse(&html);
            self.extractor.extract(&snapshot)
        };
        let result = CollectionResult::new(teams);

        let ack = self.sink.forward(&result).await?;
        tracing::info!(teams = result.len(), message = %ack.message, "Ranking batch ingested");

        Ok(result)
    }
}

/// Result of one guarded cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed { records: usize, attempts: u32 },
    Failed { attempts: u32, failure: FailureOutcome },
    /// Another cycle of the same job was in flight.
    Dropped,
}

/// Why a scheduling loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    Cancelled,
    HardResetRequested,
}

/// Settles a cycle as failed if it unwinds or is dropped before an outcome.
struct CycleGuard<'a> {
    monitor: &'a HealthMonitor,
    settled: bool,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::error!(job = %self.monitor.name(), "Cycle ended without an outcome");
            self.monitor.fail();
        }
    }
}

/// Drives one collector on its schedule.
pub struct JobRunner<C: Collect> {
    collector: C,
    policy: SchedulePolicy,
    retry: RetryPolicy,
    monitor: HealthMonitor,
    last_records: Mutex<Vec<C::Record>>,
    /// Wakes the scheduling loop after a manual cycle.
    wake: Notify,
}

impl<C: Collect> JobRunner<C> {
    pub fn new(collector: C, policy: SchedulePolicy, retry: RetryPolicy) -> Self {
        let monitor = HealthMonitor::new(collector.kind().as_str());
        Self::with_monitor(collector, policy, retry, monitor)
    }

    pub fn with_monitor(
        collector: C,
        policy: SchedulePolicy,
        retry: RetryPolicy,
        monitor: HealthMonitor,
    ) -> Self {
        Self {
            collector,
            policy,
            retry,
            monitor,
            last_records: Mutex::new(Vec::new()),
            wake: Notify::new(),
        }
    }

    pub fn kind(&self) -> JobKind {
        self.collector.kind()
    }

    pub fn monitor(&self) -> &HealthMonitor {
        &self.monitor
    }

    pub fn policy(&self) -> &SchedulePolicy {
        &self.policy
    }

    pub fn last_record_count(&self) -> usize {
        self.lock_records().len()
    }

    fn lock_records(&self) -> std::sync::MutexGuard<'_, Vec<C::Record>> {
        self.last_records.lock().unwrap_or_else(|poisoned| {
            tracing::warn!(job = %self.kind(), "Recovered from poisoned mutex");
            poisoned.into_inner()
        })
    }

    /// Run one cycle unless one is already in flight.
    pub async fn run_cycle<R: CollectorReporter>(&self, reporter: &R, manual: bool) -> CycleOutcome {
        let job = self.kind();
        if !self.monitor.try_start() {
            reporter.report(CollectorEvent::TriggerDropped { job });
            return CycleOutcome::Dropped;
        }
        let mut guard = CycleGuard {
            monitor: &self.monitor,
            settled: false,
        };
        let cycle_id = Uuid::new_v4();
        reporter.report(CollectorEvent::CycleStarted {
            job,
            cycle_id,
            manual,
        });

        let outcome = attempt_with_retry(
            &self.retry,
            |_| self.collector.collect(),
            |attempt, error, will_retry| {
                reporter.report(CollectorEvent::AttemptFailed {
                    job,
                    cycle_id,
                    attempt,
                    error,
                    will_retry,
                });
            },
        )
        .await;

        match outcome {
            RetryOutcome::Success { value, attempts } => {
                let records = value.len();
                guard.settled = true;
                self.monitor.succeed(value.timestamp);
                *self.lock_records() = value.records;
                reporter.report(CollectorEvent::CycleSucceeded {
                    job,
                    cycle_id,
                    records,
                    attempts,
                });
                CycleOutcome::Completed { records, attempts }
            }
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                guard.settled = true;
                let failure = self.monitor.fail();
                reporter.report(CollectorEvent::CycleFailed {
                    job,
                    cycle_id,
                    attempts,
                    error: &last_error,
                    consecutive_failures: failure.consecutive_failures,
                });
                CycleOutcome::Failed { attempts, failure }
            }
        }
    }

    /// Manual trigger. Dropped, not queued, while a cycle is running.
    ///
    /// A running loop is woken afterwards so it re-checks health and
    /// recomputes its delay from the fresh records.
    pub async fn trigger<R: CollectorReporter>(&self, reporter: &R) -> CycleOutcome {
        let outcome = self.run_cycle(reporter, true).await;
        if outcome != CycleOutcome::Dropped {
            self.wake.notify_one();
        }
        outcome
    }

    /// Delay until the next poll, computed from the last successful records.
    pub fn next_delay(&self) -> Duration {
        let records = self.lock_records();
        self.policy.next_delay(&records, &Local::now())
    }

    /// Run the scheduling loop until cancelled.
    ///
    /// Under a fixed schedule the loop returns
    /// [`RunExit::HardResetRequested`] once the failure threshold is hit,
    /// whether the failing cycles were scheduled or manual.
    pub async fn run<R: CollectorReporter>(
        &self,
        cancel_token: CancellationToken,
        run_immediately: bool,
        reporter: &R,
    ) -> RunExit {
        let job = self.kind();
        reporter.report(CollectorEvent::Started {
            job,
            policy: &self.policy,
        });

        let mut run_now = run_immediately;
        loop {
            if cancel_token.is_cancelled() {
                break;
            }

            if run_now {
                self.run_cycle(reporter, false).await;
            }

            // Manual cycles count toward the threshold too.
            if self.policy.is_fixed() && !self.monitor.is_healthy() {
                reporter.report(CollectorEvent::Stopped { job });
                return RunExit::HardResetRequested;
            }

            let delay = self.next_delay();
            self.monitor.set_next_poll_delay(delay);
            reporter.report(CollectorEvent::NextPoll { job, delay });

            run_now = tokio::select! {
                () = tokio::time::sleep(delay) => true,
                () = self.wake.notified() => false,
                () = cancel_token.cancelled() => break,
            };
        }

        reporter.report(CollectorEvent::Stopped { job });
        RunExit::Cancelled
    }

    /// Run the loop, replacing it with a fresh one on every hard reset.
    pub async fn supervise<R: CollectorReporter>(
        &self,
        shutdown: CancellationToken,
        run_immediately: bool,
        reporter: &R,
    ) {
        let mut run_now = run_immediately;
        loop {
            let loop_token = shutdown.child_token();
            match self.run(loop_token.clone(), run_now, reporter).await {
                RunExit::Cancelled => return,
                RunExit::HardResetRequested => {
                    loop_token.cancel();
                    self.monitor.reset_failures();
                    let resets = self.monitor.record_hard_reset();
                    reporter.report(CollectorEvent::HardReset {
                        job: self.kind(),
                        resets,
                    });
                    if shutdown.is_cancelled() {
                        return;
                    }
                    // The fresh loop waits for its next fire time.
                    run_now = false;
                }
            }
        }
    }
}
