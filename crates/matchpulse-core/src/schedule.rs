//! Poll scheduling.
//!
//! Two policies decide how long a collector sleeps between cycles:
//!
//! ```text
//! Adaptive:  rollover within default interval? ──yes──> until 00:01 (no jitter)
//!                     │no
//!            nearest upcoming non-live record?  ──none─> default + jitter
//!                     │Δ
//!            Δ < 30m ─> imminent + jitter
//!            Δ < 2h  ─> upcoming + jitter
//!            else    ─> default  + jitter
//!
//! Fixed:     next cron fire time − now
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Offset, TimeZone, Utc};
use cron::Schedule;
use rand::Rng;

use crate::error::AppError;
use crate::models::TimedRecord;

/// Delay classes used by the adaptive policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Imminent,
    Upcoming,
    Default,
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Band::Imminent => write!(f, "imminent"),
            Band::Upcoming => write!(f, "upcoming"),
            Band::Default => write!(f, "default"),
        }
    }
}

/// Outcome of one adaptive scheduling decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDecision {
    /// Fire shortly after the local day rolls over.
    DayBoundary(Duration),
    Banded {
        band: Band,
        base: Duration,
        jitter: Duration,
    },
}

impl PollDecision {
    pub fn delay(&self) -> Duration {
        match *self {
            PollDecision::DayBoundary(d) => d,
            PollDecision::Banded { base, jitter, .. } => base + jitter,
        }
    }
}

/// Configuration for the adaptive policy.
#[derive(Debug, Clone)]
pub struct AdaptiveConfig {
    pub default_interval: Duration,
    pub upcoming_interval: Duration,
    pub imminent_interval: Duration,

    /// Nearest match closer than this selects the imminent band.
    pub imminent_threshold: Duration,

    /// Nearest match closer than this selects the upcoming band.
    pub upcoming_threshold: Duration,

    /// Upper bound of the uniform jitter added to banded delays.
    pub jitter_max: Duration,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            default_interval: Duration::from_secs(30 * 60),
            upcoming_interval: Duration::from_secs(10 * 60),
            imminent_interval: Duration::from_secs(2 * 60),
            imminent_threshold: Duration::from_secs(30 * 60),
            upcoming_threshold: Duration::from_secs(2 * 60 * 60),
            jitter_max: Duration::from_secs(60),
        }
    }
}

impl AdaptiveConfig {
    pub fn with_default_interval(mut self, interval: Duration) -> Self {
        self.default_interval = interval;
        self
    }

    pub fn with_upcoming_interval(mut self, interval: Duration) -> Self {
        self.upcoming_interval = interval;
        self
    }

    pub fn with_imminent_interval(mut self, interval: Duration) -> Self {
        self.imminent_interval = interval;
        self
    }

    pub fn with_jitter(mut self, jitter_max: Duration) -> Self {
        self.jitter_max = jitter_max;
        self
    }

    /// Decide the next delay. `draw` is a uniform sample in `[0, 1]` that
    /// scales the jitter; everything else is a pure function of the inputs.
    pub fn decide<R: TimedRecord, Tz: TimeZone>(
        &self,
        records: &[R],
        now: &DateTime<Tz>,
        draw: f64,
    ) -> PollDecision {
        if let Some(until_rollover) = until_day_rollover(now)
            && until_rollover < self.default_interval
        {
            return PollDecision::DayBoundary(until_rollover);
        }

        let now_utc = now.with_timezone(&Utc);
        let nearest = records
            .iter()
            .filter(|r| !r.is_live())
            .filter_map(|r| r.scheduled_time())
            .filter(|t| *t > now_utc)
            .min();

        let band = match nearest.and_then(|t| (t - now_utc).to_std().ok()) {
            None => Band::Default,
            Some(delta) if delta < self.imminent_threshold => Band::Imminent,
            Some(delta) if delta < self.upcoming_threshold => Band::Upcoming,
            Some(_) => Band::Default,
        };

        let base = match band {
            Band::Imminent => self.imminent_interval,
            Band::Upcoming => self.upcoming_interval,
            Band::Default => self.default_interval,
        };

        let draw = if draw.is_finite() { draw.clamp(0.0, 1.0) } else { 0.0 };
        PollDecision::Banded {
            band,
            base,
            jitter: self.jitter_max.mul_f64(draw),
        }
    }

    /// Same as [`decide`](Self::decide), drawing the jitter from the thread RNG.
    pub fn decide_random<R: TimedRecord, Tz: TimeZone>(
        &self,
        records: &[R],
        now: &DateTime<Tz>,
    ) -> PollDecision {
        let draw: f64 = rand::rng().random_range(0.0..=1.0);
        self.decide(records, now, draw)
    }
}

/// Delay until the next poll under the adaptive policy.
pub fn compute_next_delay<R: TimedRecord, Tz: TimeZone>(
    config: &AdaptiveConfig,
    records: &[R],
    now: &DateTime<Tz>,
    draw: f64,
) -> Duration {
    config.decide(records, now, draw).delay()
}

/// Time from `now` to one minute past the next local midnight.
///
/// When 00:01 falls in a DST gap the pre-transition offset is used, which
/// lands one minute after the clocks jump.
fn until_day_rollover<Tz: TimeZone>(now: &DateTime<Tz>) -> Option<Duration> {
    let naive = now.date_naive().succ_opt()?.and_hms_opt(0, 1, 0)?;
    let target = match now.timezone().from_local_datetime(&naive).earliest() {
        Some(target) => target,
        None => now
            .offset()
            .fix()
            .from_local_datetime(&naive)
            .single()?
            .with_timezone(&now.timezone()),
    };
    target.signed_duration_since(now).to_std().ok()
}

/// Legacy fixed schedule driven by a cron expression.
#[derive(Debug, Clone)]
pub struct FixedSchedule {
    expression: String,
    schedule: Schedule,
}

impl FixedSchedule {
    /// Parse a cron expression. Five-field expressions get a leading
    /// seconds field of `0`.
    pub fn parse(expression: &str) -> Result<Self, AppError> {
        let trimmed = expression.trim();
        let normalized = if trimmed.split_whitespace().count() == 5 {
            format!("0 {trimmed}")
        } else {
            trimmed.to_string()
        };

        let schedule = Schedule::from_str(&normalized).map_err(|e| {
            AppError::ConfigError(format!("Invalid cron expression '{expression}': {e}"))
        })?;

        Ok(Self {
            expression: trimmed.to_string(),
            schedule,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Delay until the next fire time after `now`.
    pub fn next_delay<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<Duration> {
        let next = self.schedule.after(now).next()?;
        next.signed_duration_since(now).to_std().ok()
    }
}

/// Which policy a job is scheduled under.
#[derive(Debug, Clone)]
pub enum SchedulePolicy {
    Adaptive(AdaptiveConfig),
    Fixed(FixedSchedule),
}

impl SchedulePolicy {
    /// Parse an optional cron expression: present selects the fixed policy,
    /// absent selects the adaptive one.
    pub fn from_expression(
        expression: Option<&str>,
        adaptive: AdaptiveConfig,
    ) -> Result<Self, AppError> {
        match expression.map(str::trim).filter(|e| !e.is_empty()) {
            Some(expr) => Ok(SchedulePolicy::Fixed(FixedSchedule::parse(expr)?)),
            None => Ok(SchedulePolicy::Adaptive(adaptive)),
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, SchedulePolicy::Fixed(_))
    }

    pub fn next_delay<R: TimedRecord, Tz: TimeZone>(
        &self,
        records: &[R],
        now: &DateTime<Tz>,
    ) -> Duration {
        match self {
            SchedulePolicy::Adaptive(config) => config.decide_random(records, now).delay(),
            SchedulePolicy::Fixed(schedule) => schedule.next_delay(now).unwrap_or_else(|| {
                tracing::warn!(
                    expression = %schedule.expression(),
                    "Cron schedule has no future fire time, falling back to one hour"
                );
                Duration::from_secs(60 * 60)
            }),
        }
    }
}

impl fmt::Display for SchedulePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulePolicy::Adaptive(_) => write!(f, "adaptive"),
            SchedulePolicy::Fixed(s) => write!(f, "cron '{}'", s.expression()),
        }
    }
}
