use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One side of a match, or the entity behind a ranking row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: Option<String>,
    pub name: Option<String>,
    pub logo: Option<String>,
    pub logo_alt: Option<String>,
    pub title: Option<String>,
}

/// A team as it appears in the ranking list.
///
/// `rank` is the 1-based position of the row in the extracted list. The
/// source never exposes a separate rank attribute, so list order is the only
/// rank there is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedTeam {
    #[serde(flatten)]
    pub team: Team,
    pub rank: u32,
    pub points: u32,
    pub change: i32,
    pub is_new: bool,
}

/// A scheduled or live match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEvent {
    pub match_id: Option<String>,
    pub event_id: Option<String>,
    pub event_type: Option<String>,
    pub region: Option<String>,
    pub is_lan: bool,
    pub is_live: bool,
    pub is_pinned: bool,
    pub stars: u32,
    /// Start instant, serialized as epoch milliseconds.
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub scheduled_time: Option<DateTime<Utc>>,
    pub time_format: Option<String>,
    pub format: Option<String>,
    pub stage: Option<String>,
    pub match_url: Option<String>,
    pub analytics_url: Option<String>,
    pub team1: Team,
    pub team2: Team,
    pub event_name: String,
    pub raw_snapshot: String,
}

/// Records produced by one successful collection attempt.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionResult<R> {
    pub records: Vec<R>,
    pub timestamp: DateTime<Utc>,
}

impl<R> CollectionResult<R> {
    pub fn new(records: Vec<R>) -> Self {
        Self {
            records,
            timestamp: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Request body accepted by the ingestion boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamsBatch {
    pub teams: Vec<RankedTeam>,
    /// ISO-8601 completion time of the scrape.
    pub timestamp: String,
}

impl From<&CollectionResult<RankedTeam>> for TeamsBatch {
    fn from(result: &CollectionResult<RankedTeam>) -> Self {
        Self {
            teams: result.records.clone(),
            timestamp: result.timestamp.to_rfc3339(),
        }
    }
}

/// Acknowledgement returned by the ingestion boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionAck {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Point-in-time read of a collector's run/failure state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub job: String,
    pub is_running: bool,
    pub last_run_time: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub is_healthy: bool,
    #[serde(rename = "nextPollDelayMs", serialize_with = "serialize_millis")]
    pub next_poll_delay: Option<Duration>,
    pub hard_resets: u32,
}

impl HealthSnapshot {
    /// Whole minutes since the last successful run, if there was one.
    pub fn minutes_since_last_run(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_run_time
            .map(|last| (now - last).num_minutes().max(0))
    }
}

fn serialize_millis<S: serde::Serializer>(
    value: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
        None => serializer.serialize_none(),
    }
}

/// A record the scheduler can reason about.
pub trait TimedRecord {
    fn scheduled_time(&self) -> Option<DateTime<Utc>>;
    fn is_live(&self) -> bool;
}

impl TimedRecord for MatchEvent {
    fn scheduled_time(&self) -> Option<DateTime<Utc>> {
        self.scheduled_time
    }

    fn is_live(&self) -> bool {
        self.is_live
    }
}

impl TimedRecord for RankedTeam {
    fn scheduled_time(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn is_live(&self) -> bool {
        false
    }
}
