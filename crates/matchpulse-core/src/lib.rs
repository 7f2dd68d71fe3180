pub mod collector;
pub mod config;
pub mod error;
pub mod extract;
pub mod health;
pub mod models;
pub mod retry;
pub mod schedule;
pub mod snapshot;
pub mod traits;

#[doc(hidden)]
pub mod testutil;

pub use collector::{
    Collect, CollectorEvent, CollectorReporter, CycleOutcome, JobKind, JobRunner, MatchCollector,
    RankingCollector, RunExit, TracingCollectorReporter,
};
pub use config::{CollectorConfig, ConnectorConfig};
pub use error::AppError;
pub use extract::{MatchExtractor, MatchVariant, RankingExtractor};
pub use health::HealthMonitor;
pub use models::{
    CollectionResult, HealthSnapshot, IngestionAck, MatchEvent, RankedTeam, Team, TeamsBatch,
};
pub use retry::{RetryOutcome, RetryPolicy, attempt_with_retry};
pub use schedule::{AdaptiveConfig, FixedSchedule, SchedulePolicy, compute_next_delay};
pub use snapshot::{Node, Snapshot};
pub use traits::{IngestionSink, NullSink, SnapshotParser, SourceConnector};
