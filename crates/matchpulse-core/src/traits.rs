use std::future::Future;

use crate::error::AppError;
use crate::models::{CollectionResult, IngestionAck, RankedTeam};
use crate::snapshot::Snapshot;

/// Acquires one rendered snapshot (HTML) of a source page.
///
/// Each call owns its rendering session exclusively and must release it
/// before returning, on success and on error alike.
pub trait SourceConnector: Send + Sync + Clone {
    fn acquire(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Turns raw markup into a walkable [`Snapshot`].
pub trait SnapshotParser: Send + Sync + Clone {
    type Snapshot: Snapshot;

    fn parse(&self, html: &str) -> Self::Snapshot;
}

/// Receives normalized ranking batches.
pub trait IngestionSink: Send + Sync + Clone {
    fn forward(
        &self,
        batch: &CollectionResult<RankedTeam>,
    ) -> impl Future<Output = Result<IngestionAck, AppError>> + Send;
}

/// A sink that acknowledges every batch without sending it anywhere.
#[derive(Debug, Clone)]
pub struct NullSink;

impl IngestionSink for NullSink {
    async fn forward(&self, batch: &CollectionResult<RankedTeam>) -> Result<IngestionAck, AppError> {
        Ok(IngestionAck {
            success: true,
            message: format!("Discarded {} teams", batch.len()),
            timestamp: None,
        })
    }
}
