use std::time::Duration;

use matchpulse_core::error::AppError;
use matchpulse_core::models::{CollectionResult, IngestionAck, RankedTeam, TeamsBatch};
use matchpulse_core::traits::IngestionSink;
use reqwest::Client;

/// Posts ranking batches to `<base>/teams` and checks the acknowledgement.
#[derive(Clone)]
pub struct HttpIngestionForwarder {
    client: Client,
    endpoint: String,
}

impl HttpIngestionForwarder {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ConfigError(format!("HTTP client error: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/teams", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl IngestionSink for HttpIngestionForwarder {
    async fn forward(&self, batch: &CollectionResult<RankedTeam>) -> Result<IngestionAck, AppError> {
        let body = TeamsBatch::from(batch);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::IngestionError {
                message: format!("Request to {} failed: {e}", self.endpoint),
                status_code: None,
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| AppError::IngestionError {
            message: format!("Failed to read response body: {e}"),
            status_code: Some(status.as_u16()),
        })?;

        if !status.is_success() {
            return Err(AppError::IngestionError {
                message: if text.trim().is_empty() {
                    status.canonical_reason().unwrap_or("request rejected").to_string()
                } else {
                    text
                },
                status_code: Some(status.as_u16()),
            });
        }

        let ack: IngestionAck =
            serde_json::from_str(&text).map_err(|e| AppError::IngestionError {
                message: format!("Malformed acknowledgement: {e}"),
                status_code: Some(status.as_u16()),
            })?;

        if !ack.success {
            return Err(AppError::IngestionError {
                message: ack.message,
                status_code: Some(status.as_u16()),
            });
        }

        tracing::info!(teams = batch.len(), message = %ack.message, "Ingestion acknowledged");
        Ok(ack)
    }
}
