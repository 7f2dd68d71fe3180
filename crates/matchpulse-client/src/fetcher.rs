use std::time::Duration;

use matchpulse_core::config::ConnectorConfig;
use matchpulse_core::error::AppError;
use matchpulse_core::traits::SourceConnector;
use reqwest::Client;

/// Plain HTTP connector using reqwest.
///
/// Returns the server-rendered HTML as-is: no script execution and no
/// consent prompt to dismiss. Use the browser connector for pages that
/// render client-side.
#[derive(Clone)]
pub struct HttpConnector {
    client: Client,
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(config: &ConnectorConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.navigation_timeout)
            .build()
            .map_err(|e| AppError::ConfigError(format!("HTTP client error: {e}")))?;

        Ok(Self {
            client,
            timeout: config.navigation_timeout,
        })
    }
}

impl SourceConnector for HttpConnector {
    async fn acquire(&self, url: &str) -> Result<String, AppError> {
        tracing::debug!(%url, "Fetching page");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout.as_secs())
            } else {
                AppError::ConnectionError(format!("Request to {url} failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::ConnectionError(format!(
                "HTTP {} for {url}",
                status.as_u16()
            )));
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout.as_secs())
            } else {
                AppError::ConnectionError(format!("Failed to read response body: {e}"))
            }
        })
    }
}
