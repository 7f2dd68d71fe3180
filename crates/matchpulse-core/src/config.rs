//! Runtime settings shared by the collectors and connectors.

use std::time::Duration;

use crate::extract::MatchVariant;

pub const DEFAULT_SOURCE_BASE_URL: &str = "https://www.hltv.org";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Timing and identity for acquiring one rendered page.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Fixed wait after consent handling, before the page is captured.
    pub settle_delay: Duration,

    /// How long to wait for the consent prompt to appear.
    pub consent_timeout: Duration,

    /// How long to wait for the consent prompt to go away after clicking.
    pub dismiss_timeout: Duration,

    /// Upper bound on navigation plus render.
    pub navigation_timeout: Duration,

    pub user_agent: String,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(5),
            consent_timeout: Duration::from_secs(5),
            dismiss_timeout: Duration::from_secs(10),
            navigation_timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ConnectorConfig {
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_consent_timeout(mut self, timeout: Duration) -> Self {
        self.consent_timeout = timeout;
        self
    }

    pub fn with_dismiss_timeout(mut self, timeout: Duration) -> Self {
        self.dismiss_timeout = timeout;
        self
    }

    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Where the collectors read from and how match lists are filtered.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub source_base_url: String,
    pub matches_path: String,
    pub rankings_path: String,
    pub variant: MatchVariant,

    /// Horizon for the imminent variant.
    pub poll_window: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            source_base_url: DEFAULT_SOURCE_BASE_URL.to_string(),
            matches_path: "/matches".to_string(),
            rankings_path: "/ranking/teams".to_string(),
            variant: MatchVariant::Imminent,
            poll_window: Duration::from_secs(2 * 60 * 60),
        }
    }
}

impl CollectorConfig {
    pub fn with_source_base_url(mut self, url: impl Into<String>) -> Self {
        self.source_base_url = url.into();
        self
    }

    pub fn with_variant(mut self, variant: MatchVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_poll_window(mut self, window: Duration) -> Self {
        self.poll_window = window;
        self
    }

    pub fn matches_url(&self) -> String {
        join_path(&self.source_base_url, &self.matches_path)
    }

    pub fn rankings_url(&self) -> String {
        join_path(&self.source_base_url, &self.rankings_path)
    }
}

fn join_path(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
