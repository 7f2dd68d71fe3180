use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use matchpulse_core::config::{
    CollectorConfig, ConnectorConfig, DEFAULT_SOURCE_BASE_URL, DEFAULT_USER_AGENT,
};
use matchpulse_core::extract::MatchVariant;
use matchpulse_core::retry::RetryPolicy;
use matchpulse_core::schedule::{AdaptiveConfig, SchedulePolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VariantArg {
    /// Only non-live matches starting within the poll window
    Imminent,
    /// Every match on the page
    All,
}

impl From<VariantArg> for MatchVariant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Imminent => MatchVariant::Imminent,
            VariantArg::All => MatchVariant::All,
        }
    }
}

/// Settings shared by every command. Durations are in milliseconds.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Base URL of the source site
    #[arg(long, env = "SOURCE_BASE_URL", default_value = DEFAULT_SOURCE_BASE_URL, global = true)]
    pub source_base_url: String,

    /// Wait after consent handling before capturing the page
    #[arg(long, env = "SCRAPER_WAIT_TIME", default_value_t = 5_000, global = true)]
    pub settle_ms: u64,

    /// How long to wait for the consent dialog to appear
    #[arg(long, env = "COOKIE_DIALOG_TIMEOUT", default_value_t = 5_000, global = true)]
    pub consent_timeout_ms: u64,

    /// How long to wait for the consent dialog to disappear
    #[arg(long, env = "DIALOG_DISAPPEAR_TIMEOUT", default_value_t = 10_000, global = true)]
    pub dismiss_timeout_ms: u64,

    /// Upper bound on navigation and render
    #[arg(long, env = "NAVIGATION_TIMEOUT", default_value_t = 30_000, global = true)]
    pub navigation_timeout_ms: u64,

    /// User agent presented to the source
    #[arg(long, env = "SCRAPER_USER_AGENT", default_value = DEFAULT_USER_AGENT, global = true)]
    pub user_agent: String,

    /// Attempts per collection cycle
    #[arg(
        long,
        env = "RETRY_ATTEMPTS",
        default_value_t = 3,
        value_parser = clap::value_parser!(u32).range(1..),
        global = true
    )]
    pub retry_attempts: u32,

    /// Delay between attempts
    #[arg(long, env = "RETRY_DELAY", default_value_t = 60_000, global = true)]
    pub retry_delay_ms: u64,

    /// Cron expression for the match job; unset selects adaptive polling
    #[arg(long, env = "MATCH_CRON_SCHEDULE", global = true)]
    pub match_cron: Option<String>,

    /// Cron expression for the ranking job
    #[arg(long, env = "TEAM_CRON_SCHEDULE", default_value = "0 0 0 * * *", global = true)]
    pub team_cron: String,

    /// Ingestion API base URL; batches are posted to <url>/teams
    #[arg(long, env = "BACKEND_URL", default_value = "http://localhost:3000/api", global = true)]
    pub backend_url: String,

    /// Horizon for the imminent match variant
    #[arg(long, env = "POLL_WINDOW", default_value_t = 7_200_000, global = true)]
    pub poll_window_ms: u64,

    /// Which matches to keep
    #[arg(long, env = "MATCH_VARIANT", value_enum, default_value_t = VariantArg::Imminent, global = true)]
    pub variant: VariantArg,

    /// Adaptive poll interval with nothing close
    #[arg(long, env = "MATCH_DEFAULT_INTERVAL", default_value_t = 1_800_000, global = true)]
    pub default_interval_ms: u64,

    /// Adaptive poll interval with a match under two hours away
    #[arg(long, env = "MATCH_UPCOMING_INTERVAL", default_value_t = 600_000, global = true)]
    pub upcoming_interval_ms: u64,

    /// Adaptive poll interval with a match under thirty minutes away
    #[arg(long, env = "MATCH_IMMINENT_INTERVAL", default_value_t = 120_000, global = true)]
    pub imminent_interval_ms: u64,
}

impl Settings {
    pub fn connector_config(&self) -> ConnectorConfig {
        ConnectorConfig::default()
            .with_settle_delay(Duration::from_millis(self.settle_ms))
            .with_consent_timeout(Duration::from_millis(self.consent_timeout_ms))
            .with_dismiss_timeout(Duration::from_millis(self.dismiss_timeout_ms))
            .with_navigation_timeout(Duration::from_millis(self.navigation_timeout_ms))
            .with_user_agent(self.user_agent.as_str())
    }

    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig::default()
            .with_source_base_url(self.source_base_url.as_str())
            .with_variant(self.variant.into())
            .with_poll_window(Duration::from_millis(self.poll_window_ms))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, Duration::from_millis(self.retry_delay_ms))
    }

    pub fn adaptive_config(&self) -> AdaptiveConfig {
        AdaptiveConfig::default()
            .with_default_interval(Duration::from_millis(self.default_interval_ms))
            .with_upcoming_interval(Duration::from_millis(self.upcoming_interval_ms))
            .with_imminent_interval(Duration::from_millis(self.imminent_interval_ms))
    }

    pub fn match_policy(&self) -> Result<SchedulePolicy> {
        SchedulePolicy::from_expression(self.match_cron.as_deref(), self.adaptive_config())
            .context("Invalid MATCH_CRON_SCHEDULE")
    }

    pub fn team_policy(&self) -> Result<SchedulePolicy> {
        SchedulePolicy::from_expression(Some(&self.team_cron), self.adaptive_config())
            .context("Invalid TEAM_CRON_SCHEDULE")
    }
}
