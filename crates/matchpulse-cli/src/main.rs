mod config;
mod health;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use matchpulse_client::{HtmlParser, HttpIngestionForwarder};
use matchpulse_core::collector::{
    Collect, JobKind, JobRunner, MatchCollector, RankingCollector, TracingCollectorReporter,
};
use matchpulse_core::config::ConnectorConfig;
use matchpulse_core::models::CollectionResult;
use matchpulse_core::retry::{RetryOutcome, RetryPolicy, attempt_with_retry};
use matchpulse_core::traits::NullSink;

use crate::config::Settings;
use crate::health::HealthState;

#[cfg(feature = "browser")]
type Connector = matchpulse_client::BrowserConnector;
#[cfg(not(feature = "browser"))]
type Connector = matchpulse_client::HttpConnector;

#[derive(Parser)]
#[command(name = "matchpulse", version, about = "Esports match and ranking collector")]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run both periodic collectors until interrupted
    Run {
        /// Address for the health endpoint (e.g. 127.0.0.1:8080)
        #[arg(long, env = "HEALTH_ADDR")]
        health_addr: Option<SocketAddr>,

        /// Wait for the first scheduled fire time instead of collecting at startup
        #[arg(long, default_value_t = false)]
        no_initial_run: bool,
    },

    /// Collect the match schedule once and print it as JSON
    Matches,

    /// Collect the team ranking once, forward it, and print it as JSON
    Rankings {
        /// Skip forwarding to the ingestion API
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("matchpulse=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = cli.settings;

    match cli.command {
        Commands::Run {
            health_addr,
            no_initial_run,
        } => cmd_run(&settings, health_addr, !no_initial_run).await?,
        Commands::Matches => cmd_matches(&settings).await?,
        Commands::Rankings { dry_run } => cmd_rankings(&settings, dry_run).await?,
    }

    Ok(())
}

#[cfg(feature = "browser")]
fn build_connector(config: ConnectorConfig) -> Result<Connector> {
    Ok(matchpulse_client::BrowserConnector::new(config))
}

#[cfg(not(feature = "browser"))]
fn build_connector(config: ConnectorConfig) -> Result<Connector> {
    matchpulse_client::HttpConnector::new(&config).context("Failed to build HTTP connector")
}

async fn cmd_run(
    settings: &Settings,
    health_addr: Option<SocketAddr>,
    run_immediately: bool,
) -> Result<()> {
    let connector = build_connector(settings.connector_config())?;
    let collector_config = settings.collector_config();
    let retry = settings.retry_policy();

    let forwarder = HttpIngestionForwarder::new(&settings.backend_url)
        .context("Failed to build ingestion client")?;
    tracing::info!(endpoint = forwarder.endpoint(), "Forwarding rankings");

    let matches = Arc::new(JobRunner::new(
        MatchCollector::new(connector.clone(), HtmlParser, Local, &collector_config)?,
        settings.match_policy()?,
        retry.clone(),
    ));
    let rankings = Arc::new(JobRunner::new(
        RankingCollector::new(connector, HtmlParser, forwarder, &collector_config)?,
        settings.team_policy()?,
        retry,
    ));

    let shutdown = CancellationToken::new();
    let mut tasks = JoinSet::new();

    spawn_supervised(&mut tasks, matches.clone(), shutdown.clone(), run_immediately);
    spawn_supervised(&mut tasks, rankings.clone(), shutdown.clone(), run_immediately);

    if let Some(addr) = health_addr {
        let (tx, rx) = mpsc::channel(4);
        let state = HealthState::new(vec![matches.monitor().clone(), rankings.monitor().clone()])
            .with_triggers(tx);

        let token = shutdown.clone();
        tasks.spawn(async move {
            if let Err(e) = health::serve(addr, Arc::new(state), token).await {
                tracing::error!(error = %e, "Health endpoint stopped");
            }
        });

        let token = shutdown.clone();
        tasks.spawn(dispatch_triggers(rx, matches, rankings, token));
    }

    shutdown_signal().await;
    shutdown.cancel();

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "Task panicked");
        }
    }

    tracing::info!("All collectors stopped");
    Ok(())
}

fn spawn_supervised<C: Collect + 'static>(
    tasks: &mut JoinSet<()>,
    runner: Arc<JobRunner<C>>,
    shutdown: CancellationToken,
    run_immediately: bool,
) {
    tasks.spawn(async move {
        runner
            .supervise(shutdown, run_immediately, &TracingCollectorReporter)
            .await;
    });
}

/// Run manual triggers from the health endpoint until shutdown.
async fn dispatch_triggers<M, R>(
    mut rx: mpsc::Receiver<JobKind>,
    matches: Arc<JobRunner<M>>,
    rankings: Arc<JobRunner<R>>,
    shutdown: CancellationToken,
) where
    M: Collect + 'static,
    R: Collect + 'static,
{
    let mut in_flight = JoinSet::new();

    loop {
        let kind = tokio::select! {
            () = shutdown.cancelled() => break,
            received = rx.recv() => match received {
                Some(kind) => kind,
                None => break,
            },
        };

        tracing::info!(job = %kind, "Manual trigger received");
        match kind {
            JobKind::Matches => {
                let runner = matches.clone();
                in_flight.spawn(async move {
                    runner.trigger(&TracingCollectorReporter).await;
                });
            }
            JobKind::Rankings => {
                let runner = rankings.clone();
                in_flight.spawn(async move {
                    runner.trigger(&TracingCollectorReporter).await;
                });
            }
        }
    }

    // Cycles already started run to completion.
    while in_flight.join_next().await.is_some() {}
}

async fn cmd_matches(settings: &Settings) -> Result<()> {
    let connector = build_connector(settings.connector_config())?;
    let collector = MatchCollector::new(connector, HtmlParser, Local, &settings.collector_config())?;

    let result = collect_once(&collector, &settings.retry_policy()).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn cmd_rankings(settings: &Settings, dry_run: bool) -> Result<()> {
    let connector = build_connector(settings.connector_config())?;
    let collector_config = settings.collector_config();
    let retry = settings.retry_policy();

    let result = if dry_run {
        let collector = RankingCollector::new(connector, HtmlParser, NullSink, &collector_config)?;
        collect_once(&collector, &retry).await?
    } else {
        let forwarder = HttpIngestionForwarder::new(&settings.backend_url)
            .context("Failed to build ingestion client")?;
        let collector = RankingCollector::new(connector, HtmlParser, forwarder, &collector_config)?;
        collect_once(&collector, &retry).await?
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// One retried collection outside the scheduler.
async fn collect_once<C>(collector: &C, retry: &RetryPolicy) -> Result<CollectionResult<C::Record>>
where
    C: Collect,
    C::Record: Serialize,
{
    let job = collector.kind();
    let outcome = attempt_with_retry(
        retry,
        |_| collector.collect(),
        |attempt, error, will_retry| {
            tracing::warn!(%job, attempt, error = %error, will_retry, "Collection attempt failed");
        },
    )
    .await;

    match outcome {
        RetryOutcome::Success { value, attempts } => {
            tracing::info!(%job, records = value.len(), attempts, "Collection complete");
            Ok(value)
        }
        RetryOutcome::Exhausted {
            attempts,
            last_error,
        } => Err(anyhow::Error::new(last_error)
            .context(format!("{job} collection failed after {attempts} attempts"))),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for CTRL+C");
        return;
    }
    tracing::info!("Shutdown signal received");
}
