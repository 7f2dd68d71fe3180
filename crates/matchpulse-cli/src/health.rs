use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use matchpulse_core::collector::JobKind;
use matchpulse_core::health::HealthMonitor;
use matchpulse_core::models::HealthSnapshot;

/// Shared state for the health routes.
pub struct HealthState {
    monitors: Vec<HealthMonitor>,
    triggers: Option<mpsc::Sender<JobKind>>,
}

impl HealthState {
    pub fn new(monitors: Vec<HealthMonitor>) -> Self {
        Self {
            monitors,
            triggers: None,
        }
    }

    /// Accept manual triggers on `POST /trigger/{job}` and hand them to `tx`.
    pub fn with_triggers(mut self, tx: mpsc::Sender<JobKind>) -> Self {
        self.triggers = Some(tx);
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHealth {
    #[serde(flatten)]
    pub snapshot: HealthSnapshot,
    pub minutes_since_last_run: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub jobs: Vec<JobHealth>,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub job: String,
    pub status: &'static str,
}

pub fn router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/trigger/{job}", post(trigger))
        .with_state(state)
}

async fn health(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let now = Utc::now();
    let jobs: Vec<JobHealth> = state
        .monitors
        .iter()
        .map(|m| {
            let snapshot = m.snapshot();
            JobHealth {
                minutes_since_last_run: snapshot.minutes_since_last_run(now),
                snapshot,
            }
        })
        .collect();

    let healthy = jobs.iter().all(|j| j.snapshot.is_healthy);
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" },
        jobs,
    };

    (status, Json(response))
}

async fn trigger(
    State(state): State<Arc<HealthState>>,
    Path(job): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let kind: JobKind = job.parse().map_err(|e| (StatusCode::NOT_FOUND, e))?;

    let tx = state.triggers.as_ref().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        "Manual triggers are disabled".to_string(),
    ))?;

    // A trigger already queued for this job covers this one too.
    match tx.try_send(kind) {
        Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => {}
        Err(mpsc::error::TrySendError::Closed(_)) => {
            return Err((
                StatusCode::SERVICE_UNAVAILABLE,
                "Collectors are shutting down".to_string(),
            ));
        }
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            job: kind.to_string(),
            status: "accepted",
        }),
    ))
}

/// Serve the health routes on `addr` until `shutdown` is cancelled.
pub async fn serve(
    addr: SocketAddr,
    state: Arc<HealthState>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = router(state).layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Health endpoint listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    Ok(())
}
