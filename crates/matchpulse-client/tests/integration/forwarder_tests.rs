use std::time::Duration;

use axum::http::StatusCode;
use matchpulse_client::{HtmlParser, HttpConnector, HttpIngestionForwarder};
use matchpulse_core::collector::{CycleOutcome, JobRunner, RankingCollector};
use matchpulse_core::config::{CollectorConfig, ConnectorConfig};
use matchpulse_core::error::AppError;
use matchpulse_core::models::{CollectionResult, RankedTeam, Team};
use matchpulse_core::retry::RetryPolicy;
use matchpulse_core::schedule::{AdaptiveConfig, SchedulePolicy};
use matchpulse_core::testutil::MockReporter;
use matchpulse_core::traits::IngestionSink;

use crate::integration::common::{Reply, spawn_stub};

fn batch() -> CollectionResult<RankedTeam> {
    CollectionResult::new(vec![RankedTeam {
        team: Team {
            id: Some("6667".into()),
            name: Some("FaZe".into()),
            logo: None,
            logo_alt: None,
            title: None,
        },
        rank: 1,
        points: 983,
        change: 0,
        is_new: false,
    }])
}

#[tokio::test]
async fn accepted_batch_returns_ack_and_sends_camel_case() {
    let stub = spawn_stub(Reply::accepted()).await;
    let forwarder = HttpIngestionForwarder::new(&stub.api_url()).unwrap();
    assert_eq!(forwarder.endpoint(), format!("{}/teams", stub.api_url()));

    let ack = forwarder.forward(&batch()).await.unwrap();
    assert!(ack.success);
    assert_eq!(ack.message, "Successfully received 3 teams");

    let batches = stub.batches();
    assert_eq!(batches.len(), 1);
    let team = &batches[0]["teams"][0];
    assert_eq!(team["name"], "FaZe");
    assert_eq!(team["rank"], 1);
    assert_eq!(team["isNew"], false);
    assert!(team.get("logoAlt").is_some());
    assert!(batches[0]["timestamp"].is_string());
}

#[tokio::test]
async fn server_error_is_ingestion_error_with_status() {
    let stub = spawn_stub(Reply::new(StatusCode::INTERNAL_SERVER_ERROR, "")).await;
    let forwarder = HttpIngestionForwarder::new(&stub.api_url()).unwrap();

    let err = forwarder.forward(&batch()).await.unwrap_err();
    match err {
        AppError::IngestionError {
            status_code,
            message,
        } => {
            assert_eq!(status_code, Some(500));
            assert_eq!(message, "Internal Server Error");
        }
        other => panic!("expected ingestion error, got {other:?}"),
    }
}

#[tokio::test]
async fn negative_ack_is_a_failure() {
    let stub = spawn_stub(Reply::new(
        StatusCode::OK,
        r#"{"success":false,"message":"Invalid data format"}"#,
    ))
    .await;
    let forwarder = HttpIngestionForwarder::new(&stub.api_url()).unwrap();

    let err = forwarder.forward(&batch()).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::IngestionError { ref message, status_code: Some(200) } if message == "Invalid data format"
    ));
}

#[tokio::test]
async fn malformed_ack_is_a_failure() {
    let stub = spawn_stub(Reply::new(StatusCode::OK, "<html>ok</html>")).await;
    let forwarder = HttpIngestionForwarder::new(&stub.api_url()).unwrap();

    let err = forwarder.forward(&batch()).await.unwrap_err();
    assert!(err.to_string().contains("Malformed acknowledgement"));
}

#[tokio::test]
async fn rejected_ingestion_fails_cycle_once_after_every_attempt() {
    let stub = spawn_stub(Reply::new(StatusCode::INTERNAL_SERVER_ERROR, "boom")).await;
    let config = CollectorConfig::default().with_source_base_url(stub.base_url());
    let collector = RankingCollector::new(
        HttpConnector::new(&ConnectorConfig::default()).unwrap(),
        HtmlParser,
        HttpIngestionForwarder::new(&stub.api_url()).unwrap(),
        &config,
    )
    .unwrap();
    let runner = JobRunner::new(
        collector,
        SchedulePolicy::Adaptive(AdaptiveConfig::default()),
        RetryPolicy::new(3, Duration::from_millis(10)),
    );
    let reporter = MockReporter::new();

    let outcome = runner.run_cycle(&reporter, false).await;

    assert!(matches!(outcome, CycleOutcome::Failed { attempts: 3, .. }));
    assert_eq!(stub.batches().len(), 3);
    assert_eq!(stub.batches()[0]["teams"].as_array().unwrap().len(), 3);

    let health = runner.monitor().snapshot();
    assert_eq!(health.consecutive_failures, 1);
    assert!(health.is_healthy);
    assert!(health.last_run_time.is_none());
}

#[tokio::test]
async fn accepted_rankings_cycle_succeeds() {
    let stub = spawn_stub(Reply::accepted()).await;
    let config = CollectorConfig::default().with_source_base_url(stub.base_url());
    let collector = RankingCollector::new(
        HttpConnector::new(&ConnectorConfig::default()).unwrap(),
        HtmlParser,
        HttpIngestionForwarder::new(&stub.api_url()).unwrap(),
        &config,
    )
    .unwrap();
    let runner = JobRunner::new(
        collector,
        SchedulePolicy::Adaptive(AdaptiveConfig::default()),
        RetryPolicy::default(),
    );
    let reporter = MockReporter::new();

    let outcome = runner.run_cycle(&reporter, false).await;

    assert_eq!(
        outcome,
        CycleOutcome::Completed {
            records: 3,
            attempts: 1
        }
    );
    assert_eq!(reporter.count("CycleSucceeded"), 1);
    assert!(runner.monitor().snapshot().last_run_time.is_some());
}
