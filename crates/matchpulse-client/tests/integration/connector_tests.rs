use std::time::Duration;

use matchpulse_client::{HtmlParser, HttpConnector};
use matchpulse_core::collector::{Collect, MatchCollector};
use matchpulse_core::config::{CollectorConfig, ConnectorConfig};
use matchpulse_core::error::AppError;
use matchpulse_core::extract::MatchVariant;
use matchpulse_core::traits::SourceConnector;

use crate::integration::common::{Reply, closed_addr, spawn_stub};

#[tokio::test]
async fn http_connector_returns_page_with_configured_agent() {
    let stub = spawn_stub(Reply::accepted()).await;
    let config = ConnectorConfig::default().with_user_agent("matchpulse-test/1.0");
    let connector = HttpConnector::new(&config).unwrap();

    let html = connector
        .acquire(&format!("{}/matches", stub.base_url()))
        .await
        .unwrap();

    assert!(html.contains("match-wrapper"));
    assert_eq!(
        stub.user_agents.lock().unwrap().as_slice(),
        ["matchpulse-test/1.0"]
    );
}

#[tokio::test]
async fn http_connector_maps_bad_status_to_connection_error() {
    let stub = spawn_stub(Reply::accepted()).await;
    let connector = HttpConnector::new(&ConnectorConfig::default()).unwrap();

    let err = connector
        .acquire(&format!("{}/does-not-exist", stub.base_url()))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ConnectionError(ref m) if m.contains("404")));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn http_connector_unreachable_source_is_connection_error() {
    let addr = closed_addr().await;
    let config = ConnectorConfig::default().with_navigation_timeout(Duration::from_secs(5));
    let connector = HttpConnector::new(&config).unwrap();

    let err = connector
        .acquire(&format!("http://{addr}/matches"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::ConnectionError(_) | AppError::Timeout(_)
    ));
}

#[tokio::test]
async fn match_collector_runs_against_live_page() {
    let stub = spawn_stub(Reply::accepted()).await;
    let connector = HttpConnector::new(&ConnectorConfig::default()).unwrap();

    let all = CollectorConfig::default()
        .with_source_base_url(stub.base_url())
        .with_variant(MatchVariant::All);
    let collector = MatchCollector::new(connector.clone(), HtmlParser, chrono::Utc, &all).unwrap();
    let result = collector.collect().await.unwrap();
    assert_eq!(result.len(), 3);

    // Every fixture match is in the past or live, so nothing is imminent.
    let imminent = all.clone().with_variant(MatchVariant::Imminent);
    let collector = MatchCollector::new(connector, HtmlParser, chrono::Utc, &imminent).unwrap();
    assert!(collector.collect().await.unwrap().is_empty());
}
