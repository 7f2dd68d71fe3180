//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::collector::{CollectorEvent, CollectorReporter};
use crate::error::AppError;
use crate::models::{CollectionResult, IngestionAck, RankedTeam};
use crate::snapshot::{Node, Snapshot};
use crate::traits::{IngestionSink, SnapshotParser, SourceConnector};

// ---------------------------------------------------------------------------
// MockNode / MockSnapshot
// ---------------------------------------------------------------------------

/// Fake element whose lookups are keyed by the exact selector string.
///
/// `find` answers from registered children, `closest` from registered
/// ancestors, so a test registers exactly the selectors it expects the
/// extractor to ask for.
#[derive(Debug, Clone, Default)]
pub struct MockNode {
    attrs: HashMap<String, String>,
    text: String,
    classes: Vec<String>,
    html: String,
    children: HashMap<String, MockNode>,
    ancestors: HashMap<String, MockNode>,
}

impl MockNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn html(mut self, html: &str) -> Self {
        self.html = html.to_string();
        self
    }

    pub fn child(mut self, selector: &str, node: MockNode) -> Self {
        self.children.insert(selector.to_string(), node);
        self
    }

    pub fn ancestor(mut self, selector: &str, node: MockNode) -> Self {
        self.ancestors.insert(selector.to_string(), node);
        self
    }
}

impl Node for MockNode {
    fn find(&self, selector: &str) -> Option<Self> {
        self.children.get(selector).cloned()
    }

    fn closest(&self, selector: &str) -> Option<Self> {
        self.ancestors.get(selector).cloned()
    }

    fn attr(&self, name: &str) -> Option<String> {
        self.attrs.get(name).cloned()
    }

    fn text(&self) -> String {
        self.text.clone()
    }

    fn classes(&self) -> Vec<String> {
        self.classes.clone()
    }

    fn outer_html(&self) -> String {
        self.html.clone()
    }
}

/// Fake page mapping selectors to node lists.
#[derive(Debug, Clone, Default)]
pub struct MockSnapshot {
    nodes: HashMap<String, Vec<MockNode>>,
}

impl MockSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, selector: &str, nodes: Vec<MockNode>) -> Self {
        self.nodes.insert(selector.to_string(), nodes);
        self
    }
}

impl Snapshot for MockSnapshot {
    type Node<'a> = MockNode;

    fn select_all(&self, selector: &str) -> Vec<MockNode> {
        self.nodes.get(selector).cloned().unwrap_or_default()
    }
}

/// Parser that ignores the markup and always yields the same snapshot.
#[derive(Clone)]
pub struct MockParser {
    snapshot: Arc<MockSnapshot>,
}

impl MockParser {
    pub fn new(snapshot: MockSnapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
        }
    }
}

impl SnapshotParser for MockParser {
    type Snapshot = MockSnapshot;

    fn parse(&self, _html: &str) -> MockSnapshot {
        (*self.snapshot).clone()
    }
}

// ---------------------------------------------------------------------------
// MockConnector
// ---------------------------------------------------------------------------

/// Mock connector that returns queued responses, optionally after a delay.
#[derive(Clone)]
pub struct MockConnector {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns a default HTML string.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    fail_forever: bool,
    delay: Duration,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockConnector {
    pub fn new(html: &str) -> Self {
        Self::with_responses(vec![Ok(html.to_string())])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            fail_forever: false,
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Connector whose every call fails with a connection error.
    pub fn always_failing() -> Self {
        Self {
            fail_forever: true,
            ..Self::with_responses(Vec::new())
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl SourceConnector for MockConnector {
    async fn acquire(&self, url: &str) -> Result<String, AppError> {
        self.calls.lock().unwrap().push(url.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.fail_forever {
            return Err(AppError::ConnectionError("source unreachable".into()));
        }

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok("<html><body>default</body></html>".to_string())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockSink
// ---------------------------------------------------------------------------

/// Mock ingestion sink that records forwarded batches.
#[derive(Clone)]
pub struct MockSink {
    responses: Arc<Mutex<Vec<Result<IngestionAck, AppError>>>>,
    pub forwarded: Arc<Mutex<Vec<Vec<RankedTeam>>>>,
}

impl MockSink {
    /// Sink that acknowledges every batch.
    pub fn accepting() -> Self {
        Self::with_responses(Vec::new())
    }

    pub fn with_responses(responses: Vec<Result<IngestionAck, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            forwarded: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl IngestionSink for MockSink {
    async fn forward(&self, batch: &CollectionResult<RankedTeam>) -> Result<IngestionAck, AppError> {
        self.forwarded.lock().unwrap().push(batch.records.clone());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(IngestionAck {
                success: true,
                message: format!("Successfully received {} teams", batch.len()),
                timestamp: Some(batch.timestamp.to_rfc3339()),
            })
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock collector reporter that records event labels.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, label: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.as_str() == label)
            .count()
    }
}

impl CollectorReporter for MockReporter {
    fn report(&self, event: CollectorEvent<'_>) {
        let label = match &event {
            CollectorEvent::Started { .. } => "Started",
            CollectorEvent::CycleStarted { .. } => "CycleStarted",
            CollectorEvent::TriggerDropped { .. } => "TriggerDropped",
            CollectorEvent::AttemptFailed { .. } => "AttemptFailed",
            CollectorEvent::CycleSucceeded { .. } => "CycleSucceeded",
            CollectorEvent::CycleFailed { .. } => "CycleFailed",
            CollectorEvent::NextPoll { .. } => "NextPoll",
            CollectorEvent::HardReset { .. } => "HardReset",
            CollectorEvent::Stopped { .. } => "Stopped",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}
