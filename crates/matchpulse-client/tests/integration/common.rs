use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{get, post};
use serde_json::Value;

pub const MATCHES_HTML: &str = include_str!("../fixtures/matches.html");
pub const RANKINGS_HTML: &str = include_str!("../fixtures/rankings.html");

/// Canned reply the stub ingestion endpoint sends back.
#[derive(Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: String,
}

impl Reply {
    pub fn accepted() -> Self {
        Self::new(
            StatusCode::OK,
            r#"{"success":true,"message":"Successfully received 3 teams","timestamp":"2024-05-11T12:00:00.000Z"}"#,
        )
    }

    pub fn new(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

#[derive(Clone)]
struct StubState {
    reply: Reply,
    received: Arc<Mutex<Vec<Value>>>,
    user_agents: Arc<Mutex<Vec<String>>>,
}

/// In-process stand-in for both the source site and the ingestion boundary.
pub struct Stub {
    pub addr: SocketAddr,
    pub received: Arc<Mutex<Vec<Value>>>,
    pub user_agents: Arc<Mutex<Vec<String>>>,
}

impl Stub {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn batches(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }
}

pub async fn spawn_stub(reply: Reply) -> Stub {
    let state = StubState {
        reply,
        received: Arc::new(Mutex::new(Vec::new())),
        user_agents: Arc::new(Mutex::new(Vec::new())),
    };
    let received = state.received.clone();
    let user_agents = state.user_agents.clone();

    let app = Router::new()
        .route("/matches", get(matches_page))
        .route("/ranking/teams", get(rankings_page))
        .route("/api/teams", post(ingest))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Stub {
        addr,
        received,
        user_agents,
    }
}

/// An address nothing is listening on.
pub async fn closed_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

fn record_agent(state: &StubState, headers: &HeaderMap) {
    if let Some(ua) = headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok()) {
        state.user_agents.lock().unwrap().push(ua.to_string());
    }
}

async fn matches_page(State(state): State<StubState>, headers: HeaderMap) -> axum::response::Html<&'static str> {
    record_agent(&state, &headers);
    axum::response::Html(MATCHES_HTML)
}

async fn rankings_page(State(state): State<StubState>, headers: HeaderMap) -> axum::response::Html<&'static str> {
    record_agent(&state, &headers);
    axum::response::Html(RANKINGS_HTML)
}

async fn ingest(State(state): State<StubState>, body: String) -> (StatusCode, String) {
    let value = serde_json::from_str(&body).unwrap_or(Value::Null);
    state.received.lock().unwrap().push(value);
    (state.reply.status, state.reply.body.clone())
}
