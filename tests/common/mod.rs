//! Local mock of the sheet export, the IP service and the logging webhook
#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

pub const HEADER: &str = "company,link,country,sector,\"SASB industry \n(SICS® Industries)\",publication date,pages PDF,auditor,verified,e1,e2,e3,e4,e5,s1,s2,s3,s4,g1";

pub const ROWS: [&str; 4] = [
    " Acme Corp ,https://x/y,DE,Energy,Utilities,2025-02-01,42,KPMG,yes,3,0,,,,,,,,",
    "Beta AG,https://b/r,AT,Materials,Chemicals,2025-01-15,100,EY,yes,10,5,,,,1,,,,2",
    "Gamma SA,https://g/r,FR,Energy,Oil & Gas,2025-03-10,80,PwC,yes,,,,,,,,,,",
    "Hidden plc,https://h/r,UK,Energy,Utilities,2025-03-10,80,PwC,no,1,1,,,,,,,,",
];

pub const MOCK_IP: &str = "203.0.113.7";

/// Sheet export as Google serves it: two title lines, the header, then data.
pub fn export_csv() -> String {
    let mut text = String::from("SRN CSRD archive,,,\nnotes,,,\n");
    text.push_str(HEADER);
    text.push('\n');
    for row in ROWS {
        text.push_str(row);
        text.push('\n');
    }
    text
}

#[derive(Default)]
pub struct Recorded {
    pub ip_requests: AtomicUsize,
    pub events: Mutex<Vec<Value>>,
}

impl Recorded {
    pub fn ip_requests(&self) -> usize {
        self.ip_requests.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<Value> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

pub struct MockServer {
    pub base: String,
    pub recorded: Arc<Recorded>,
}

impl MockServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

async fn export() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/csv")], export_csv())
}

async fn login_page() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        "<html><body>Sign in</body></html>",
    )
}

async fn broken() -> impl IntoResponse {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn ip(State(recorded): State<Arc<Recorded>>) -> impl IntoResponse {
    recorded.ip_requests.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "ip": MOCK_IP }))
}

async fn broken_ip(State(recorded): State<Arc<Recorded>>) -> impl IntoResponse {
    recorded.ip_requests.fetch_add(1, Ordering::SeqCst);
    StatusCode::BAD_GATEWAY
}

async fn hook(State(recorded): State<Arc<Recorded>>, Json(event): Json<Value>) -> impl IntoResponse {
    if let Ok(mut events) = recorded.events.lock() {
        events.push(event);
    }
    StatusCode::OK
}

/// Start the mock on an ephemeral port.
pub async fn start() -> MockServer {
    let recorded = Arc::new(Recorded::default());
    let app = Router::new()
        .route("/export.csv", get(export))
        .route("/login", get(login_page))
        .route("/broken", get(broken))
        .route("/ip", get(ip))
        .route("/broken-ip", get(broken_ip))
        .route("/hook", post(hook))
        .route("/broken-hook", post(broken))
        .with_state(recorded.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockServer {
        base: format!("http://{}", addr),
        recorded,
    }
}
