//! aggflow WebSocket server.
//!
//! Accepts FT.* command lines over a `/ws` WebSocket connection, compiles
//! and runs them against a tiny seeded in-memory catalog (the same one
//! [`crate::main`]'s REPL uses), and replies with a tagged JSON message.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin aggflow-server -- --addr 127.0.0.1:6380
//! ```
//!
//! ## Protocol
//!
//! **Client → Server:**
//! - `{"type": "command", "line": "FT.AGGREGATE catalog * GROUPBY 1 @category REDUCE COUNT 0 AS n"}`
//! - `{"type": "ping"}`
//!
//! **Server → Client:**
//! - `{"type": "rows", "doc_ids": [...], "total": N}`
//! - `{"type": "error", "name": "...", "message": "..."}`
//! - `{"type": "pong"}`

use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;

use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Extension;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{info, warn};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use aggflow::commands;
use aggflow::iterators::QueryIterator;
use aggflow::pipeline::loader::DocStore;
use aggflow::pipeline::scorer::PassThroughScore;
use aggflow::pipeline::RpStatus;
use aggflow::plan::{compile, CompileInputs};
use aggflow::value::RSValue;
use aggflow::{Config, ConfigHandle};

const DEFAULT_ADDR: &str = "127.0.0.1:6380";

/// Per-IP connection-rate guard: at most `max_per_minute` new WebSocket
/// connections per source IP, in a one-minute sliding window.
#[derive(Clone)]
struct IpRateLimiter {
    windows: std::sync::Arc<dashmap::DashMap<std::net::IpAddr, (std::time::Instant, u32)>>,
    max_per_minute: u32,
}

impl IpRateLimiter {
    fn new(max_per_minute: u32) -> Self {
        IpRateLimiter { windows: std::sync::Arc::new(dashmap::DashMap::new()), max_per_minute }
    }

    fn allow(&self, ip: std::net::IpAddr) -> bool {
        if self.max_per_minute == 0 {
            return true;
        }
        let now = std::time::Instant::now();
        let mut entry = self.windows.entry(ip).or_insert((now, 0));
        let (window_start, count) = entry.value_mut();
        if now.duration_since(*window_start).as_secs() >= 60 {
            *window_start = now;
            *count = 0;
        }
        *count += 1;
        *count <= self.max_per_minute
    }
}

/// Incoming message from a connected client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsRequest {
    Command { line: String },
    Ping,
}

/// Outgoing message to a connected client.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsResponse {
    Rows { doc_ids: Vec<u64>, total: usize },
    Error { name: String, message: String },
    Pong,
}

/// Five documents with `category`/`price` fields; mirrors the REPL's demo
/// catalog so both binaries exercise the same scenarios.
struct DemoCatalog {
    fields: HashMap<u64, HashMap<&'static str, RSValue>>,
}

impl DemoCatalog {
    fn new() -> Self {
        let mut fields = HashMap::new();
        let rows: [(u64, &str, f64); 5] = [
            (1, "electronics", 199.0),
            (2, "electronics", 49.0),
            (3, "books", 15.0),
            (4, "books", 22.0),
            (5, "garden", 60.0),
        ];
        for (id, category, price) in rows {
            let mut row = HashMap::new();
            row.insert("category", RSValue::string(category.to_string()));
            row.insert("price", RSValue::Number(price));
            fields.insert(id, row);
        }
        DemoCatalog { fields }
    }

    fn ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.fields.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl DocStore for DemoCatalog {
    fn load(&self, doc_id: u64, field: &str) -> Option<RSValue> {
        self.fields.get(&doc_id).and_then(|row| row.get(field)).cloned()
    }
}

fn error_response(err: &aggflow::AggError) -> WsResponse {
    WsResponse::Error { name: commands::error_name(err).to_string(), message: err.to_string() }
}

fn run_aggregate(tokens: &[String]) -> WsResponse {
    let request = match commands::parse_aggregate(tokens) {
        Ok(r) => r,
        Err(e) => return error_response(&e),
    };
    let catalog = DemoCatalog::new();
    let inputs = CompileInputs {
        index: QueryIterator::IdList { ids: catalog.ids(), pos: 0 },
        scorer: Box::new(PassThroughScore),
        doc_store: Box::new(catalog),
    };
    let mut pipeline = match compile(&request.plan, inputs) {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };
    let mut doc_ids = Vec::new();
    loop {
        match pipeline.next() {
            Ok((RpStatus::Ok, Some(result))) => doc_ids.push(result.doc_id),
            Ok((RpStatus::Ok, None)) => continue,
            Ok((RpStatus::Eof, _)) => break,
            Ok(_) => break,
            Err(e) => return error_response(&e),
        }
    }
    let total = doc_ids.len();
    WsResponse::Rows { doc_ids, total }
}

/// Parses the command line and dispatches it. `FT.AGGREGATE` runs end to
/// end against the demo catalog; other command kinds parse for validation
/// but stop there — executing SEARCH/HYBRID/CURSOR needs the network and
/// cursor-registry wiring a real index brings, which this demo server
/// doesn't have.
fn run_command(line: &str) -> WsResponse {
    let tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();
    let Some(head) = tokens.first().cloned() else {
        return WsResponse::Error { name: "SYNTAX".into(), message: "empty command".into() };
    };
    match head.to_ascii_uppercase().as_str() {
        "FT.AGGREGATE" => run_aggregate(&tokens[1..]),
        "FT.SEARCH" => match commands::parse_search(&tokens[1..]) {
            Ok(req) => {
                info!(index = %req.index, "FT.SEARCH parsed; no index backing to run it against");
                WsResponse::Rows { doc_ids: Vec::new(), total: 0 }
            }
            Err(e) => error_response(&e),
        },
        other => WsResponse::Error {
            name: "UNKNOWN_COMMAND".into(),
            message: format!("unrecognized command: {other}"),
        },
    }
}

async fn handle_socket(mut socket: WebSocket) {
    let connection_id = uuid::Uuid::new_v4();
    info!(%connection_id, connected_at = %chrono::Utc::now(), "client connected");
    while let Some(Ok(msg)) = socket.next().await {
        let reply = match msg {
            Message::Text(text) => match serde_json::from_str::<WsRequest>(&text) {
                Ok(WsRequest::Ping) => WsResponse::Pong,
                Ok(WsRequest::Command { line }) => run_command(&line),
                Err(e) => WsResponse::Error { name: "SYNTAX".into(), message: e.to_string() },
            },
            Message::Close(_) => break,
            _ => continue,
        };
        let payload = serde_json::to_string(&reply).unwrap_or_else(|_| "{}".to_string());
        if socket.send(Message::Text(payload)).await.is_err() {
            warn!(%connection_id, "client disconnected mid-reply");
            break;
        }
    }
    info!(%connection_id, "connection closed");
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(limiter): Extension<IpRateLimiter>,
) -> impl IntoResponse {
    if !limiter.allow(addr.ip()) {
        warn!(ip = %addr.ip(), "connection rate limit exceeded, rejecting upgrade");
        return axum::http::StatusCode::TOO_MANY_REQUESTS.into_response();
    }
    ws.on_upgrade(handle_socket).into_response()
}

fn get_arg(args: &[String], name: &str) -> Option<String> {
    args.iter().position(|a| a == name).and_then(|i| args.get(i + 1)).cloned()
}

#[tokio::main]
async fn main() {
    let file_appender = tracing_appender::rolling::daily("logs", "aggflow-server.log");
    let (non_blocking, _log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(non_blocking.and(std::io::stdout))
        .init();

    let args: Vec<String> = env::args().collect();
    let addr: SocketAddr = get_arg(&args, "--addr")
        .unwrap_or_else(|| DEFAULT_ADDR.to_string())
        .parse()
        .expect("--addr must be a valid socket address");

    let config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "no config.toml found, using defaults");
        Config::default()
    });
    let available_cpus = num_cpus::get();
    info!(
        default_timeout_ms = config.execution.default_timeout_ms,
        available_cpus, "aggflow-server starting"
    );
    let config_handle = ConfigHandle::new(config);

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(|| async { "ok" }))
        .layer(Extension(config_handle))
        .layer(Extension(IpRateLimiter::new(600)))
        .layer(RequestBodyLimitLayer::new(1 << 20))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any));

    let listener = tokio::net::TcpListener::bind(addr).await.expect("bind failed");
    info!(%addr, "listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("server error");
}
