//! aggflow WebSocket client — an interactive REPL talking to
//! `aggflow-server`'s `/ws` endpoint.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin aggflow-client -- --url ws://127.0.0.1:6380/ws
//! ```
//!
//! Type an FT.* command line and press enter; the reply is printed as
//! pretty JSON. `.quit` exits.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde::{Deserialize, Serialize};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser, Debug)]
#[command(name = "aggflow-client", about = "Interactive client for aggflow-server")]
struct Args {
    /// WebSocket URL of a running aggflow-server
    #[arg(long, default_value = "ws://127.0.0.1:6380/ws")]
    url: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsRequest {
    Command { line: String },
    Ping,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsResponse {
    Rows { doc_ids: Vec<u64>, total: usize },
    Error { name: String, message: String },
    Pong,
}

fn print_response(resp: &WsResponse) {
    match resp {
        WsResponse::Rows { doc_ids, total } => {
            println!("{total} result(s): {doc_ids:?}");
        }
        WsResponse::Error { name, message } => {
            println!("-{name} {message}");
        }
        WsResponse::Pong => println!("PONG"),
    }
}

fn to_request(line: &str) -> WsRequest {
    if line.eq_ignore_ascii_case(".ping") {
        WsRequest::Ping
    } else {
        WsRequest::Command { line: line.to_string() }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("aggflow client");
    println!("==============");
    println!("Connecting to {}", args.url);

    let (ws_stream, _) = connect_async(&args.url).await?;
    let (mut write, mut read) = ws_stream.split();
    println!("Connected. Type .help for usage, .quit to exit.\n");

    let mut editor = DefaultEditor::new()?;
    loop {
        let line = match editor.readline("aggflow> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(e) => {
                eprintln!("readline error: {e}");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        editor.add_history_entry(line).ok();

        if line == ".quit" || line == ".exit" {
            println!("Goodbye!");
            break;
        }
        if line == ".help" {
            println!("Type an FT.AGGREGATE/FT.SEARCH/_FT.DEBUG command line, or:");
            println!("  .ping   - send a keepalive ping");
            println!("  .quit   - exit");
            continue;
        }

        let request = to_request(line);
        let payload = serde_json::to_string(&request)?;
        write.send(Message::Text(payload)).await?;

        match read.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<WsResponse>(&text) {
                Ok(resp) => print_response(&resp),
                Err(e) => println!("could not parse server reply: {e}\nraw: {text}"),
            },
            Some(Ok(Message::Close(_))) | None => {
                println!("server closed the connection");
                break;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                eprintln!("websocket error: {e}");
                break;
            }
        }
    }

    Ok(())
}
