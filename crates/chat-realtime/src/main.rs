//! Terminal chat client entry point
//!
//! Run with:
//! ```bash
//! cargo run -p chat-realtime --bin chat-client
//! ```
//!
//! Configuration is loaded from environment variables. Every stdin line is
//! sent as a chat message; `/reconnect` forces a reconnect and `/quit` exits.

use anyhow::Context;
use chat_common::{try_init_tracing_with_config, ClientConfig, TracingConfig};
use chat_realtime::protocol::{ChatMessage, ServerError, UserEvent};
use chat_realtime::{
    room_url, ClientError, ConnectionHandle, ConnectionHandler, ConnectionManager,
    OutboundMessage, ReconnectConfig, TokioScheduler, WebSocketTransport,
};
use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

/// Prints room traffic to stdout
struct Printer;

impl ConnectionHandler for Printer {
    fn on_chat_message(&mut self, message: ChatMessage) {
        println!(
            "{} [{}] {}",
            Local::now().format("%H:%M:%S"),
            message.sender,
            message.message
        );
    }

    fn on_user_event(&mut self, event: UserEvent) {
        println!("* {}", event.message);
    }

    fn on_server_error(&mut self, error: ServerError) {
        println!("! {}", error.error);
    }

    fn on_connect(&mut self) {
        println!("-- connected");
    }

    fn on_disconnect(&mut self) {
        println!("-- disconnected, retrying");
    }

    fn on_error(&mut self, error: &ClientError) {
        warn!(code = error.code(), error = %error, "Connection error");
    }

    fn on_give_up(&mut self, attempts: u32) {
        println!("-- gave up after {attempts} attempts, type /reconnect to try again");
    }
}

#[tokio::main]
async fn main() {
    // Load configuration first so the log format can follow APP_ENV
    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run(config).await {
        error!(error = %e, "Chat client failed");
        std::process::exit(1);
    }
}

async fn run(config: ClientConfig) -> anyhow::Result<()> {
    let address = room_url(&config).context("Invalid room address")?;
    info!(
        env = ?config.app.env,
        room = %config.server.room,
        "Configuration loaded"
    );

    let manager = ConnectionManager::new(
        address,
        ReconnectConfig::from(&config.reconnect),
        WebSocketTransport::new(),
        TokioScheduler::new(),
        Printer,
    );
    let handle = ConnectionHandle::spawn(manager);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        match line {
            "" => {}
            "/quit" => break,
            "/reconnect" => handle.force_reconnect()?,
            text => {
                // Rejections are already reported through on_error
                if handle.send(OutboundMessage::chat(text)).await.is_err() {
                    println!("-- not connected ({}), message dropped", handle.state());
                }
            }
        }
    }

    handle.close().await;
    info!("Chat client stopped");
    Ok(())
}
