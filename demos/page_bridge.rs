//! Stdio bridge acting as the hosting page.
//!
//! Demonstrates:
//! - Wiring a Relay over the real HTTP transport
//! - Answering the token request from the command line or environment
//! - Watching update batches and error notifications arrive
//!
//! Usage:
//!   cargo run --example page_bridge
//!   VK_ACCESS_TOKEN=... cargo run --example page_bridge
//!
//! Every line typed on stdin is forwarded to the relay verbatim, so a
//! token can be supplied by pasting:
//!   {"method":"onAccessTokenReceived","useraccesstoken":"..."}

// ============================================================================
// Imports
// ============================================================================

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use vk_longpoll_relay::{DEFAULT_API_BASE, Relay, SessionOptions};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    println!("=== page_bridge ===\n");

    let (to_relay, inbound) = mpsc::unbounded_channel::<String>();
    let (outbound, mut from_relay) = mpsc::unbounded_channel::<String>();

    let relay = Relay::over_http(DEFAULT_API_BASE, SessionOptions::default())?;
    let task = relay.spawn(inbound, outbound);

    // Environment shortcut: answer the token request immediately.
    if let Ok(token) = std::env::var("VK_ACCESS_TOKEN") {
        println!("[page] answering token request from VK_ACCESS_TOKEN");
        to_relay.send(format!(
            r#"{{"method":"onAccessTokenReceived","useraccesstoken":"{token}"}}"#
        ))?;
    } else {
        println!("[page] paste a token message, e.g.:");
        println!(r#"       {{"method":"onAccessTokenReceived","useraccesstoken":"..."}}"#);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            message = from_relay.recv() => match message {
                Some(text) => println!("[relay] {text}"),
                None => break,
            },

            line = lines.next_line() => match line? {
                Some(text) => {
                    if !text.trim().is_empty() {
                        to_relay.send(text)?;
                    }
                }
                // Stdin closed: the "page" navigated away.
                None => break,
            },
        }
    }

    drop(to_relay);
    task.await?;

    Ok(())
}
