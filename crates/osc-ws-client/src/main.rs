//! OSC-WebSocket monitor: entry point.
//!
//! Connects to a running bridge, logs every OSC packet the device sends, and
//! optionally sends one or more JSON packets to the device on startup.
//!
//! # Usage
//!
//! ```text
//! osc-ws-client [OPTIONS]
//!
//! Options:
//!   --host <HOST>   Bridge hostname or IP [default: 127.0.0.1]
//!   --port <PORT>   Bridge WebSocket port [default: 8080]
//!   --send <JSON>   Packet to send after connecting (repeatable)
//! ```
//!
//! ```text
//! osc-ws-client --send '{"address":"/bela/analogOutputs/0","args":[{"type":"float","value":0.5}]}'
//! ```
//!
//! Runs until Ctrl+C or until the bridge closes the connection.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use osc_core::decode_json;
use osc_ws_client::{ClientConfig, LoggingHandler, OscWsClient};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Monitor and poke an OSC device through the OSC-WebSocket bridge.
#[derive(Debug, Parser)]
#[command(
    name = "osc-ws-client",
    about = "WebSocket client for the OSC-WebSocket bridge",
    version
)]
struct Cli {
    /// Hostname or IP address of the bridge.
    #[arg(long, default_value = "127.0.0.1", env = "OSC_WS_HOST")]
    host: String,

    /// WebSocket port of the bridge.
    #[arg(long, default_value_t = 8080, env = "OSC_WS_PORT")]
    port: u16,

    /// JSON packet to send once connected.  May be given more than once;
    /// packets are sent in order.
    #[arg(long = "send", value_name = "JSON")]
    send: Vec<String>,
}

impl Cli {
    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            host: self.host.clone(),
            port: self.port,
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Reject bad --send payloads before touching the network.
    let outbound = cli
        .send
        .iter()
        .map(|text| decode_json(text).with_context(|| format!("invalid --send packet: {text}")))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let client = OscWsClient::connect(cli.client_config(), LoggingHandler).await?;

    for packet in &outbound {
        client
            .send(packet)
            .await
            .with_context(|| format!("failed to send {:?}", packet.address()))?;
    }
    if !outbound.is_empty() {
        info!("sent {} packet(s) to {}", outbound.len(), client.url());
    }

    let mut poll = tokio::time::interval(Duration::from_millis(200));
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for Ctrl+C")?;
                info!("received Ctrl+C, closing");
                client.close().await?;
                break;
            }
            _ = poll.tick() => {
                if !client.is_connected().await {
                    info!("bridge closed the connection");
                    break;
                }
            }
        }
    }

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
