//! OSC-WebSocket bridge: entry point.
//!
//! Relays OSC between a device on UDP and browser programs on WebSocket,
//! answering the device's `/osc-setup` handshake along the way.
//!
//! # Usage
//!
//! ```text
//! osc-web-bridge [OPTIONS]
//!
//! Options:
//!   --config         <FILE>   TOML config file (replaces all other options)
//!   --local-address  <IP>     Local UDP bind address [default: 192.168.7.1]
//!   --local-port     <PORT>   Local UDP port [default: 7563]
//!   --remote-address <HOST>   Device host name or IP [default: bela.local]
//!   --remote-port    <PORT>   Device UDP port [default: 7562]
//!   --ws-bind        <IP>     WebSocket bind address [default: 0.0.0.0]
//!   --ws-port        <PORT>   WebSocket port [default: 8080]
//!   --client-queue   <N>      Frames buffered per browser [default: 256]
//! ```
//!
//! # Environment variable overrides
//!
//! CLI args take precedence when both are present.
//!
//! | Variable             | Default       |
//! |----------------------|---------------|
//! | `OSC_LOCAL_ADDRESS`  | `192.168.7.1` |
//! | `OSC_LOCAL_PORT`     | `7563`        |
//! | `OSC_REMOTE_ADDRESS` | `bela.local`  |
//! | `OSC_REMOTE_PORT`    | `7562`        |
//! | `OSC_WS_BIND`        | `0.0.0.0`     |
//! | `OSC_WS_PORT`        | `8080`        |
//! | `OSC_CLIENT_QUEUE`   | `256`         |
//! | `OSC_BRIDGE_CONFIG`  | (none)        |

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{ensure, Context};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use osc_web_bridge::domain::RelayConfig;
use osc_web_bridge::infrastructure::run_server;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// OSC-WebSocket bridge.
///
/// Relays OSC packets between a UDP device and browser WebSocket clients.
#[derive(Debug, Parser)]
#[command(
    name = "osc-web-bridge",
    about = "UDP-to-WebSocket relay for Open Sound Control devices",
    version
)]
struct Cli {
    /// TOML config file.  When given, the other options are ignored and
    /// absent keys take their defaults.
    #[arg(long, env = "OSC_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Local IP address the UDP socket binds to.
    ///
    /// With a Bela on Ethernet-over-USB this is the host side of the USB
    /// link, `192.168.7.1`.
    #[arg(long, default_value = "192.168.7.1", env = "OSC_LOCAL_ADDRESS")]
    local_address: String,

    /// Local UDP port; the device sends here.
    #[arg(long, default_value_t = 7563, env = "OSC_LOCAL_PORT")]
    local_port: u16,

    /// Host name or IP address of the device.
    #[arg(long, default_value = "bela.local", env = "OSC_REMOTE_ADDRESS")]
    remote_address: String,

    /// UDP port the device listens on.
    #[arg(long, default_value_t = 7562, env = "OSC_REMOTE_PORT")]
    remote_port: u16,

    /// IP address the WebSocket server binds to.
    #[arg(long, default_value = "0.0.0.0", env = "OSC_WS_BIND")]
    ws_bind: String,

    /// TCP port for the WebSocket server.
    #[arg(long, default_value_t = 8080, env = "OSC_WS_PORT")]
    ws_port: u16,

    /// Frames buffered per browser before frames for that browser are dropped.
    #[arg(long, default_value_t = 256, env = "OSC_CLIENT_QUEUE")]
    client_queue: usize,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`RelayConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded, `--local-address`
    /// or `--ws-bind` is not an IP address, or `--client-queue` is zero.
    fn into_relay_config(self) -> anyhow::Result<RelayConfig> {
        if let Some(path) = &self.config {
            return RelayConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()));
        }

        let local_ip: IpAddr = self
            .local_address
            .parse()
            .with_context(|| format!("invalid local UDP address: '{}'", self.local_address))?;
        let udp_bind_addr = SocketAddr::new(local_ip, self.local_port);

        let ws_ip: IpAddr = self
            .ws_bind
            .parse()
            .with_context(|| format!("invalid WebSocket bind address: '{}'", self.ws_bind))?;
        let ws_bind_addr = SocketAddr::new(ws_ip, self.ws_port);

        ensure!(self.client_queue > 0, "--client-queue must be at least 1");

        Ok(RelayConfig {
            udp_bind_addr,
            device_host: self.remote_address,
            device_port: self.remote_port,
            ws_bind_addr,
            client_queue: self.client_queue,
        })
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

    let config = Cli::parse().into_relay_config()?;

    info!(
        "OSC-WebSocket bridge starting: udp={}, device={}:{}, ws={}",
        config.udp_bind_addr, config.device_host, config.device_port, config.ws_bind_addr
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, running).await?;

    info!("OSC-WebSocket bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
