//! UDP socket facing the OSC device.
//!
//! One socket is bound on the configured local address.  It receives every
//! datagram the device sends (from any source address) and sends browser
//! packets and handshake replies to the configured device address, which is
//! resolved once at startup.

use std::io;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use tokio::net::{lookup_host, UdpSocket};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::application::{DeviceSender, RelayService};

/// Largest payload a UDP datagram can carry.
const MAX_DATAGRAM: usize = 65_536;

/// How often the reader wakes up to check the shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// The relay's UDP socket plus the resolved device address.
pub struct DeviceSocket {
    socket: Arc<UdpSocket>,
    device_addr: SocketAddr,
}

impl DeviceSocket {
    /// Binds `bind_addr` and resolves `device_host:device_port`.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound (address not assigned
    /// to this machine, port in use) or the device host does not resolve.
    pub async fn bind(
        bind_addr: SocketAddr,
        device_host: &str,
        device_port: u16,
    ) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(bind_addr)
            .await
            .with_context(|| format!("failed to bind UDP socket on {bind_addr}"))?;
        let device_addr = resolve_device(device_host, device_port, bind_addr).await?;

        info!("UDP socket bound on {bind_addr}; device at {device_addr}");
        Ok(Self {
            socket: Arc::new(socket),
            device_addr,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn device_addr(&self) -> SocketAddr {
        self.device_addr
    }

    /// Shared handle for the reader task.
    pub fn socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }
}

#[async_trait]
impl DeviceSender for DeviceSocket {
    async fn send_datagram(&self, bytes: &[u8]) -> io::Result<()> {
        self.socket.send_to(bytes, self.device_addr).await?;
        Ok(())
    }
}

/// Resolves the device host, preferring an address of the same family as
/// the local socket.
async fn resolve_device(host: &str, port: u16, local: SocketAddr) -> anyhow::Result<SocketAddr> {
    let candidates: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .with_context(|| format!("failed to resolve device address {host}:{port}"))?
        .collect();

    candidates
        .iter()
        .find(|addr| addr.is_ipv4() == local.is_ipv4())
        .or_else(|| candidates.first())
        .copied()
        .ok_or_else(|| anyhow!("device address {host}:{port} resolved to nothing"))
}

// ── Reader loop ───────────────────────────────────────────────────────────────

/// Reads datagrams until `running` is cleared and hands each one to `service`.
///
/// A datagram that fails to relay is logged and skipped; the loop only ends on
/// shutdown.
pub async fn read_datagrams(
    socket: Arc<UdpSocket>,
    service: Arc<RelayService>,
    running: Arc<AtomicBool>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM];

    while running.load(Ordering::Relaxed) {
        match timeout(POLL_INTERVAL, socket.recv_from(&mut buf)).await {
            Ok(Ok((n, peer))) => {
                if let Err(e) = service.handle_datagram(&buf[..n]).await {
                    warn!("udp {peer}: dropped datagram ({n} bytes): {e}");
                }
            }
            Ok(Err(e)) => {
                // ICMP port-unreachable from an earlier send surfaces here on
                // some platforms.
                warn!("udp receive error: {e}");
            }
            Err(_) => {}
        }
    }

    debug!("UDP reader stopped");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
