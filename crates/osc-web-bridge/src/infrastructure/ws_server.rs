//! WebSocket server: client registry, accept loop and per-session tasks.
//!
//! This module is responsible for:
//!
//! 1. Binding the WebSocket listener and the device UDP socket ([`Relay::bind`]).
//! 2. Accepting browser connections and upgrading them to WebSocket sessions.
//! 3. Registering each session in the [`ClientRegistry`] under a fresh UUID.
//! 4. Running two tasks per session:
//!    - **reader**: JSON text frames from the browser → one datagram each to
//!      the device.
//!    - **writer**: drains the session's bounded queue of broadcast frames
//!      into the WebSocket.
//! 5. Running the UDP reader that feeds every broadcast.
//! 6. Stopping the accept loop and the UDP reader when `running` is cleared,
//!    then closing every browser session still open.
//!
//! The UDP reader never waits on a browser.  It queues each frame with
//! `try_send`; a client whose queue is full misses that frame and the drop is
//! counted in [`RelayStats`](crate::application::RelayStats).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::{
    BroadcastReport, BrowserBroadcaster, RelayService, RelayStatsSnapshot, SetupHandshake,
    UdpInboundFilter,
};
use crate::domain::RelayConfig;
use crate::infrastructure::udp_conn::{read_datagrams, DeviceSocket};

// ── Client registry ───────────────────────────────────────────────────────────

/// Connected WebSocket clients, each with a bounded outbound queue.
///
/// The map is locked only to insert, remove, count, or enqueue a broadcast;
/// the lock is never held across an `.await`.
pub struct ClientRegistry {
    clients: Mutex<HashMap<Uuid, mpsc::Sender<Arc<str>>>>,
    queue_capacity: usize,
}

impl ClientRegistry {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            // tokio's bounded channel needs room for at least one message
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Adds a client and returns its id plus the receiving end of its queue.
    pub fn register(&self) -> (Uuid, mpsc::Receiver<Arc<str>>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.lock().insert(id, tx);
        (id, rx)
    }

    /// Removes a client.  Its writer task drains what is already queued and
    /// then stops.  Returns `false` if `id` was not registered.
    pub fn remove(&self, id: &Uuid) -> bool {
        self.lock().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, mpsc::Sender<Arc<str>>>> {
        self.clients.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl BrowserBroadcaster for ClientRegistry {
    fn broadcast(&self, frame: Arc<str>) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for (id, tx) in self.lock().iter() {
            match tx.try_send(Arc::clone(&frame)) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("session {id}: outbound queue full; dropping frame");
                    report.dropped += 1;
                }
                // Session is shutting down and will remove itself.
                Err(TrySendError::Closed(_)) => {}
            }
        }
        report
    }
}

// ── Relay ─────────────────────────────────────────────────────────────────────

/// A bound relay: UDP socket, WebSocket listener, client registry and the
/// service joining them.
///
/// # Example
///
/// ```no_run
/// use std::sync::{atomic::AtomicBool, Arc};
/// use osc_web_bridge::application::PassThrough;
/// use osc_web_bridge::domain::RelayConfig;
/// use osc_web_bridge::infrastructure::Relay;
///
/// # async fn example() -> anyhow::Result<()> {
/// let relay = Relay::bind(RelayConfig::default(), Arc::new(PassThrough)).await?;
/// println!("browsers connect to ws://{}", relay.local_ws_addr());
/// relay.run(Arc::new(AtomicBool::new(true))).await?;
/// # Ok(())
/// # }
/// ```
pub struct Relay {
    listener: TcpListener,
    device: Arc<DeviceSocket>,
    registry: Arc<ClientRegistry>,
    service: Arc<RelayService>,
    udp_addr: SocketAddr,
    ws_addr: SocketAddr,
}

impl Relay {
    /// Binds both sockets and resolves the device address.
    ///
    /// # Errors
    ///
    /// Returns an error if the UDP socket or the WebSocket listener cannot be
    /// bound, or the device host cannot be resolved.
    pub async fn bind(
        config: RelayConfig,
        filter: Arc<dyn UdpInboundFilter>,
    ) -> anyhow::Result<Self> {
        let device = Arc::new(
            DeviceSocket::bind(config.udp_bind_addr, &config.device_host, config.device_port)
                .await?,
        );
        let udp_addr = device.local_addr().context("UDP socket has no local address")?;

        let listener = TcpListener::bind(config.ws_bind_addr)
            .await
            .with_context(|| {
                format!(
                    "failed to bind WebSocket listener on {}",
                    config.ws_bind_addr
                )
            })?;
        let ws_addr = listener
            .local_addr()
            .context("WebSocket listener has no local address")?;

        let registry = Arc::new(ClientRegistry::new(config.client_queue));
        let service = Arc::new(RelayService::new(
            filter,
            Arc::clone(&device) as _,
            Arc::clone(&registry) as _,
        ));

        info!("WebSocket relay listening on {ws_addr}");
        Ok(Self {
            listener,
            device,
            registry,
            service,
            udp_addr,
            ws_addr,
        })
    }

    /// Address the device should send to.
    pub fn local_udp_addr(&self) -> SocketAddr {
        self.udp_addr
    }

    /// Address browsers connect to.
    pub fn local_ws_addr(&self) -> SocketAddr {
        self.ws_addr
    }

    /// Resolved device address that browser packets and replies go to.
    pub fn device_addr(&self) -> SocketAddr {
        self.device.device_addr()
    }

    pub fn connected_clients(&self) -> usize {
        self.registry.len()
    }

    pub fn stats(&self) -> RelayStatsSnapshot {
        self.service.stats().snapshot()
    }

    /// Relays until `running` is set to `false`.
    ///
    /// Runs the UDP reader in its own task and the accept loop on this one.
    /// Both poll the flag every 200 ms.  Browser sessions still open when the
    /// flag clears are closed before this returns.
    pub async fn run(&self, running: Arc<AtomicBool>) -> anyhow::Result<()> {
        let udp_reader = tokio::spawn(read_datagrams(
            self.device.socket(),
            Arc::clone(&self.service),
            Arc::clone(&running),
        ));
        let mut sessions: Vec<JoinHandle<()>> = Vec::new();

        loop {
            if !running.load(Ordering::Relaxed) {
                info!("shutdown flag set; stopping accept loop");
                break;
            }

            sessions.retain(|session| !session.is_finished());

            match timeout(Duration::from_millis(200), self.listener.accept()).await {
                Ok(Ok((stream, peer_addr))) => {
                    debug!("new browser connection from {peer_addr}");
                    let registry = Arc::clone(&self.registry);
                    let service = Arc::clone(&self.service);
                    sessions.push(tokio::spawn(async move {
                        handle_browser_session(stream, peer_addr, registry, service).await;
                    }));
                }
                Ok(Err(e)) => {
                    error!("accept error: {e}");
                }
                Err(_) => {}
            }
        }

        if !sessions.is_empty() {
            info!("closing {} browser session(s)", sessions.len());
        }
        for session in &sessions {
            session.abort();
        }
        for session in sessions {
            // Cancelled is the expected outcome.
            let _ = session.await;
        }

        udp_reader.await.context("UDP reader task panicked")?;
        Ok(())
    }
}

/// Binds a device relay ([`SetupHandshake`] filter) from `config` and runs it
/// until `running` is cleared.
///
/// # Errors
///
/// Returns an error if any socket cannot be bound or the device host does not
/// resolve.
pub async fn run_server(config: RelayConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let relay = Relay::bind(config, Arc::new(SetupHandshake::new())).await?;
    relay.run(running).await?;

    let stats = relay.stats();
    info!(
        "relay stopped: {} datagram(s) in, {} broadcast(s), {} frame(s) dropped, \
         {} browser packet(s) out, {} decode error(s), {} send error(s)",
        stats.datagrams_received,
        stats.broadcasts,
        stats.frames_dropped,
        stats.datagrams_sent,
        stats.decode_errors,
        stats.send_errors
    );
    Ok(())
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Unregisters a session and stops its writer, whether the session ended on
/// its own or its task was aborted at shutdown.
struct SessionGuard {
    id: Uuid,
    registry: Arc<ClientRegistry>,
    writer: JoinHandle<()>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
        self.writer.abort();
        info!(
            "session {}: disconnected ({} client(s) remain)",
            self.id,
            self.registry.len()
        );
    }
}

async fn handle_browser_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    registry: Arc<ClientRegistry>,
    service: Arc<RelayService>,
) {
    match run_session(raw_stream, peer_addr, registry, service).await {
        Ok(()) => info!("session {peer_addr} closed normally"),
        Err(e) => warn!("session {peer_addr} closed with error: {e:#}"),
    }
}

async fn run_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    registry: Arc<ClientRegistry>,
    service: Arc<RelayService>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(raw_stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    let (id, mut outbound) = registry.register();
    info!(
        "session {id}: browser {peer_addr} connected ({} client(s))",
        registry.len()
    );

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    // ── Writer: broadcast queue → browser ─────────────────────────────────────
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if let Err(e) = ws_tx.send(WsMessage::Text(frame.to_string())).await {
                debug!("session {id}: WebSocket send failed: {e}");
                break;
            }
        }
        let _ = ws_tx.close().await;
    });
    let _guard = SessionGuard {
        id,
        registry: Arc::clone(&registry),
        writer,
    };

    // ── Reader: browser → device ──────────────────────────────────────────────
    loop {
        let ws_msg = match ws_rx.next().await {
            Some(Ok(msg)) => msg,
            Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) | None => {
                debug!("session {id}: browser stream ended");
                break;
            }
            Some(Err(e)) => {
                warn!("session {id}: browser WebSocket error: {e}");
                break;
            }
        };

        match ws_msg {
            WsMessage::Text(text) => {
                if let Err(e) = service.handle_browser_frame(&text).await {
                    warn!("session {id}: dropped browser frame: {e}");
                }
            }
            WsMessage::Binary(_) => {
                warn!("session {id}: unexpected binary WebSocket frame (ignored)");
            }
            WsMessage::Close(_) => {
                debug!("session {id}: WebSocket Close frame received");
                break;
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {}
        }
    }

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
