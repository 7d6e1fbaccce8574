//! RelayService: moves packets between the device and the browsers.
//!
//! Two directions, one call each:
//!
//! ```text
//! device → browsers:  handle_datagram()      OSC binary → filter → JSON → broadcast
//! browsers → device:  handle_browser_frame() JSON → OSC binary → one datagram
//! ```
//!
//! The service depends only on the [`DeviceSender`] and [`BrowserBroadcaster`]
//! traits.  The UDP socket and the WebSocket client registry implement them in
//! the infrastructure layer; tests inject recording doubles.
//!
//! Failures are per message.  A call that fails returns a [`RelayError`] and
//! bumps a counter in [`RelayStats`]; the caller logs it and moves on to the
//! next packet.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use osc_core::{decode_datagram, decode_json, encode_datagram, encode_json, ProtocolError};
use thiserror::Error;
use tracing::debug;

use crate::application::filter::UdpInboundFilter;
use crate::domain::Route;

/// Error type for one relayed packet.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The packet could not be decoded from, or encoded to, a wire form.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Writing the datagram to the device failed.
    #[error("failed to send datagram to device: {0}")]
    DeviceSend(#[source] io::Error),
}

/// Sends encoded OSC datagrams to the configured device address.
#[async_trait]
pub trait DeviceSender: Send + Sync {
    async fn send_datagram(&self, bytes: &[u8]) -> io::Result<()>;
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Clients the frame was queued for.
    pub delivered: usize,
    /// Clients whose queue was full; they miss this frame.
    pub dropped: usize,
}

/// Fans one JSON text frame out to every connected WebSocket client.
///
/// Must not block: implementations queue the frame per client and return.
pub trait BrowserBroadcaster: Send + Sync {
    fn broadcast(&self, frame: Arc<str>) -> BroadcastReport;
}

// ── Stats ─────────────────────────────────────────────────────────────────────

/// Running counters for one relay.
#[derive(Debug, Default)]
pub struct RelayStats {
    datagrams_received: AtomicU64,
    frames_received: AtomicU64,
    broadcasts: AtomicU64,
    frames_queued: AtomicU64,
    frames_dropped: AtomicU64,
    replies_sent: AtomicU64,
    datagrams_sent: AtomicU64,
    filtered: AtomicU64,
    decode_errors: AtomicU64,
    send_errors: AtomicU64,
}

/// Point-in-time copy of [`RelayStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStatsSnapshot {
    /// Datagrams read from the UDP socket.
    pub datagrams_received: u64,
    /// Text frames read from WebSocket clients.
    pub frames_received: u64,
    /// Device packets broadcast to the browsers.
    pub broadcasts: u64,
    /// Per-client frames queued by those broadcasts.
    pub frames_queued: u64,
    /// Per-client frames dropped because the client's queue was full.
    pub frames_dropped: u64,
    /// Replies the filter sent back to the device.
    pub replies_sent: u64,
    /// Browser packets forwarded to the device.
    pub datagrams_sent: u64,
    /// Device packets the filter discarded.
    pub filtered: u64,
    /// Packets that failed to decode, or to re-encode for the other side.
    pub decode_errors: u64,
    /// Datagrams the socket failed to send.
    pub send_errors: u64,
}

impl RelayStats {
    pub fn snapshot(&self) -> RelayStatsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        RelayStatsSnapshot {
            datagrams_received: get(&self.datagrams_received),
            frames_received: get(&self.frames_received),
            broadcasts: get(&self.broadcasts),
            frames_queued: get(&self.frames_queued),
            frames_dropped: get(&self.frames_dropped),
            replies_sent: get(&self.replies_sent),
            datagrams_sent: get(&self.datagrams_sent),
            filtered: get(&self.filtered),
            decode_errors: get(&self.decode_errors),
            send_errors: get(&self.send_errors),
        }
    }
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

// ── Service ───────────────────────────────────────────────────────────────────

/// Relays packets in both directions using an injected filter, device sender
/// and broadcaster.
pub struct RelayService {
    filter: Arc<dyn UdpInboundFilter>,
    device: Arc<dyn DeviceSender>,
    browsers: Arc<dyn BrowserBroadcaster>,
    stats: Arc<RelayStats>,
}

impl RelayService {
    pub fn new(
        filter: Arc<dyn UdpInboundFilter>,
        device: Arc<dyn DeviceSender>,
        browsers: Arc<dyn BrowserBroadcaster>,
    ) -> Self {
        Self {
            filter,
            device,
            browsers,
            stats: Arc::new(RelayStats::default()),
        }
    }

    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    /// Handles one datagram from the device.
    ///
    /// # Errors
    ///
    /// - [`RelayError::Protocol`] if the datagram is not valid OSC, holds an
    ///   unsupported argument type, or cannot be expressed as JSON.
    /// - [`RelayError::DeviceSend`] if a filter reply could not be sent.
    pub async fn handle_datagram(&self, bytes: &[u8]) -> Result<Route, RelayError> {
        bump(&self.stats.datagrams_received, 1);

        let packet = decode_datagram(bytes).map_err(|e| {
            bump(&self.stats.decode_errors, 1);
            e
        })?;

        let route = self.filter.route(packet);
        match &route {
            Route::Broadcast(packet) => {
                let frame: Arc<str> = encode_json(packet)
                    .map_err(|e| {
                        bump(&self.stats.decode_errors, 1);
                        e
                    })?
                    .into();
                let report = self.browsers.broadcast(frame);
                bump(&self.stats.broadcasts, 1);
                bump(&self.stats.frames_queued, report.delivered as u64);
                bump(&self.stats.frames_dropped, report.dropped as u64);
                debug!(
                    "device → browsers: {:?} to {} client(s)",
                    packet.address(),
                    report.delivered
                );
            }
            Route::ReplyToDevice(reply) => {
                let bytes = encode_datagram(reply)?;
                self.send_to_device(&bytes).await?;
                bump(&self.stats.replies_sent, 1);
                debug!("device ← relay: {:?}", reply.address());
            }
            Route::Drop => bump(&self.stats.filtered, 1),
        }
        Ok(route)
    }

    /// Handles one JSON text frame from a browser: re-encodes it as binary
    /// OSC and sends it to the device.  No filtering applies in this direction.
    ///
    /// # Errors
    ///
    /// - [`RelayError::Protocol`] if the frame is not a valid JSON packet.
    /// - [`RelayError::DeviceSend`] if the datagram could not be sent.
    pub async fn handle_browser_frame(&self, text: &str) -> Result<(), RelayError> {
        bump(&self.stats.frames_received, 1);

        let bytes = decode_json(text)
            .and_then(|packet| encode_datagram(&packet))
            .map_err(|e| {
                bump(&self.stats.decode_errors, 1);
                e
            })?;

        self.send_to_device(&bytes).await?;
        bump(&self.stats.datagrams_sent, 1);
        Ok(())
    }

    async fn send_to_device(&self, bytes: &[u8]) -> Result<(), RelayError> {
        self.device.send_datagram(bytes).await.map_err(|e| {
            bump(&self.stats.send_errors, 1);
            RelayError::DeviceSend(e)
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
