//! Inbound-message handler slot for [`OscWsClient`](crate::OscWsClient).
//!
//! A client has exactly one handler at a time.  It is injected at
//! construction and can be swapped with
//! [`OscWsClient::set_handler`](crate::OscWsClient::set_handler); the most
//! recent assignment wins and there is nothing to unsubscribe.
//!
//! Handlers run on the client's reader task, so they must be `Send + Sync`
//! and should return quickly.

use osc_core::OscPacket;
use tracing::{info, warn};

use crate::client::ClientError;

/// Receives every packet decoded from the WebSocket.
pub trait MessageHandler: Send + Sync {
    /// Called once per successfully decoded inbound frame, in arrival order.
    fn on_message(&self, packet: OscPacket);

    /// Called when an inbound frame cannot be decoded.  The frame is dropped
    /// either way; the default only logs it.
    fn on_error(&self, error: &ClientError) {
        warn!("osc-ws-client: dropped inbound frame: {error}");
    }
}

impl<F> MessageHandler for F
where
    F: Fn(OscPacket) + Send + Sync,
{
    fn on_message(&self, packet: OscPacket) {
        self(packet)
    }
}

/// Logs every inbound packet at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl MessageHandler for LoggingHandler {
    fn on_message(&self, packet: OscPacket) {
        match &packet {
            OscPacket::Message(m) => info!("{} {:?}", m.address, m.args),
            OscPacket::Bundle(b) => info!(
                "bundle @ {:?} with {} element(s)",
                b.time_tag,
                b.elements.len()
            ),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
