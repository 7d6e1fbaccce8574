//! Routing decisions for packets arriving from the device.

use osc_core::{OscMessage, OscPacket, SETUP_ADDRESS, SETUP_REPLY_ADDRESS};

/// What the relay does with one decoded UDP packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Forward to every connected WebSocket client.
    Broadcast(OscPacket),
    /// Send back to the device instead of the browsers.
    ReplyToDevice(OscPacket),
    /// Discard.
    Drop,
}

/// `true` for a top-level message addressed to `/osc-setup`.  Bundles are
/// never setup requests, whatever they contain.
pub fn is_setup_request(packet: &OscPacket) -> bool {
    packet.address() == Some(SETUP_ADDRESS)
}

/// The argument-less `/osc-setup-reply` message.
pub fn setup_reply() -> OscPacket {
    OscMessage::empty(SETUP_REPLY_ADDRESS).into()
}
