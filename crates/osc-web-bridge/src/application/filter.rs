//! UDP inbound filters: the strategy that decides what happens to each
//! packet the device sends.
//!
//! The relay itself is generic.  [`PassThrough`] makes it a plain
//! device-to-browser relay; [`SetupHandshake`] adds the Bela setup exchange
//! on top.  Each filter instance owns its own state, so two relays running in
//! one process never share a handshake.

use std::sync::atomic::{AtomicBool, Ordering};

use osc_core::OscPacket;
use tracing::{debug, info};

use crate::domain::{is_setup_request, setup_reply, HandshakeState, Route};

/// Decides the [`Route`] for one decoded UDP packet.
///
/// Called from the single UDP reader task, in datagram arrival order.
pub trait UdpInboundFilter: Send + Sync {
    fn route(&self, packet: OscPacket) -> Route;
}

/// Broadcasts every packet unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl UdpInboundFilter for PassThrough {
    fn route(&self, packet: OscPacket) -> Route {
        Route::Broadcast(packet)
    }
}

/// Answers `/osc-setup` with `/osc-setup-reply` and broadcasts everything else.
///
/// Every setup request is answered, including repeats after the handshake is
/// established.  Setup requests are never broadcast.
#[derive(Debug, Default)]
pub struct SetupHandshake {
    established: AtomicBool,
}

impl SetupHandshake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current handshake state.
    pub fn state(&self) -> HandshakeState {
        if self.established.load(Ordering::Acquire) {
            HandshakeState::Established
        } else {
            HandshakeState::AwaitingSetup
        }
    }
}

impl UdpInboundFilter for SetupHandshake {
    fn route(&self, packet: OscPacket) -> Route {
        if !is_setup_request(&packet) {
            return Route::Broadcast(packet);
        }
        if self.established.swap(true, Ordering::AcqRel) {
            debug!("repeated /osc-setup from device; replying again");
        } else {
            info!("device handshake established");
        }
        Route::ReplyToDevice(setup_reply())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
