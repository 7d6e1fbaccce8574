//! osc-web-bridge library crate.
//!
//! Relays Open Sound Control between a device on UDP and any number of
//! browser programs on WebSocket.
//!
//! ```text
//! Browser programs (JSON OSC over WebSocket)
//!         ↕
//! [osc-web-bridge]
//!   ├── domain/           RelayConfig, HandshakeState, Route
//!   ├── application/      Inbound filters, RelayService, RelayStats
//!   └── infrastructure/
//!         ├── ws_server/  Client registry, accept loop, Relay
//!         └── udp_conn/   Device socket and UDP reader
//!         ↕
//! OSC device (binary OSC over UDP)
//! ```
//!
//! Every datagram from the device goes through a [`UdpInboundFilter`]
//! strategy.  [`PassThrough`] gives a generic relay; [`SetupHandshake`] gives
//! the device relay that answers `/osc-setup`.  Browser packets always go
//! straight to the device.
//!
//! [`UdpInboundFilter`]: application::UdpInboundFilter
//! [`PassThrough`]: application::PassThrough
//! [`SetupHandshake`]: application::SetupHandshake

/// Domain layer: configuration and routing types (no I/O).
pub mod domain;

/// Application layer: filtering and relaying logic.
pub mod application;

/// Infrastructure layer: UDP socket, WebSocket server, relay runner.
pub mod infrastructure;
