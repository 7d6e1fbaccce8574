//! # osc-core
//!
//! Shared library for the OSC-WebSocket bridge containing the OSC message
//! model, its two wire codecs, and the range mapper used to interpret sensor
//! values.
//!
//! It is used by both the relay (`osc-web-bridge`) and the WebSocket client
//! (`osc-ws-client`) and has no dependency on sockets or async runtimes.
//!
//! - **`protocol`** – The in-memory message model ([`OscPacket`],
//!   [`OscMessage`], [`OscBundle`], [`OscArgument`]) plus:
//!   - `json`: the JSON documents exchanged with browsers over WebSocket;
//!   - `codec`: OSC 1.0 binary datagrams exchanged with devices over UDP.
//!
//! - **`domain`** – `linlin` / `linexp` rescaling with boundary clamping.
//!
//! ```text
//! device ──UDP (OSC binary)──► decode_datagram ─► OscPacket ─► encode_json ──WS──► browser
//! device ◄─UDP (OSC binary)─── encode_datagram ◄─ OscPacket ◄─ decode_json ◄─WS─── browser
//! ```

pub mod domain;
pub mod protocol;

pub use domain::range::{linexp, linlin, RangeError, RangeMap};
pub use protocol::codec::{decode_datagram, encode_datagram, ProtocolError};
pub use protocol::json::{decode_json, encode_json};
pub use protocol::messages::{
    OscArgument, OscBundle, OscMessage, OscPacket, TimeTag, MAX_BUNDLE_DEPTH, SETUP_ADDRESS,
    SETUP_REPLY_ADDRESS,
};
