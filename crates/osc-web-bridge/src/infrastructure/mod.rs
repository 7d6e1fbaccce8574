//! Infrastructure layer for osc-web-bridge.
//!
//! All I/O lives here: the UDP socket facing the device, the WebSocket
//! listener facing the browsers, per-session tasks, and the shutdown flag.

pub mod udp_conn;
pub mod ws_server;

pub use udp_conn::DeviceSocket;
pub use ws_server::{run_server, ClientRegistry, Relay};
