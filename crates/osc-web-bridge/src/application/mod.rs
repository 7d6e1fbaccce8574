//! Application layer for osc-web-bridge.
//!
//! Knows *what* happens to each packet (decode, filter, re-encode, fan out)
//! but delegates the sockets to the infrastructure layer through the
//! [`DeviceSender`] and [`BrowserBroadcaster`] traits.

pub mod filter;
pub mod relay_service;

pub use filter::{PassThrough, SetupHandshake, UdpInboundFilter};
pub use relay_service::{
    BroadcastReport, BrowserBroadcaster, DeviceSender, RelayError, RelayService, RelayStats,
    RelayStatsSnapshot,
};
