//! Domain layer for osc-web-bridge.
//!
//! Pure types with no I/O: the relay configuration, the device handshake
//! state and the routing decision for device packets.  Nothing here touches
//! `tokio`, sockets or the file system, apart from [`RelayConfig::load`]
//! reading a config file.

pub mod config;
pub mod handshake;
pub mod messages;

pub use config::{ConfigError, RelayConfig, RelayConfigFile};
pub use handshake::HandshakeState;
pub use messages::{is_setup_request, setup_reply, Route};
