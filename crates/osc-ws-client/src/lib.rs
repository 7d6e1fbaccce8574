//! osc-ws-client library crate.
//!
//! A WebSocket client for programs that talk OSC to a device through the
//! OSC-WebSocket bridge instead of opening UDP sockets themselves.
//!
//! ```text
//! application ──send()──► OscWsClient ──JSON text frame──► bridge ──UDP──► device
//! application ◄─handler── OscWsClient ◄─JSON text frame─── bridge ◄─UDP─── device
//! ```
//!
//! # Example
//!
//! ```no_run
//! use osc_core::{OscArgument, OscMessage, OscPacket};
//! use osc_ws_client::{ClientConfig, OscWsClient};
//!
//! # async fn example() -> Result<(), osc_ws_client::ClientError> {
//! let client = OscWsClient::connect(ClientConfig::default(), |packet: OscPacket| {
//!     if packet.address() == Some("/bela/analogInputs/0") {
//!         println!("pressure: {:?}", packet.as_message().unwrap().args);
//!     }
//! })
//! .await?;
//!
//! client
//!     .send(&OscMessage::new("/bela/analogOutputs/0", vec![OscArgument::Float(0.5)]).into())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod handler;

pub use client::{ClientConfig, ClientError, OscWsClient};
pub use handler::{LoggingHandler, MessageHandler};
