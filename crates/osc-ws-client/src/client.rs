//! A single duplex OSC channel over one WebSocket connection.
//!
//! # Lifecycle
//!
//! [`OscWsClient::connect`] opens the WebSocket and spawns a reader task.
//! The write half is kept in an `Option` behind an async mutex: it is `Some`
//! while the connection is open and becomes `None` once the server closes the
//! connection, a read fails, or [`OscWsClient::close`] is called.  From then on
//! [`OscWsClient::send`] fails with [`ClientError::NotConnected`]; nothing is
//! queued for later delivery.
//!
//! # Inbound frames
//!
//! Each text frame is decoded with [`osc_core::decode_json`].  Decoded packets
//! go to [`MessageHandler::on_message`]; frames that fail to decode (or binary
//! frames) go to [`MessageHandler::on_error`] and are dropped.

use std::sync::{Arc, RwLock};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use osc_core::{decode_json, encode_json, OscPacket, ProtocolError};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::handler::MessageHandler;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;
type SharedHandler = Arc<RwLock<Arc<dyn MessageHandler>>>;

/// Errors surfaced by the WebSocket OSC client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The WebSocket connection could not be opened.
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: WsError,
    },

    /// `send` was called while the socket is not open.
    #[error("WebSocket is not connected")]
    NotConnected,

    /// A packet could not be encoded, or an inbound frame could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The server sent a frame the JSON protocol does not use.
    #[error("unexpected {0} frame")]
    UnexpectedFrame(&'static str),

    /// Writing a frame to the socket failed.
    #[error("failed to send frame: {0}")]
    SendFailed(#[source] WsError),
}

/// Where the client connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Host name or IP of the bridge.
    pub host: String,
    /// WebSocket port of the bridge.
    pub port: u16,
}

impl Default for ClientConfig {
    /// `127.0.0.1:8080`, the bridge's default WebSocket port on the same host.
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ClientConfig {
    /// The `ws://` URL for this configuration.
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

/// One WebSocket connection carrying JSON-encoded OSC packets.
pub struct OscWsClient {
    url: String,
    sink: Arc<Mutex<Option<WsSink>>>,
    handler: SharedHandler,
    reader: JoinHandle<()>,
}

impl OscWsClient {
    /// Opens the WebSocket and starts delivering inbound packets to `handler`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Connect`] if the TCP connection or the WebSocket
    /// handshake fails.
    pub async fn connect(
        config: ClientConfig,
        handler: impl MessageHandler + 'static,
    ) -> Result<Self, ClientError> {
        let url = config.url();
        let (ws_stream, _response) =
            connect_async(url.as_str())
                .await
                .map_err(|source| ClientError::Connect {
                    url: url.clone(),
                    source,
                })?;
        info!("osc-ws-client: connected to {url}");

        let (ws_tx, ws_rx) = ws_stream.split();
        let sink = Arc::new(Mutex::new(Some(ws_tx)));
        let handler: SharedHandler = Arc::new(RwLock::new(Arc::new(handler)));

        let reader = tokio::spawn(read_frames(
            ws_rx,
            Arc::clone(&sink),
            Arc::clone(&handler),
            url.clone(),
        ));

        Ok(Self {
            url,
            sink,
            handler,
            reader,
        })
    }

    /// The URL this client connected to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Replaces the inbound handler.  Frames decoded after this call go to
    /// the new handler.
    pub fn set_handler(&self, handler: impl MessageHandler + 'static) {
        let mut slot = self.handler.write().unwrap_or_else(|e| e.into_inner());
        *slot = Arc::new(handler);
    }

    /// Serialises `packet` to JSON and writes it as one text frame.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Protocol`] if the packet cannot be encoded.
    /// - [`ClientError::NotConnected`] if the socket is closed.
    /// - [`ClientError::SendFailed`] if the write fails; the client is then
    ///   treated as disconnected.
    pub async fn send(&self, packet: &OscPacket) -> Result<(), ClientError> {
        let text = encode_json(packet)?;
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(ClientError::NotConnected)?;
        if let Err(e) = sink.send(WsMessage::Text(text)).await {
            *guard = None;
            return Err(ClientError::SendFailed(e));
        }
        Ok(())
    }

    /// `true` while the write half is open.
    pub async fn is_connected(&self) -> bool {
        self.sink.lock().await.is_some()
    }

    /// Sends a close frame and marks the client disconnected.
    ///
    /// Closing an already-closed client is a no-op.
    pub async fn close(&self) -> Result<(), ClientError> {
        let mut guard = self.sink.lock().await;
        if let Some(mut sink) = guard.take() {
            sink.close().await.map_err(ClientError::SendFailed)?;
            info!("osc-ws-client: closed connection to {}", self.url);
        }
        Ok(())
    }
}

impl Drop for OscWsClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

// ── Reader task ───────────────────────────────────────────────────────────────

async fn read_frames(
    mut ws_rx: SplitStream<WsStream>,
    sink: Arc<Mutex<Option<WsSink>>>,
    handler: SharedHandler,
    url: String,
) {
    loop {
        let frame = match ws_rx.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                debug!("osc-ws-client: {url} stream ended");
                break;
            }
            Some(Err(e)) => {
                warn!("osc-ws-client: {url} read error: {e}");
                break;
            }
        };

        let decoded = match frame {
            WsMessage::Text(text) => decode_json(&text).map_err(ClientError::from),
            WsMessage::Binary(_) => Err(ClientError::UnexpectedFrame("binary")),
            WsMessage::Close(_) => {
                debug!("osc-ws-client: {url} sent Close");
                break;
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => continue,
        };

        // Clone the handler out so user code never runs under the lock.
        let current = Arc::clone(&*handler.read().unwrap_or_else(|e| e.into_inner()));
        match decoded {
            Ok(packet) => current.on_message(packet),
            Err(e) => current.on_error(&e),
        }
    }

    *sink.lock().await = None;
    info!("osc-ws-client: disconnected from {url}");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
