//! The WebSocket transport seam a provider streamer drives.
//!
//! Concrete providers don't own a socket type directly — the hosting
//! process (an actix-web-actors WS actor, or a `tokio-tungstenite` client
//! in tests) implements [`WsTransport`] and hands it to
//! [`WebSocketTelephonyStreamer`](crate::streamer::WebSocketTelephonyStreamer).
//! This keeps the buffering/framing logic testable without an actor
//! system or a live socket.

use async_trait::async_trait;

/// One inbound frame off the wire.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WsFrame {
    Text(String),
    Close,
}

/// A bidirectional text-message WebSocket half, abstracted over the
/// hosting transport.
#[async_trait]
pub trait WsTransport: Send {
    /// The next inbound frame, or `None` once the peer has gone away.
    async fn recv(&mut self) -> Option<WsFrame>;

    /// Sends a text frame to the peer.
    async fn send_text(&mut self, text: String) -> std::io::Result<()>;

    /// Closes the underlying connection.
    async fn close(&mut self);
}
