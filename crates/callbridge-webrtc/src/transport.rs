//! The bidirectional gRPC signaling stream seam a [`WebRtcStreamer`] drives.
//!
//! The hosting process (a `tonic` bidi-streaming handler, in production)
//! implements this over the real gRPC stream; tests substitute an
//! in-memory channel pair.
//!
//! [`WebRtcStreamer`]: crate::streamer::WebRtcStreamer

use async_trait::async_trait;
use callbridge_proto::SignalingEnvelope;

/// A bidirectional signaling stream half.
#[async_trait]
pub trait SignalingTransport: Send {
    /// The next inbound envelope, or `None` once the stream has ended
    /// (client disconnect or transport error).
    async fn recv(&mut self) -> Option<SignalingEnvelope>;

    /// Sends an envelope to the client.
    async fn send(&mut self, envelope: SignalingEnvelope) -> std::io::Result<()>;

    /// Closes the underlying stream.
    async fn close(&mut self);
}
